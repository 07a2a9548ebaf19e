use crate::Checkout;
use crate::error::{CheckoutError, WebhookError};
use crate::payment::{Metadata, Payment, Status, metadata_text};
use crate::webhook::Inbound;
use crate::wire::{self, DOTTED_LAYOUT, Form, MOSCOW, Params};
use async_trait::async_trait;
use chrono_tz::Tz;

pub const NAME: &str = "anypay";
pub const BASE_URL: &str = "https://anypay.io/merchant?";

pub struct Anypay {
    merchant_id: String,
    api_key: String,
    base_url: String,
    tz: Tz,
}

impl Anypay {
    pub fn new(merchant_id: String, api_key: String) -> Self {
        Self {
            merchant_id,
            api_key,
            base_url: BASE_URL.to_string(),
            tz: MOSCOW,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Zone `pay_date` is reported in.
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    // MD5(currency:amount:api_key:merchant_id:pay_id)
    fn request_signature(&self, payment: &Payment) -> String {
        wire::md5_hex(
            &[
                &payment.currency,
                &payment.amount,
                &self.api_key,
                &self.merchant_id,
                &payment.id,
            ],
            ":",
        )
    }

    // MD5(merchant_id:amount:pay_id:api_key)
    fn notification_signature(&self, amount: &str, pay_id: &str) -> String {
        wire::md5_hex(&[&self.merchant_id, amount, pay_id, &self.api_key], ":")
    }

    pub fn link(&self, payment: &Payment) -> Result<String, CheckoutError> {
        // Custom fields ride along as plain parameters but never shadow the signed ones.
        let mut params: Params = payment
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), metadata_text(v)))
            .collect();

        params.insert("merchant_id".into(), self.merchant_id.clone());
        params.insert("pay_id".into(), payment.id.clone());
        params.insert("amount".into(), payment.amount.clone());
        params.insert("currency".into(), payment.currency.clone());
        params.insert("sign".into(), self.request_signature(payment));

        wire::encode_url(&self.base_url, &params)
    }
}

#[async_trait]
impl Checkout for Anypay {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn request(&self, payment: &Payment) -> Result<String, CheckoutError> {
        self.link(payment)
    }

    fn notification(&self, inbound: &Inbound) -> Result<Payment, WebhookError> {
        let form = Form::parse(&inbound.body, inbound.query.as_deref())?;

        let expected = self.notification_signature(form.value("amount"), form.value("pay_id"));
        wire::check_signature(form.value("sign"), &expected)?;

        let paid_at = wire::parse_local(form.value("pay_date"), DOTTED_LAYOUT, self.tz)?;

        let metadata: Metadata = form
            .pairs()
            .map(|(k, v)| (k.to_string(), v.into()))
            .collect();

        Ok(Payment {
            checkout: NAME.to_string(),
            id: form.value("pay_id").to_string(),
            amount: form.value("amount").to_string(),
            currency: form.value("currency").to_string(),
            metadata,
            status: Some(Status::Paid),
            profit: form.value("profit").to_string(),
            paid_at: Some(paid_at),
            ..Payment::default()
        })
    }
}
