use crate::Checkout;
use crate::error::{CheckoutError, WebhookError};
use crate::payment::{Metadata, Payment, Status, metadata_text};
use crate::webhook::Inbound;
use crate::wire::{self, Form, Params};
use async_trait::async_trait;
use chrono::Utc;

pub const NAME: &str = "enotio";
pub const BASE_URL: &str = "https://enot.io/pay?";

/// Enot.io signs links with the first secret and notifications with the second.
pub struct Enotio {
    merchant_id: String,
    api_key1: String,
    api_key2: String,
    base_url: String,
}

impl Enotio {
    pub fn new(merchant_id: String, api_key1: String, api_key2: String) -> Self {
        Self {
            merchant_id,
            api_key1,
            api_key2,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn link(&self, payment: &Payment) -> Result<String, CheckoutError> {
        let sign = wire::md5_hex(
            &[&self.merchant_id, &payment.amount, &self.api_key1, &payment.id],
            ":",
        );

        let mut params = Params::new();
        params.insert("m".into(), self.merchant_id.clone());
        params.insert("o".into(), payment.id.clone());
        params.insert("oa".into(), payment.amount.clone());
        params.insert("cf".into(), encode_metadata(&payment.metadata));
        params.insert("s".into(), sign);

        wire::encode_url(&self.base_url, &params)
    }
}

/// `k1=v1,k2=v2`. Nothing is escaped, so a `,` inside a key or value does not
/// survive the trip back.
pub fn encode_metadata(metadata: &Metadata) -> String {
    metadata
        .iter()
        .map(|(k, v)| format!("{}={}", k, metadata_text(v)))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_metadata(s: &str) -> Metadata {
    s.split(',')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.into()),
            None => (pair.to_string(), "".into()),
        })
        .collect()
}

/// `custom_field` arrives escaped a second time on top of the form encoding.
fn unescape_custom_field(value: &str) -> String {
    let value = value.replace('+', " ");
    match urlencoding::decode(&value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value,
    }
}

#[async_trait]
impl Checkout for Enotio {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn request(&self, payment: &Payment) -> Result<String, CheckoutError> {
        self.link(payment)
    }

    fn notification(&self, inbound: &Inbound) -> Result<Payment, WebhookError> {
        let form = Form::parse(&inbound.body, inbound.query.as_deref())?;

        // merchant_id in a notification is the order id the link was built with.
        let expected = wire::md5_hex(
            &[
                &self.merchant_id,
                form.value("amount"),
                &self.api_key2,
                form.value("merchant_id"),
            ],
            ":",
        );
        wire::check_signature(form.value("sign_2"), &expected)?;

        let custom = unescape_custom_field(form.value("custom_field"));

        Ok(Payment {
            checkout: NAME.to_string(),
            id: form.value("merchant_id").to_string(),
            currency: form.value("currency").to_string(),
            amount: form.value("amount").to_string(),
            metadata: decode_metadata(&custom),
            status: Some(Status::Paid),
            profit: form.value("credited").to_string(),
            paid_at: Some(Utc::now()),
            ..Payment::default()
        })
    }
}
