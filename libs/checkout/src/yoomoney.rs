use crate::Checkout;
use crate::error::{CheckoutError, WebhookError};
use crate::payment::{Payment, Status};
use crate::webhook::Inbound;
use crate::wire::{self, Form, MOSCOW, Params};
use async_trait::async_trait;
use chrono_tz::Tz;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

pub const NAME: &str = "yoomoney";
pub const BASE_URL: &str = "https://yoomoney.ru/quickpay/confirm.xml?";

/// Payment types.
pub const PC: &str = "PC"; // wallet
pub const AC: &str = "AC"; // card
pub const MC: &str = "MC"; // mobile

// The trailing Z is literal; the wall clock is read in the configured zone.
const TIME_LAYOUT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Returns `amount` increased by the fee YooMoney takes for the payment type,
/// so that the receiver gets `amount` in full.
pub fn with_commission(payment_type: &str, amount: &str) -> Result<String, CheckoutError> {
    let a = Decimal::from_str(amount)?;

    let total = match payment_type {
        PC => (Decimal::new(5, 3) / Decimal::new(1005, 3))
            .checked_mul(a)
            .and_then(|fee| a.checked_add(fee)),
        AC => a.checked_div(Decimal::new(98, 2)),
        _ => return Ok(amount.to_string()),
    };
    let total = total.ok_or(CheckoutError::Amount(
        rust_decimal::Error::ExceedsMaximumPossibleValue,
    ))?;

    let mut total = total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    total.rescale(2);
    Ok(total.to_string())
}

/// YooMoney quickpay form. Links carry no custom fields; the payment id
/// travels as `label`.
pub struct YooMoney {
    receiver: String,
    secret_key: String,
    base_url: String,
    tz: Tz,
}

impl YooMoney {
    pub fn new(receiver: String, secret_key: String) -> Self {
        Self {
            receiver,
            secret_key,
            base_url: BASE_URL.to_string(),
            tz: MOSCOW,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    pub fn link(&self, payment: &Payment) -> Result<String, CheckoutError> {
        let mut params = Params::new();
        params.insert("receiver".into(), self.receiver.clone());
        params.insert("quickpay-form".into(), "shop".into());
        params.insert("paymentType".into(), payment.kind.clone());
        params.insert("targets".into(), payment.target.clone());
        params.insert("sum".into(), payment.amount.clone());
        params.insert("comment".into(), payment.comment.clone());
        params.insert("label".into(), payment.id.clone());
        params.insert("successURL".into(), payment.success_url.clone());

        wire::encode_url(&self.base_url, &params)
    }

    // SHA1(notification_type&operation_id&amount&currency&datetime&sender&codepro&secret&label)
    fn notification_signature(&self, form: &Form) -> String {
        wire::sha1_hex(
            &[
                form.value("notification_type"),
                form.value("operation_id"),
                form.value("amount"),
                form.value("currency"),
                form.value("datetime"),
                form.value("sender"),
                form.value("codepro"),
                &self.secret_key,
                form.value("label"),
            ],
            "&",
        )
    }
}

#[async_trait]
impl Checkout for YooMoney {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn request(&self, payment: &Payment) -> Result<String, CheckoutError> {
        self.link(payment)
    }

    fn notification(&self, inbound: &Inbound) -> Result<Payment, WebhookError> {
        let form = Form::parse(&inbound.body, inbound.query.as_deref())?;

        wire::check_signature(form.value("sha1_hash"), &self.notification_signature(&form))?;

        let paid_at = wire::parse_local(form.value("datetime"), TIME_LAYOUT, self.tz)?;

        Ok(Payment {
            checkout: NAME.to_string(),
            id: form.value("label").to_string(),
            amount: form.value("withdraw_amount").to_string(),
            currency: form.value("currency").to_string(),
            status: Some(Status::Paid),
            profit: form.value("amount").to_string(),
            paid_at: Some(paid_at),
            ..Payment::default()
        })
    }
}
