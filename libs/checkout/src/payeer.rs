use crate::Checkout;
use crate::error::{CheckoutError, WebhookError};
use crate::payment::{Payment, Status};
use crate::webhook::{Inbound, Reply};
use crate::wire::{self, DOTTED_LAYOUT, Form, MOSCOW, Params};
use async_trait::async_trait;
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono_tz::Tz;

pub const NAME: &str = "payeer";
pub const BASE_URL: &str = "https://payeer.com/merchant/?";

const STATUSES: &[(&str, Status)] = &[("success", Status::Paid)];

/// Fields of a Payeer notification covered by `m_sign`, in signing order.
const SIGNED_FIELDS: [&str; 10] = [
    "m_operation_id",
    "m_operation_ps",
    "m_operation_date",
    "m_operation_pay_date",
    "m_shop",
    "m_orderid",
    "m_amount",
    "m_curr",
    "m_desc",
    "m_status",
];

/// Payeer merchant. Links carry no custom fields, and notifications carry no
/// net amount: `profit` is `summa_out`, which equals the amount when the
/// buyer pays the fee.
pub struct Payeer {
    merchant_id: String,
    api_key: String,
    base_url: String,
    tz: Tz,
}

impl Payeer {
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

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    pub fn link(&self, payment: &Payment) -> Result<String, CheckoutError> {
        let desc = STANDARD.encode(payment.comment.as_bytes());

        let sign = wire::sha256_upper_hex(
            &[
                &self.merchant_id,
                &payment.id,
                &payment.amount,
                &payment.currency,
                &desc,
                &self.api_key,
            ],
            ":",
        );

        let mut params = Params::new();
        params.insert("m_shop".into(), self.merchant_id.clone());
        params.insert("m_orderid".into(), payment.id.clone());
        params.insert("m_amount".into(), payment.amount.clone());
        params.insert("m_curr".into(), payment.currency.clone());
        params.insert("m_desc".into(), desc);
        params.insert("m_sign".into(), sign);

        wire::encode_url(&self.base_url, &params)
    }

    fn notification_signature(&self, form: &Form) -> String {
        let mut parts: Vec<&str> = SIGNED_FIELDS.iter().map(|k| form.value(k)).collect();
        if !form.value("m_params").is_empty() {
            parts.push(form.value("m_params"));
        }
        parts.push(&self.api_key);
        wire::sha256_upper_hex(&parts, ":")
    }
}

#[async_trait]
impl Checkout for Payeer {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn request(&self, payment: &Payment) -> Result<String, CheckoutError> {
        self.link(payment)
    }

    fn notification(&self, inbound: &Inbound) -> Result<Payment, WebhookError> {
        let form = Form::parse(&inbound.body, inbound.query.as_deref())?;

        wire::check_signature(form.value("m_sign"), &self.notification_signature(&form))?;

        let paid_at =
            wire::parse_local(form.value("m_operation_pay_date"), DOTTED_LAYOUT, self.tz)?;

        let comment = STANDARD
            .decode(form.value("m_desc"))
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_default();

        Ok(Payment {
            checkout: NAME.to_string(),
            id: form.value("m_orderid").to_string(),
            currency: form.value("m_curr").to_string(),
            comment,
            status: Status::lookup(STATUSES, form.value("m_status")),
            amount: form.value("m_amount").to_string(),
            profit: form.value("summa_out").to_string(),
            paid_at: Some(paid_at),
            ..Payment::default()
        })
    }

    /// Payeer expects `<order id>|success` or `<order id>|error` in the body.
    fn reply(&self, id: &str, delivered: bool) -> Reply {
        if delivered {
            Reply::text(StatusCode::OK, format!("{}|success", id))
        } else {
            Reply::text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}|error", id))
        }
    }
}
