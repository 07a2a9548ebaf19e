use crate::Checkout;
use crate::error::{CheckoutError, WebhookError};
use crate::payment::{Metadata, Payment, Raw, Status, metadata_text, text_metadata};
use crate::webhook::Inbound;
use crate::wire::{self, Params};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub const NAME: &str = "qiwi";
pub const BASE_URL: &str = "https://oplata.qiwi.com/create?";
pub const SIGNATURE_HEADER: &str = "X-Api-Signature-SHA256";

const STATUSES: &[(&str, Status)] = &[
    ("WAITING", Status::Waiting),
    ("PAID", Status::Paid),
    ("REJECTED", Status::Rejected),
    ("EXPIRED", Status::Expired),
];

// creationDateTime, e.g. 2023-02-01T15:04:05+03 or 2023-02-01T15:04:05+03:00
const TIME_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%#z";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bill {
    pub site_id: String,
    pub bill_id: String,
    #[serde(deserialize_with = "wire::null_as_default")]
    pub custom_fields: Metadata,
    pub comment: String,
    pub creation_date_time: String,
    pub expiration_date_time: String,
    #[serde(deserialize_with = "wire::null_as_default")]
    pub amount: Amount,
    #[serde(deserialize_with = "wire::null_as_default")]
    pub status: BillStatus,
    #[serde(deserialize_with = "wire::null_as_default")]
    pub customer: Customer,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Amount {
    #[serde(deserialize_with = "wire::decimal_text")]
    pub value: String,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BillStatus {
    pub value: String,
    pub changed_date_time: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub phone: String,
    pub email: String,
    pub account: String,
}

#[derive(Deserialize)]
struct Notification {
    bill: Bill,
}

/// Original bill of a payment reported by Qiwi.
pub fn from(payment: &Payment) -> Option<&Bill> {
    payment.raw_as::<Bill>(NAME)
}

/// Qiwi P2P. Links are built against the public key; notifications are
/// authenticated with an HMAC over the bill keyed by the secret key.
pub struct Qiwi {
    public_key: String,
    secret_key: String,
    base_url: String,
}

impl Qiwi {
    pub fn new(public_key: String, secret_key: String) -> Self {
        Self {
            public_key,
            secret_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn link(&self, payment: &Payment) -> Result<String, CheckoutError> {
        let mut params = Params::new();
        params.insert("publicKey".into(), self.public_key.clone());
        params.insert("billId".into(), payment.id.clone());
        params.insert("amount".into(), payment.amount.clone());
        params.insert("comment".into(), payment.comment.clone());
        params.insert("successUrl".into(), payment.success_url.clone());

        if let Some(expires) = payment.expiration_date {
            params.insert(
                "expirationDateTime".into(),
                expires.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            );
        }

        for (k, v) in &payment.metadata {
            params.insert(format!("customFields[{}]", k), metadata_text(v));
        }

        wire::encode_url(&self.base_url, &params)
    }

    // HMAC-SHA256(currency|amount|billId|siteId|status)
    fn verify(&self, bill: &Bill, signature: &str) -> Result<(), WebhookError> {
        let canonical = [
            bill.amount.currency.as_str(),
            bill.amount.value.as_str(),
            bill.bill_id.as_str(),
            bill.site_id.as_str(),
            bill.status.value.as_str(),
        ]
        .join("|");

        let received = hex::decode(signature).map_err(|_| WebhookError::Signature)?;

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(WebhookError::malformed)?;
        mac.update(canonical.as_bytes());
        mac.verify_slice(&received).map_err(|_| WebhookError::Signature)
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, WebhookError> {
    DateTime::parse_from_str(value, TIME_LAYOUT)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| WebhookError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl Checkout for Qiwi {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn request(&self, payment: &Payment) -> Result<String, CheckoutError> {
        self.link(payment)
    }

    fn notification(&self, inbound: &Inbound) -> Result<Payment, WebhookError> {
        let Notification { bill } = serde_json::from_slice(&inbound.body)?;

        self.verify(&bill, inbound.header(SIGNATURE_HEADER))?;

        let paid_at = parse_time(&bill.creation_date_time)?;

        Ok(Payment {
            checkout: NAME.to_string(),
            id: bill.bill_id.clone(),
            amount: bill.amount.value.clone(),
            currency: bill.amount.currency.clone(),
            comment: bill.comment.clone(),
            metadata: text_metadata(&bill.custom_fields),
            status: Status::lookup(STATUSES, &bill.status.value),
            profit: bill.amount.value.clone(),
            paid_at: Some(paid_at),
            raw: Some(Raw::new(bill)),
            ..Payment::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Recorder};
    use axum::http::StatusCode;
    use chrono::TimeZone;
    use serde_json::{Value, json};

    const PAID_SIGN: &str = "0155e2b58cbad7ff479146a520d3d3998b39bfea5ed71de386523c593b13c75d";
    const WAITING_SIGN: &str = "8cbd3e35d24511322082d5213a1f3e6d37045651a65ea552b7e1089c60ff2f7f";
    const REFUNDED_SIGN: &str = "0a1c73d3d93b6f8aa4b7c2679a22702d6af917c0f5b6b1e20ab5f6f6022e9619";

    fn qiwi() -> Qiwi {
        Qiwi::new("pk".into(), "qiwi-secret".into())
    }

    fn bill(status: &str) -> Value {
        json!({
            "bill": {
                "siteId": "site-1",
                "billId": "bill-1",
                "amount": { "value": "100.00", "currency": "RUB" },
                "status": { "value": status, "changedDateTime": "2023-02-01T15:05:00+03:00" },
                "customer": { "phone": "79000000000", "email": "a@b.c", "account": "42" },
                "customFields": { "user": "42", "plan": "pro" },
                "comment": "top up",
                "creationDateTime": "2023-02-01T15:04:05+03",
                "expirationDateTime": "2023-02-02T15:04:05+03"
            }
        })
    }

    fn signed(body: &Value, sign: &str) -> Inbound {
        testing::with_header(testing::json(body), "x-api-signature-sha256", sign)
    }

    #[tokio::test]
    async fn link_carries_custom_fields_and_expiration() {
        let mut payment = Payment::new("bill-1", "100.00", "RUB");
        payment.comment = "top up".into();
        payment.success_url = "https://example.com/ok".into();
        payment.expiration_date = Some(Utc.with_ymd_and_hms(2023, 2, 2, 12, 4, 5).unwrap());
        payment.metadata.insert("user".into(), json!(42));

        let url = qiwi().request(&payment).await.unwrap();
        assert!(url.starts_with(BASE_URL));

        let q = testing::query(&url);
        assert_eq!(testing::param(&q, "publicKey"), Some("pk"));
        assert_eq!(testing::param(&q, "billId"), Some("bill-1"));
        assert_eq!(testing::param(&q, "successUrl"), Some("https://example.com/ok"));
        assert_eq!(testing::param(&q, "expirationDateTime"), Some("2023-02-02T12:04:05+00:00"));
        assert_eq!(testing::param(&q, "customFields[user]"), Some("42"));
    }

    #[tokio::test]
    async fn base_url_can_point_to_sandbox() {
        let url = qiwi()
            .with_base_url("https://sandbox.test/create?")
            .request(&Payment::new("b", "1.00", "RUB"))
            .await
            .unwrap();
        assert!(url.starts_with("https://sandbox.test/create?"));
        assert!(!url.contains("expirationDateTime"));
    }

    #[tokio::test]
    async fn paid_bill_is_normalized() {
        let recorder = Recorder::default();
        let hook = qiwi().webhook(recorder.clone());

        let reply = hook.handle(signed(&bill("PAID"), PAID_SIGN)).await;
        assert_eq!(reply.status, StatusCode::OK);

        let p = &recorder.payments()[0];
        assert_eq!(p.checkout, NAME);
        assert_eq!(p.id, "bill-1");
        assert_eq!(p.currency, "RUB");
        assert_eq!(p.amount, "100.00");
        assert_eq!(p.profit, "100.00");
        assert_eq!(p.comment, "top up");
        assert_eq!(p.status, Some(Status::Paid));
        assert_eq!(p.paid_at, Some(Utc.with_ymd_and_hms(2023, 2, 1, 12, 4, 5).unwrap()));
        assert_eq!(p.metadata["plan"], json!("pro"));

        let raw = from(p).expect("qiwi bill");
        assert_eq!(raw.customer.account, "42");
        assert_eq!(raw.status.changed_date_time, "2023-02-01T15:05:00+03:00");
    }

    #[tokio::test]
    async fn status_vocabulary() {
        let recorder = Recorder::default();
        let hook = qiwi().webhook(recorder.clone());

        hook.handle(signed(&bill("WAITING"), WAITING_SIGN)).await;
        hook.handle(signed(&bill("REFUNDED"), REFUNDED_SIGN)).await;

        let payments = recorder.payments();
        assert_eq!(payments[0].status, Some(Status::Waiting));
        assert_eq!(payments[1].status, None);

        assert_eq!(Status::lookup(STATUSES, "EXPIRED"), Some(Status::Expired));
        assert_eq!(Status::lookup(STATUSES, "REJECTED"), Some(Status::Rejected));
    }

    #[tokio::test]
    async fn tampering_with_signed_fields_is_forbidden() {
        let pointers = [
            "/bill/amount/currency",
            "/bill/amount/value",
            "/bill/billId",
            "/bill/siteId",
            "/bill/status/value",
        ];

        for pointer in pointers {
            let recorder = Recorder::default();
            let hook = qiwi().webhook(recorder.clone());

            let mut body = bill("PAID");
            *body.pointer_mut(pointer).unwrap() = json!("X");

            let reply = hook.handle(signed(&body, PAID_SIGN)).await;
            assert_eq!(reply.status, StatusCode::FORBIDDEN, "{pointer}");
            assert_eq!(recorder.calls(), 0, "{pointer}");
        }
    }

    #[tokio::test]
    async fn missing_or_garbled_header_is_forbidden() {
        let recorder = Recorder::default();
        let hook = qiwi().webhook(recorder.clone());

        assert_eq!(hook.handle(testing::json(&bill("PAID"))).await.status, StatusCode::FORBIDDEN);
        assert_eq!(hook.handle(signed(&bill("PAID"), "zz")).await.status, StatusCode::FORBIDDEN);
        assert_eq!(recorder.calls(), 0);
    }

    #[tokio::test]
    async fn broken_json_is_internal_error() {
        let recorder = Recorder::default();
        let hook = qiwi().webhook(recorder.clone());

        let inbound = testing::with_header(
            Inbound::new("{\"bill\":"),
            "x-api-signature-sha256",
            PAID_SIGN,
        );
        assert_eq!(hook.handle(inbound).await.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(recorder.calls(), 0);
    }

    #[tokio::test]
    async fn null_custom_fields_are_accepted() {
        let recorder = Recorder::default();
        let hook = qiwi().webhook(recorder.clone());

        let mut body = bill("PAID");
        body["bill"]["customFields"] = json!(null);
        body["bill"]["customer"] = json!(null);

        assert_eq!(hook.handle(signed(&body, PAID_SIGN)).await.status, StatusCode::OK);
        let p = &recorder.payments()[0];
        assert!(p.metadata.is_empty());
        assert_eq!(from(p).unwrap().customer.account, "");
    }

    #[tokio::test]
    async fn numeric_custom_fields_arrive_as_text() {
        let recorder = Recorder::default();
        let hook = qiwi().webhook(recorder.clone());

        let mut body = bill("PAID");
        body["bill"]["customFields"] = json!({ "user": 42 });

        hook.handle(signed(&body, PAID_SIGN)).await;
        assert_eq!(recorder.payments()[0].metadata["user"], json!("42"));
    }

    #[tokio::test]
    async fn bad_creation_time_is_internal_error() {
        let recorder = Recorder::default();
        let hook = qiwi().webhook(recorder.clone());

        let mut body = bill("PAID");
        body["bill"]["creationDateTime"] = json!("yesterday");

        assert_eq!(
            hook.handle(signed(&body, PAID_SIGN)).await.status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(recorder.calls(), 0);
    }

    #[test]
    fn creation_time_accepts_short_and_long_offsets() {
        let want = Utc.with_ymd_and_hms(2023, 2, 1, 12, 4, 5).unwrap();
        assert_eq!(parse_time("2023-02-01T15:04:05+03").unwrap(), want);
        assert_eq!(parse_time("2023-02-01T15:04:05+03:00").unwrap(), want);
    }

    #[test]
    fn raw_bill_is_only_exposed_for_qiwi_payments() {
        let payment = Payment {
            checkout: "yookassa".into(),
            raw: Some(Raw::new(Bill::default())),
            ..Payment::default()
        };
        assert!(from(&payment).is_none());
    }
}
