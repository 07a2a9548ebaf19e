use crate::Checkout;
use crate::error::{CheckoutError, WebhookError};
use crate::payment::{Metadata, Payment, Raw, Status, text_metadata};
use crate::webhook::Inbound;
use crate::wire;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub const NAME: &str = "yookassa";
pub const BASE_URL: &str = "https://api.yookassa.ru/v3/payments";

const STATUSES: &[(&str, Status)] = &[
    ("waiting_for_capture", Status::Waiting),
    ("succeeded", Status::Paid),
    ("canceled", Status::Rejected),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Amount {
    #[serde(default, deserialize_with = "wire::decimal_text")]
    pub value: String,
    #[serde(default)]
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Confirmation {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub return_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub confirmation_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub gateway_id: String,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
    amount: Amount,
    confirmation: Confirmation,
    capture: bool,
    #[serde(skip_serializing_if = "Metadata::is_empty")]
    metadata: Metadata,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    confirmation: Option<Confirmation>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

/// Payment object as YooKassa reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub test: bool,
    #[serde(default)]
    pub paid: bool,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub amount: Amount,
    #[serde(default)]
    pub income_amount: Option<Amount>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub metadata: Metadata,
    #[serde(default)]
    pub recipient: Option<Recipient>,
    #[serde(default)]
    pub confirmation: Option<Confirmation>,
}

/// Notification envelope: `{"type": "notification", "event": ..., "object": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub event: String,
    pub object: Transaction,
}

/// Original payment object of a payment reported by YooKassa.
pub fn from(payment: &Payment) -> Option<&Transaction> {
    payment.raw_as::<Transaction>(NAME)
}

/// YooKassa shop, authenticated with HTTP basic auth.
///
/// Payments are created with immediate capture. Notifications are not signed.
pub struct YooKassa {
    client: Client,
    base_url: String,
    shop_id: String,
    api_key: String,
}

impl YooKassa {
    pub fn new(shop_id: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
            shop_id,
            api_key,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Checkout for YooKassa {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn request(&self, payment: &Payment) -> Result<String, CheckoutError> {
        let body = CreateRequest {
            description: &payment.comment,
            amount: Amount {
                value: payment.amount.clone(),
                currency: payment.currency.clone(),
            },
            confirmation: Confirmation {
                kind: "redirect".into(),
                return_url: payment.success_url.clone(),
                ..Confirmation::default()
            },
            capture: true,
            metadata: text_metadata(&payment.metadata),
        };

        let idempotence_key = if payment.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            payment.id.clone()
        };
        debug!(checkout = NAME, key = %idempotence_key, "creating payment");

        let resp = self
            .client
            .post(&self.base_url)
            .basic_auth(&self.shop_id, Some(&self.api_key))
            .header("Idempotence-Key", idempotence_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let data = resp.bytes().await?;

        if !status.is_success() {
            let err: ApiError = serde_json::from_slice(&data).unwrap_or_default();
            return Err(CheckoutError::Provider {
                checkout: NAME,
                code: if err.code.is_empty() {
                    status.as_u16().to_string()
                } else {
                    err.code
                },
                message: err.description,
            });
        }

        let created: CreateResponse = serde_json::from_slice(&data)?;
        created
            .confirmation
            .map(|c| c.confirmation_url)
            .filter(|url| !url.is_empty())
            .ok_or(CheckoutError::MissingUrl(NAME))
    }

    fn notification(&self, inbound: &Inbound) -> Result<Payment, WebhookError> {
        let event: Event = serde_json::from_slice(&inbound.body)?;
        let tx = event.object;
        debug!(
            checkout = NAME,
            event = %event.event,
            id = %tx.id,
            "unsigned notification accepted"
        );

        Ok(Payment {
            checkout: NAME.to_string(),
            id: tx.id.clone(),
            amount: tx.amount.value.clone(),
            currency: tx.amount.currency.clone(),
            comment: tx.description.clone(),
            metadata: text_metadata(&tx.metadata),
            status: Status::lookup(STATUSES, &tx.status),
            profit: tx
                .income_amount
                .as_ref()
                .map(|a| a.value.clone())
                .unwrap_or_default(),
            paid_at: tx.captured_at,
            expiration_date: tx.expires_at,
            raw: Some(Raw::new(tx)),
            ..Payment::default()
        })
    }
}
