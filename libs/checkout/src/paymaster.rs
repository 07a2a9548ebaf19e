//! Paymaster API v2: invoices, receipts and payment notifications.

use crate::Checkout;
use crate::error::{CheckoutError, WebhookError};
use crate::payment::{Metadata, Payment, Raw, Status, text_metadata};
use crate::webhook::Inbound;
use crate::wire;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const NAME: &str = "paymaster";
pub const BASE_URL: &str = "https://paymaster.ru/api/v2";

const STATUSES: &[(&str, Status)] = &[
    ("Pending", Status::Waiting),
    ("Settled", Status::Paid),
    ("Cancelled", Status::Rejected),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub merchant_id: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub test_mode: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<Invoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenization: Option<Tokenization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_data: Option<PaymentData>,
}

/// Paymaster sends amounts as JSON numbers and takes them as strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Amount {
    #[serde(
        default,
        deserialize_with = "wire::decimal_text",
        skip_serializing_if = "String::is_empty"
    )]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub return_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub callback_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "orderNo", default, skip_serializing_if = "String::is_empty")]
    pub order_no: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "wire::null_as_default",
        skip_serializing_if = "Metadata::is_empty"
    )]
    pub params: Metadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tokenization {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub purpose: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub callback_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentData {
    #[serde(rename = "paymentMethod", default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenId {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

/// Payment as Paymaster reports it in notifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub invoice: Invoice,
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub amount: Amount,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,

    // request only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ReceiptClient>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ReceiptItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptClient {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "INN", default, skip_serializing_if = "String::is_empty")]
    pub inn: String,
}

/// Receipt line. Quantity, price and excise are decimals as text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub quantity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub price: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub excise: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub measure: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vat_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payment_subject: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub payment_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ReceiptProduct>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marking: Option<ReceiptMarking>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<ReceiptSupplier>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptProduct {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub declaration: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptMarking {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<ReceiptQuantity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptQuantity {
    pub numerator: i64,
    pub denominator: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptSupplier {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "INN", default, skip_serializing_if = "String::is_empty")]
    pub inn: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct InvoiceResponse {
    #[serde(default)]
    url: String,
}

/// Original transaction of a payment reported by Paymaster.
pub fn from(payment: &Payment) -> Option<&Transaction> {
    payment.raw_as::<Transaction>(NAME)
}

/// Paymaster merchant.
///
/// Requests are authenticated with a bearer token. Notifications carry no
/// signature at all, so the endpoint they are delivered to must be protected
/// by the host (IP allow-list or mutual TLS).
pub struct Paymaster {
    client: Client,
    base_url: String,
    token: String,
    merchant_id: String,
    test_mode: bool,
}

impl Paymaster {
    pub fn new(token: String, merchant_id: String) -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
            token,
            merchant_id,
            test_mode: false,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn invoice_request(&self, p: &Payment) -> InvoiceRequest {
        InvoiceRequest {
            merchant_id: self.merchant_id.clone(),
            test_mode: self.test_mode,
            payment_method: p.payment_method.clone(),
            customer: (!p.customer.is_empty()).then(|| Customer {
                account: p.customer.clone(),
                ..Customer::default()
            }),
            protocol: Some(Protocol {
                return_url: p.success_url.clone(),
                callback_url: p.callback_url.clone(),
            }),
            invoice: Some(Invoice {
                description: p.comment.clone(),
                order_no: p.id.clone(),
                expires: p.expiration_date,
                params: text_metadata(&p.metadata),
            }),
            amount: Some(Amount {
                value: p.amount.clone(),
                currency: p.currency.clone(),
            }),
            tokenization: (!p.kind.is_empty()).then(|| Tokenization {
                kind: p.kind.clone(),
                purpose: p.comment.clone(),
                callback_url: p.callback_url.clone(),
            }),
            ..InvoiceRequest::default()
        }
    }

    /// POSTs `body` to `endpoint` and decodes the answer, turning Paymaster's
    /// `{code, message}` envelope into an error.
    pub async fn raw<B, R>(
        &self,
        endpoint: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<R, CheckoutError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut req = self.client.post(&url).json(body);

        if let Some(key) = idempotency_key.filter(|k| !k.is_empty()) {
            req = req.header("Idempotency-Key", key);
        }

        self.send(req).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, CheckoutError> {
        let url = format!("{}/{}", self.base_url, path);
        self.send(self.client.get(&url)).await
    }

    async fn send<R: DeserializeOwned>(&self, req: RequestBuilder) -> Result<R, CheckoutError> {
        let resp = req.bearer_auth(&self.token).send().await?;
        let status = resp.status();
        let data = resp.bytes().await?;

        if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&data) {
            if !envelope.code.is_empty() {
                return Err(CheckoutError::Provider {
                    checkout: NAME,
                    code: envelope.code,
                    message: envelope.message,
                });
            }
        }

        if !status.is_success() {
            return Err(CheckoutError::Provider {
                checkout: NAME,
                code: status.as_u16().to_string(),
                message: String::from_utf8_lossy(&data).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&data)?)
    }

    pub async fn create_receipt(&self, receipt: &Receipt) -> Result<Receipt, CheckoutError> {
        self.raw("receipts", receipt, None).await
    }

    pub async fn receipt(&self, id: &str) -> Result<Receipt, CheckoutError> {
        self.get(&format!("receipts/{}", urlencoding::encode(id))).await
    }

    pub async fn receipts(&self, payment_id: &str) -> Result<Vec<Receipt>, CheckoutError> {
        self.get(&format!("receipts?paymentId={}", urlencoding::encode(payment_id)))
            .await
    }
}

#[async_trait]
impl Checkout for Paymaster {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn request(&self, payment: &Payment) -> Result<String, CheckoutError> {
        let req = self.invoice_request(payment);
        let resp: InvoiceResponse = self.raw("invoices", &req, Some(&payment.id)).await?;

        if resp.url.is_empty() {
            return Err(CheckoutError::MissingUrl(NAME));
        }
        Ok(resp.url)
    }

    fn notification(&self, inbound: &Inbound) -> Result<Payment, WebhookError> {
        let tx: Transaction = serde_json::from_slice(&inbound.body)?;
        debug!(checkout = NAME, id = tx.id, "unsigned notification accepted");

        Ok(Payment {
            checkout: NAME.to_string(),
            id: tx.id.to_string(),
            amount: tx.amount.value.clone(),
            currency: tx.amount.currency.clone(),
            comment: tx.invoice.description.clone(),
            status: Status::lookup(STATUSES, &tx.status),
            profit: tx.amount.value.clone(),
            paid_at: tx.created,
            metadata: text_metadata(&tx.invoice.params),
            raw: Some(Raw::new(tx)),
            ..Payment::default()
        })
    }
}
