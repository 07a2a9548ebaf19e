use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const RUB: &str = "RUB";
pub const UAH: &str = "UAH";
pub const USD: &str = "USD";

/// Custom fields passed along with a payment request.
///
/// Values are scalar JSON values; every wire protocol here is string based, so
/// whatever comes back from a provider is a string.
pub type Metadata = BTreeMap<String, Value>;

/// Normalized payment state reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Paid,
    Waiting,
    Expired,
    Rejected,
}

impl Status {
    /// Looks a provider status up in a fixed vocabulary. Anything not listed
    /// stays unset.
    pub fn lookup(table: &[(&str, Status)], value: &str) -> Option<Status> {
        table
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, status)| *status)
    }
}

/// Provider payload kept next to the normalized fields.
#[derive(Clone)]
pub struct Raw(Arc<dyn Any + Send + Sync>);

impl Raw {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Raw(..)")
    }
}

/// Universal payment object.
///
/// Outbound, the caller fills the fields a provider understands and hands the
/// value to [`crate::Checkout::request`]. Inbound, a webhook builds it from a
/// verified notification and moves it into the callback.
#[derive(Debug, Clone, Default)]
pub struct Payment {
    pub id: String,
    pub amount: String,
    pub currency: String,
    pub comment: String,
    pub success_url: String,
    pub metadata: Metadata,

    pub target: String,                          // yoomoney only
    pub kind: String,                            // yoomoney, paymaster only
    pub expiration_date: Option<DateTime<Utc>>, // qiwi, paymaster only
    pub callback_url: String,                    // paymaster only
    pub payment_method: String,                  // paymaster only
    pub customer: String,                        // paymaster only

    pub checkout: String,                // in callback only
    pub status: Option<Status>,          // in callback only
    pub profit: String,                  // in callback only
    pub paid_at: Option<DateTime<Utc>>, // in callback only

    pub raw: Option<Raw>,
}

impl Payment {
    pub fn new(
        id: impl Into<String>,
        amount: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            amount: amount.into(),
            currency: currency.into(),
            ..Self::default()
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == Some(Status::Paid)
    }

    /// Provider payload, narrowed only when the payment came from `checkout`.
    pub(crate) fn raw_as<T: Any>(&self, checkout: &str) -> Option<&T> {
        if self.checkout != checkout {
            return None;
        }
        self.raw.as_ref()?.downcast_ref::<T>()
    }
}

/// Renders a metadata value the way it travels over a string protocol.
pub fn metadata_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Same keys, every value turned into a JSON string.
pub fn text_metadata(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(metadata_text(v))))
        .collect()
}
