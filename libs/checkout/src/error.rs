use axum::http::StatusCode;
use thiserror::Error;

/// Failure while building an outbound payment request.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("query: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    #[error("checkout/{checkout}: {code} ({message})")]
    Provider {
        checkout: &'static str,
        code: String,
        message: String,
    },

    #[error("checkout/{0}: no redirect url in response")]
    MissingUrl(&'static str),

    #[error("invalid amount: {0}")]
    Amount(#[from] rust_decimal::Error),
}

/// Failure while handling an inbound notification.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("malformed notification: {0}")]
    Malformed(String),

    #[error("bad timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },

    #[error("bad signature")]
    Signature,

    #[error("callback failed: {0}")]
    Callback(#[source] anyhow::Error),
}

impl WebhookError {
    pub fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }

    /// 403 only for an untrusted request, everything else is a broken one.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Signature => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err)
    }
}

impl From<serde_urlencoded::de::Error> for WebhookError {
    fn from(err: serde_urlencoded::de::Error) -> Self {
        Self::malformed(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_forbidden_everything_else_internal() {
        assert_eq!(WebhookError::Signature.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            WebhookError::malformed("eof").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebhookError::Timestamp {
                value: "x".into(),
                reason: "y".into()
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            WebhookError::Callback(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
