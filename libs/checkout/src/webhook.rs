use crate::Checkout;
use crate::error::WebhookError;
use crate::payment::Payment;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, post};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Receives every verified payment. An error makes the webhook answer 500 so
/// the provider delivers the notification again.
#[async_trait]
pub trait Callback: Send + Sync {
    async fn call(&self, payment: Payment) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Callback for F
where
    F: Fn(Payment) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn call(&self, payment: Payment) -> anyhow::Result<()> {
        (self)(payment).await
    }
}

/// Raw notification as it reached the host server.
#[derive(Debug, Clone, Default)]
pub struct Inbound {
    pub headers: HeaderMap,
    pub query: Option<String>,
    pub body: Bytes,
}

impl Inbound {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Header value, empty when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// What the webhook answers to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Option<String>,
}

impl Reply {
    pub fn status(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: Some(body.into()),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, body).into_response(),
            None => self.status.into_response(),
        }
    }
}

/// A checkout bound to a callback.
#[derive(Clone)]
pub struct Webhook {
    checkout: Arc<dyn Checkout>,
    callback: Arc<dyn Callback>,
}

impl Webhook {
    pub fn new(checkout: Arc<dyn Checkout>, callback: Arc<dyn Callback>) -> Self {
        Self { checkout, callback }
    }

    pub fn name(&self) -> &'static str {
        self.checkout.name()
    }

    /// Authenticates one notification and, only if it checks out, passes the
    /// normalized payment to the callback.
    pub async fn handle(&self, inbound: Inbound) -> Reply {
        let name = self.checkout.name();

        let payment = match self.checkout.notification(&inbound) {
            Ok(payment) => payment,
            Err(e @ WebhookError::Signature) => {
                warn!(checkout = name, "rejected notification: {}", e);
                return Reply::status(e.status());
            }
            Err(e) => {
                error!(checkout = name, "{}", e);
                return Reply::status(e.status());
            }
        };

        let id = payment.id.clone();
        info!(checkout = name, id = %id, status = ?payment.status, "notification verified");

        match self.callback.call(payment).await {
            Ok(()) => self.checkout.reply(&id, true),
            Err(e) => {
                let e = WebhookError::Callback(e);
                error!(checkout = name, id = %id, "{:#}", e);
                self.checkout.reply(&id, false)
            }
        }
    }

    /// POST handler for an axum router.
    pub fn route<S>(self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        post(move |uri: Uri, headers: HeaderMap, body: Bytes| {
            let hook = self.clone();
            async move {
                let inbound = Inbound {
                    headers,
                    query: uri.query().map(str::to_owned),
                    body,
                };
                hook.handle(inbound).await
            }
        })
    }
}
