use async_trait::async_trait;
use axum::http::StatusCode;
use std::sync::Arc;

pub mod error;
pub mod payment;
pub mod webhook;
pub mod wire;

pub mod anypay;
pub mod enotio;
pub mod payeer;
pub mod paymaster;
pub mod qiwi;
pub mod yookassa;
pub mod yoomoney;

#[cfg(test)]
mod testing;

pub use error::{CheckoutError, WebhookError};
pub use payment::{Metadata, Payment, RUB, Raw, Status, UAH, USD};
pub use webhook::{Callback, Inbound, Reply, Webhook};

/// The two operations every payment acquiring provides.
#[async_trait]
pub trait Checkout: Send + Sync {
    /// Provider tag, also stored in [`Payment::checkout`].
    fn name(&self) -> &'static str;

    /// Build the payment link intended for the end user.
    async fn request(&self, payment: &Payment) -> Result<String, CheckoutError>;

    /// Parse and authenticate a notification and normalize it.
    fn notification(&self, inbound: &Inbound) -> Result<Payment, WebhookError>;

    /// Answer once the callback has run.
    fn reply(&self, _id: &str, delivered: bool) -> Reply {
        if delivered {
            Reply::status(StatusCode::OK)
        } else {
            Reply::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }

    /// Bind the checkout to a callback, producing the notification handler.
    fn webhook<C>(self, callback: C) -> Webhook
    where
        Self: Sized + 'static,
        C: Callback + 'static,
    {
        Webhook::new(Arc::new(self), Arc::new(callback))
    }
}
