use anyhow::{Context, Result};
use async_trait::async_trait;
use checkout::{Callback, Metadata, Payment, Status};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;

/// What the billing side receives for every verified payment.
#[derive(Debug, Serialize)]
pub struct PaymentEvent<'a> {
    pub checkout: &'a str,
    pub id: &'a str,
    pub amount: &'a str,
    pub currency: &'a str,
    pub profit: &'a str,
    pub comment: &'a str,
    pub status: Option<Status>,
    pub paid_at: Option<DateTime<Utc>>,
    pub metadata: &'a Metadata,
}

impl<'a> From<&'a Payment> for PaymentEvent<'a> {
    fn from(p: &'a Payment) -> Self {
        Self {
            checkout: &p.checkout,
            id: &p.id,
            amount: &p.amount,
            currency: &p.currency,
            profit: &p.profit,
            comment: &p.comment,
            status: p.status,
            paid_at: p.paid_at,
            metadata: &p.metadata,
        }
    }
}

/// Logs each payment and, when a target is configured, POSTs it there.
/// A failed delivery fails the webhook so the provider retries.
#[derive(Clone)]
pub struct Forwarder {
    client: Client,
    url: Option<String>,
    token: Option<String>,
}

impl Forwarder {
    pub fn new(url: Option<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            token,
        }
    }
}

#[async_trait]
impl Callback for Forwarder {
    async fn call(&self, payment: Payment) -> Result<()> {
        tracing::info!(
            checkout = %payment.checkout,
            id = %payment.id,
            amount = %payment.amount,
            currency = %payment.currency,
            profit = %payment.profit,
            status = ?payment.status,
            paid = payment.is_paid(),
            "payment received"
        );

        let Some(url) = &self.url else {
            return Ok(());
        };

        let mut req = self.client.post(url).json(&PaymentEvent::from(&payment));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        req.send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("forwarding payment {} to {}", payment.id, url))?;

        Ok(())
    }
}
