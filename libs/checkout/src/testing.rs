use crate::payment::Payment;
use crate::webhook::{Callback, Inbound};
use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use std::sync::{Arc, Mutex};

/// Callback that keeps every payment it receives.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Payment>>>,
    fail: bool,
}

impl Recorder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Callback for Recorder {
    async fn call(&self, payment: Payment) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(payment);
        if self.fail {
            anyhow::bail!("balance storage unavailable");
        }
        Ok(())
    }
}

pub fn form(pairs: &[(&str, &str)]) -> Inbound {
    Inbound::new(serde_urlencoded::to_string(pairs).unwrap())
}

pub fn json(body: &serde_json::Value) -> Inbound {
    Inbound::new(serde_json::to_vec(body).unwrap())
}

pub fn with_header(mut inbound: Inbound, name: &'static str, value: &str) -> Inbound {
    inbound.headers.insert(
        HeaderName::from_static(name),
        HeaderValue::from_str(value).unwrap(),
    );
    inbound
}

/// Parses the query string of a generated link.
pub fn query(url: &str) -> Vec<(String, String)> {
    let (_, query) = url.split_once('?').unwrap();
    serde_urlencoded::from_str(query).unwrap()
}

pub fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
