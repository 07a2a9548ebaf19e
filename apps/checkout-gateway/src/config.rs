use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub listen_port: u16,
    /// Where verified payments are POSTed as JSON. Logged only when unset.
    pub forward_url: Option<String>,
    pub forward_token: Option<String>,

    pub anypay: Option<AnypayConfig>,
    pub enotio: Option<EnotioConfig>,
    pub payeer: Option<PayeerConfig>,
    pub paymaster: Option<PaymasterConfig>,
    pub qiwi: Option<QiwiConfig>,
    pub yookassa: Option<YooKassaConfig>,
    pub yoomoney: Option<YooMoneyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnypayConfig {
    pub merchant_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnotioConfig {
    pub merchant_id: String,
    pub api_key1: String,
    pub api_key2: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayeerConfig {
    pub merchant_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymasterConfig {
    pub token: String,
    pub merchant_id: String,
    #[serde(default)]
    pub test_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QiwiConfig {
    pub public_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YooKassaConfig {
    pub shop_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YooMoneyConfig {
    pub receiver: String,
    pub secret_key: String,
}

fn default_port() -> u16 {
    8080
}

impl GatewayConfig {
    pub fn load() -> Result<Self> {
        let config_paths = ["/etc/checkout/gateway.toml", "./gateway.toml"];

        for path in config_paths {
            if let Ok(contents) = fs::read_to_string(path) {
                tracing::info!("Loading config from {}", path);
                return Self::parse(&contents).with_context(|| format!("invalid config {}", path));
            }
        }

        tracing::info!("Loading config from environment");
        Ok(Self::from_env(|name| std::env::var(name).ok()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// A provider is configured when all of its variables are set.
    pub fn from_env(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            listen_port: var("LISTEN_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_port),
            forward_url: var("FORWARD_URL"),
            forward_token: var("FORWARD_TOKEN"),

            anypay: Some(AnypayConfig {
                merchant_id: var("ANYPAY_MERCHANT_ID").unwrap_or_default(),
                api_key: var("ANYPAY_API_KEY").unwrap_or_default(),
            })
            .filter(|c| !c.merchant_id.is_empty() && !c.api_key.is_empty()),
            enotio: Some(EnotioConfig {
                merchant_id: var("ENOTIO_MERCHANT_ID").unwrap_or_default(),
                api_key1: var("ENOTIO_API_KEY1").unwrap_or_default(),
                api_key2: var("ENOTIO_API_KEY2").unwrap_or_default(),
            })
            .filter(|c| {
                !c.merchant_id.is_empty() && !c.api_key1.is_empty() && !c.api_key2.is_empty()
            }),
            payeer: Some(PayeerConfig {
                merchant_id: var("PAYEER_MERCHANT_ID").unwrap_or_default(),
                api_key: var("PAYEER_API_KEY").unwrap_or_default(),
            })
            .filter(|c| !c.merchant_id.is_empty() && !c.api_key.is_empty()),
            paymaster: Some(PaymasterConfig {
                token: var("PAYMASTER_TOKEN").unwrap_or_default(),
                merchant_id: var("PAYMASTER_MERCHANT_ID").unwrap_or_default(),
                test_mode: var("PAYMASTER_TEST_MODE").is_some_and(|v| v == "true" || v == "1"),
            })
            .filter(|c| !c.token.is_empty() && !c.merchant_id.is_empty()),
            qiwi: Some(QiwiConfig {
                public_key: var("QIWI_PUBLIC_KEY").unwrap_or_default(),
                secret_key: var("QIWI_SECRET_KEY").unwrap_or_default(),
            })
            .filter(|c| !c.public_key.is_empty() && !c.secret_key.is_empty()),
            yookassa: Some(YooKassaConfig {
                shop_id: var("YOOKASSA_SHOP_ID").unwrap_or_default(),
                api_key: var("YOOKASSA_API_KEY").unwrap_or_default(),
            })
            .filter(|c| !c.shop_id.is_empty() && !c.api_key.is_empty()),
            yoomoney: Some(YooMoneyConfig {
                receiver: var("YOOMONEY_RECEIVER").unwrap_or_default(),
                secret_key: var("YOOMONEY_SECRET_KEY").unwrap_or_default(),
            })
            .filter(|c| !c.receiver.is_empty() && !c.secret_key.is_empty()),
        }
    }
}
