use crate::config::GatewayConfig;
use checkout::Checkout;
use checkout::anypay::Anypay;
use checkout::enotio::Enotio;
use checkout::payeer::Payeer;
use checkout::paymaster::Paymaster;
use checkout::qiwi::Qiwi;
use checkout::yookassa::YooKassa;
use checkout::yoomoney::YooMoney;
use std::sync::Arc;

/// Every provider that has a config section, in a stable order.
pub fn configured(config: &GatewayConfig) -> Vec<Arc<dyn Checkout>> {
    let mut checkouts: Vec<Arc<dyn Checkout>> = Vec::new();

    if let Some(c) = &config.anypay {
        checkouts.push(Arc::new(Anypay::new(c.merchant_id.clone(), c.api_key.clone())));
    }
    if let Some(c) = &config.enotio {
        checkouts.push(Arc::new(Enotio::new(
            c.merchant_id.clone(),
            c.api_key1.clone(),
            c.api_key2.clone(),
        )));
    }
    if let Some(c) = &config.payeer {
        checkouts.push(Arc::new(Payeer::new(c.merchant_id.clone(), c.api_key.clone())));
    }
    if let Some(c) = &config.paymaster {
        checkouts.push(Arc::new(
            Paymaster::new(c.token.clone(), c.merchant_id.clone()).with_test_mode(c.test_mode),
        ));
    }
    if let Some(c) = &config.qiwi {
        checkouts.push(Arc::new(Qiwi::new(c.public_key.clone(), c.secret_key.clone())));
    }
    if let Some(c) = &config.yookassa {
        checkouts.push(Arc::new(YooKassa::new(c.shop_id.clone(), c.api_key.clone())));
    }
    if let Some(c) = &config.yoomoney {
        checkouts.push(Arc::new(YooMoney::new(c.receiver.clone(), c.secret_key.clone())));
    }

    checkouts
}

pub fn find(checkouts: &[Arc<dyn Checkout>], name: &str) -> Option<Arc<dyn Checkout>> {
    checkouts.iter().find(|c| c.name() == name).cloned()
}
