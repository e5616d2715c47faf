use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::config::RazorpayConfig;

type HmacSha256 = Hmac<Sha256>;

const ORDERS_URL: &str = "https://api.razorpay.com/v1/orders";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount_minor_units: i64,
        currency: &str,
        capture: bool,
    ) -> anyhow::Result<GatewayOrder>;
}

/// Razorpay REST client (orders API only).
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    payment_capture: u8,
}

impl RazorpayClient {
    pub fn new(cfg: &RazorpayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("build razorpay http client")?;
        Ok(Self {
            http,
            key_id: cfg.key_id.clone(),
            key_secret: cfg.key_secret.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount_minor_units: i64,
        currency: &str,
        capture: bool,
    ) -> anyhow::Result<GatewayOrder> {
        let order: GatewayOrder = self
            .http
            .post(ORDERS_URL)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderBody {
                amount: amount_minor_units,
                currency,
                payment_capture: u8::from(capture),
            })
            .send()
            .await
            .context("razorpay create order")?
            .error_for_status()
            .context("razorpay create order status")?
            .json()
            .await
            .context("razorpay create order body")?;
        debug!(order_id = %order.id, "razorpay order created");
        Ok(order)
    }
}

#[cfg(test)]
fn hmac_hex(secret: &str, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_hmac(secret: &str, payload: &[u8], signature_hex: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Checkout signature: HMAC-SHA256(key_secret, "order_id|payment_id").
pub fn verify_payment_signature(
    key_secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    verify_hmac(key_secret, format!("{order_id}|{payment_id}").as_bytes(), signature)
}

/// Webhook signature: HMAC-SHA256(webhook_secret, raw body).
pub fn verify_webhook_signature(webhook_secret: &str, body: &[u8], signature: &str) -> bool {
    verify_hmac(webhook_secret, body, signature)
}

/// Signature the gateway puts in `X-Razorpay-Signature`.
#[cfg(test)]
pub fn sign_webhook(webhook_secret: &str, body: &[u8]) -> String {
    hmac_hex(webhook_secret, body)
}

#[cfg(test)]
pub fn sign_payment(key_secret: &str, order_id: &str, payment_id: &str) -> String {
    hmac_hex(key_secret, format!("{order_id}|{payment_id}").as_bytes())
}

#[cfg(test)]
pub mod fake {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Hands out sequential order ids, or fails when asked to.
    #[derive(Default)]
    pub struct StubGateway {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_order(
            &self,
            amount_minor_units: i64,
            currency: &str,
            _capture: bool,
        ) -> anyhow::Result<GatewayOrder> {
            if self.fail {
                anyhow::bail!("gateway timed out");
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(GatewayOrder {
                id: format!("order_test_{n}"),
                amount: amount_minor_units,
                currency: currency.to_string(),
            })
        }
    }
}
