//! Payment gateway adapter.
//!
//! Constructed once at startup and passed around as an immutable
//! capability object. Without provider credentials the adapter runs in
//! mock mode: order ids are synthesized locally and verification always
//! succeeds. Mock mode is a non-production affordance, not a security
//! fallback.

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::config::PaymentCredentials;

const ORDERS_URL: &str = "https://api.razorpay.com/v1/orders";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("order request failed: {0}")]
    Request(String),
    #[error("provider rejected the order: status {0}")]
    Rejected(u16),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Order {
    pub id: String,
    pub amount: u64,
    pub currency: String,
}

enum Mode {
    Live {
        key_id: String,
        key_secret: String,
        http: Client,
    },
    Mock,
}

pub struct PaymentGateway {
    mode: Mode,
}

impl PaymentGateway {
    pub fn from_credentials(creds: Option<PaymentCredentials>) -> Self {
        match creds {
            Some(creds) => {
                tracing::info!("payment gateway running in live mode");
                PaymentGateway {
                    mode: Mode::Live {
                        key_id: creds.key_id,
                        key_secret: creds.key_secret,
                        http: Client::new(),
                    },
                }
            }
            None => {
                tracing::warn!("payment provider keys not found, running in mock mode");
                PaymentGateway { mode: Mode::Mock }
            }
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.mode, Mode::Mock)
    }

    /// Create an order with the provider, or synthesize one in mock mode.
    pub async fn create_order(&self, amount: u64, currency: &str) -> Result<Order, GatewayError> {
        match &self.mode {
            Mode::Mock => Ok(Order {
                id: format!("order_mock_{}", Utc::now().timestamp_millis()),
                amount,
                currency: currency.to_owned(),
            }),
            Mode::Live {
                key_id,
                key_secret,
                http,
            } => {
                let receipt = format!("receipt_{}", Utc::now().timestamp_millis());
                let res = http
                    .post(ORDERS_URL)
                    .basic_auth(key_id, Some(key_secret))
                    .json(&serde_json::json!({
                        "amount": amount,
                        "currency": currency,
                        "receipt": receipt,
                    }))
                    .send()
                    .await
                    .map_err(|e| GatewayError::Request(e.to_string()))?;
                if !res.status().is_success() {
                    return Err(GatewayError::Rejected(res.status().as_u16()));
                }
                res.json::<Order>()
                    .await
                    .map_err(|e| GatewayError::Request(e.to_string()))
            }
        }
    }

    /// Recompute HMAC-SHA256 over `orderId|paymentId` and compare against
    /// the supplied hex signature in constant time. Any mismatch (or
    /// undecodable signature) is `false`, never an error. Mock mode always
    /// verifies.
    pub fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        match &self.mode {
            Mode::Mock => true,
            Mode::Live { key_secret, .. } => {
                let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(key_secret.as_bytes()) else {
                    return false;
                };
                mac.update(format!("{order_id}|{payment_id}").as_bytes());
                let Ok(raw) = hex::decode(signature) else {
                    return false;
                };
                mac.verify_slice(&raw).is_ok()
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn signature_for(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
