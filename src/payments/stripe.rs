use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verifies Stripe webhook signatures against the endpoint's signing secret.
#[derive(Debug, Clone)]
pub struct StripeWebhookVerifier {
    webhook_secret: String,
}

impl StripeWebhookVerifier {
    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    pub fn new(webhook_secret: &str) -> Self {
        Self {
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Verify a `stripe-signature` header over the exact raw body bytes.
    ///
    /// The body must not have been parsed and re-serialized before this
    /// check; re-serialization changes byte-for-byte content and
    /// invalidates the signature.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature
        let parts: Vec<&str> = signature.split(',').collect();

        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in parts {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str = timestamp
            .ok_or_else(|| AppError::BadRequest("Invalid signature format".into()))?;
        let sig_v1 =
            sig_v1.ok_or_else(|| AppError::BadRequest("Invalid signature format".into()))?;

        // Parse and validate timestamp to prevent replay attacks.
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid timestamp in signature".into()))?;

        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }

        // Also reject timestamps from the future (clock skew tolerance: 60 seconds)
        if age < -60 {
            tracing::warn!(
                "Stripe webhook rejected: timestamp in the future (age={}s)",
                age
            );
            return Ok(false);
        }

        // Construct signed payload
        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

        // Compute expected signature
        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal("Invalid webhook secret".into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison to prevent timing attacks.
        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();

        // Length check is not constant-time, but signature length is not
        // secret (always 64 hex chars for SHA-256)
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: Option<String>,
    /// Total charged in minor units (cents)
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub customer: Option<String>,
    pub customer_details: Option<StripeCustomerDetails>,
    #[serde(default)]
    pub metadata: StripeCheckoutMetadata,
}

#[derive(Debug, Deserialize)]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
}

/// Checkout metadata set by the storefront when the session is created.
#[derive(Debug, Default, Deserialize)]
pub struct StripeCheckoutMetadata {
    #[serde(rename = "productId")]
    pub product_id: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "productName")]
    pub product_name: Option<String>,
}

// ============ customer.subscription.* ============

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: Option<String>,
    pub status: Option<String>,
}

// ============ payment_intent.succeeded ============

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: StripeCheckoutMetadata,
}
