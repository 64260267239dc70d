//! Stripe webhook ingestor.
//!
//! Authenticates inbound events against the endpoint's signing secret and
//! dispatches them to the fulfillment logic in [`super::process`]. Stripe
//! delivers at-least-once and retries on any non-2xx response, so handlers
//! downstream must be idempotent and transient failures must map to 500.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::db::AppState;
use crate::models::SubscriptionStatus;
use crate::payments::{
    StripeCheckoutSession, StripePaymentIntent, StripeSubscription, StripeWebhookEvent,
    StripeWebhookVerifier,
};

use super::process;

/// Outcome of webhook processing: a status plus an operator-facing note.
pub type WebhookResult = (StatusCode, &'static str);

pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (status, note) = ingest(&state, &headers, &body).await;

    if status == StatusCode::OK {
        (status, Json(json!({ "received": true }))).into_response()
    } else {
        (status, Json(json!({ "error": note }))).into_response()
    }
}

async fn ingest(state: &AppState, headers: &HeaderMap, body: &Bytes) -> WebhookResult {
    let Some(signature) = headers.get("stripe-signature").and_then(|v| v.to_str().ok()) else {
        return (StatusCode::BAD_REQUEST, "Missing stripe-signature header");
    };

    // A missing secret is a deployment problem, not Stripe's. Acknowledge
    // so the provider doesn't retry forever against a misconfigured host.
    let Some(webhook_secret) = &state.stripe_webhook_secret else {
        tracing::warn!("Stripe webhook received but STRIPE_WEBHOOK_SECRET is not set");
        return (StatusCode::OK, "Stripe not configured");
    };

    let verifier = StripeWebhookVerifier::new(webhook_secret);
    match verifier.verify_webhook_signature(body, signature) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Stripe webhook rejected: signature mismatch");
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
        Err(e) => {
            tracing::warn!("Stripe webhook rejected: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature");
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse Stripe webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: StripeCheckoutSession = match serde_json::from_value(event.data.object) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to parse checkout session: {}", e);
                    return (StatusCode::BAD_REQUEST, "Invalid checkout session");
                }
            };
            process::complete_checkout(state, session).await
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            let subscription: StripeSubscription = match serde_json::from_value(event.data.object) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to parse subscription: {}", e);
                    return (StatusCode::BAD_REQUEST, "Invalid subscription");
                }
            };
            process::subscription_changed(state, subscription, SubscriptionStatus::Active)
        }
        "customer.subscription.deleted" => {
            let subscription: StripeSubscription = match serde_json::from_value(event.data.object) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to parse subscription: {}", e);
                    return (StatusCode::BAD_REQUEST, "Invalid subscription");
                }
            };
            process::subscription_changed(state, subscription, SubscriptionStatus::Canceled)
        }
        "payment_intent.succeeded" => {
            let intent: StripePaymentIntent = match serde_json::from_value(event.data.object) {
                Ok(i) => i,
                Err(e) => {
                    tracing::error!("Failed to parse payment intent: {}", e);
                    return (StatusCode::BAD_REQUEST, "Invalid payment intent");
                }
            };
            process::payment_intent_succeeded(state, intent)
        }
        other => {
            tracing::debug!("Ignoring Stripe event type: {}", other);
            (StatusCode::OK, "Event ignored")
        }
    }
}
