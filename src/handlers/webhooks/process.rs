//! Fulfillment logic behind verified Stripe events.
//!
//! Everything here tolerates redelivery: purchase inserts are idempotent on
//! transaction id, counter bumps are atomic SQL updates, and side effects
//! (email, analytics) are best-effort - they log and never fail the event.

use axum::http::StatusCode;

use crate::db::{queries, AppState};
use crate::models::{AnalyticsEventType, CreatePurchase, SubscriptionStatus};
use crate::payments::{StripeCheckoutSession, StripePaymentIntent, StripeSubscription};

use super::stripe::WebhookResult;

/// Record a completed checkout: insert the purchase, bump the sales
/// counter, mint a download link, and fan out email + analytics.
///
/// Malformed metadata and unknown templates are acknowledged with 200 -
/// retrying cannot fix them, and a retry storm helps nobody.
pub async fn complete_checkout(state: &AppState, session: StripeCheckoutSession) -> WebhookResult {
    if session.payment_status.as_deref() != Some("paid") {
        return (StatusCode::OK, "Checkout not paid");
    }

    let (Some(template_id), Some(user_id)) =
        (&session.metadata.product_id, &session.metadata.user_id)
    else {
        tracing::warn!(
            "Checkout session {} missing productId/userId metadata, skipping",
            session.id
        );
        return (StatusCode::OK, "Missing checkout metadata");
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let template = match queries::get_template_by_id(&conn, template_id) {
        Ok(Some(t)) => t,
        Ok(None) => {
            tracing::warn!(
                "Checkout session {} references unknown template {}, skipping",
                session.id,
                template_id
            );
            return (StatusCode::OK, "Template not found");
        }
        Err(e) => {
            tracing::error!("Failed to load template {}: {}", template_id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let buyer_email = session
        .customer_details
        .as_ref()
        .and_then(|d| d.email.clone());

    let metadata = serde_json::json!({
        "stripe_session_id": session.id,
        "payment_status": session.payment_status,
        "buyer_email": buyer_email,
    });

    let input = CreatePurchase {
        user_id: user_id.clone(),
        template_id: template.id.clone(),
        seller_id: template.seller_id.clone(),
        price_cents: session.amount_total.unwrap_or(0),
        transaction_id: session.id.clone(),
        payment_method: "stripe".to_string(),
        metadata: Some(metadata.to_string()),
    };

    let purchase = match queries::create_purchase(&conn, &input) {
        Ok(Some(p)) => p,
        Ok(None) => {
            // Redelivered event - the unique constraint already holds the row
            tracing::info!(
                "Checkout session {} already recorded, acknowledging",
                session.id
            );
            return (StatusCode::OK, "Already processed");
        }
        Err(e) => {
            tracing::error!("Failed to record purchase for session {}: {}", session.id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to record purchase");
        }
    };

    if let Err(e) = queries::increment_template_sales(&conn, &template.id) {
        tracing::warn!("Failed to increment sales for template {}: {}", template.id, e);
    }

    // Mint the download link and notify the buyer. A failed email must
    // never make Stripe believe the purchase failed.
    let token = state.tokens.issue_download_token(&purchase.id);
    let download_url = format!(
        "{}/api/download/{}?token={}",
        state.base_url, purchase.id, token
    );

    let product_name = session
        .metadata
        .product_name
        .clone()
        .unwrap_or_else(|| template.name.clone());

    if let Some(email) = &buyer_email {
        if let Err(e) = state
            .email
            .send_purchase_confirmation(email, &product_name, &download_url)
            .await
        {
            tracing::warn!("Failed to send purchase confirmation to {}: {}", email, e);
        }
    } else {
        tracing::warn!(
            "No buyer email on checkout session {}, confirmation not sent",
            session.id
        );
    }

    let event_data = serde_json::json!({
        "purchase_id": purchase.id,
        "template_id": template.id,
        "user_id": purchase.user_id,
        "amount_cents": purchase.price_cents,
        "currency": session.currency,
        "stripe_session_id": session.id,
    });
    if let Err(e) = queries::insert_analytics_event(&conn, AnalyticsEventType::Purchase, &event_data)
    {
        tracing::warn!("Failed to record purchase analytics event: {}", e);
    }

    tracing::info!(
        "Purchase recorded: purchase_id={}, template_id={}, session={}, amount_cents={}",
        purchase.id,
        template.id,
        session.id,
        purchase.price_cents
    );

    (StatusCode::OK, "OK")
}

/// Mark the buyer's subscription active or canceled based on the Stripe
/// customer on the event.
pub fn subscription_changed(
    state: &AppState,
    subscription: StripeSubscription,
    status: SubscriptionStatus,
) -> WebhookResult {
    let Some(customer_id) = &subscription.customer else {
        return (StatusCode::OK, "No customer on subscription");
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    let user = match queries::get_user_by_stripe_customer(&conn, customer_id) {
        Ok(Some(u)) => u,
        Ok(None) => {
            tracing::warn!(
                "Subscription {} for unknown Stripe customer {}, skipping",
                subscription.id,
                customer_id
            );
            return (StatusCode::OK, "No account for customer");
        }
        Err(e) => {
            tracing::error!("Failed to look up Stripe customer {}: {}", customer_id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    if let Err(e) =
        queries::set_user_subscription(&conn, &user.id, Some(&subscription.id), status)
    {
        tracing::error!("Failed to update subscription for user {}: {}", user.id, e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update subscription");
    }

    tracing::info!(
        "Subscription {}: user={}, subscription={}",
        status.as_str(),
        user.id,
        subscription.id
    );

    (StatusCode::OK, "OK")
}

/// Fallback sales counter for payments that did not go through a checkout
/// session (no purchase row is created without buyer metadata).
pub fn payment_intent_succeeded(state: &AppState, intent: StripePaymentIntent) -> WebhookResult {
    let Some(template_id) = &intent.metadata.product_id else {
        return (StatusCode::OK, "No product metadata");
    };

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
        }
    };

    match queries::increment_template_sales(&conn, template_id) {
        Ok(true) => {
            tracing::info!(
                "Sale counted for template {} via payment intent {}",
                template_id,
                intent.id
            );
            (StatusCode::OK, "OK")
        }
        Ok(false) => {
            tracing::warn!(
                "Payment intent {} references unknown template {}, skipping",
                intent.id,
                template_id
            );
            (StatusCode::OK, "Template not found")
        }
        Err(e) => {
            tracing::error!("Failed to increment sales for template {}: {}", template_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}
