pub mod process;
pub mod stripe;

pub use stripe::handle_stripe_webhook;

use axum::{routing::post, Router};

use crate::db::AppState;

/// Webhook routes take the raw request body (axum `Bytes`), so signature
/// verification sees the exact bytes Stripe signed. No JSON middleware may
/// touch this route.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/stripe/webhook", post(handle_stripe_webhook))
}
