//! Test utilities and fixtures for tripvault integration tests

#![allow(dead_code)]

use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use tripvault::crypto;
pub use tripvault::db::{init_db, queries, AppState};
pub use tripvault::email::EmailService;
pub use tripvault::handlers;
pub use tripvault::models::*;
pub use tripvault::token::TokenService;

/// Signing secret used by every test AppState.
pub const TEST_TOKEN_SECRET: &str = "test-token-secret";

/// Stripe webhook secret used by every test AppState.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create an AppState for testing with an in-memory database.
/// Pool size 1 so every handler sees the same connection.
pub fn create_test_app_state() -> AppState {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        base_url: "http://localhost:3000".to_string(),
        tokens: TokenService::new(TEST_TOKEN_SECRET),
        email: EmailService::new(None, "test@runyourtrip.com".to_string()),
        support_email: "support@runyourtrip.com".to_string(),
        stripe_webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
    }
}

/// Create a Router with all endpoints (without rate limiting for tests)
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::health_router())
        .merge(handlers::webhooks::router())
        .merge(handlers::download::router(state.clone()))
        .merge(handlers::auth::router())
        .with_state(state)
}

/// Create a test user with password "password123"
pub fn create_test_user(conn: &Connection, email: &str) -> User {
    let input = CreateUser {
        email: email.to_string(),
        name: format!("Test User {}", email),
        password_hash: crypto::hash_password("password123").expect("Failed to hash password"),
    };
    queries::create_user(conn, &input).expect("Failed to create test user")
}

/// Issue a bearer token for a user without going through /api/auth/login
pub fn issue_bearer_token(conn: &Connection, user_id: &str) -> String {
    let token = crypto::generate_bearer_token();
    queries::set_user_api_token_hash(conn, user_id, Some(&crypto::hash_secret(&token)))
        .expect("Failed to store bearer token");
    token
}

/// Create a test template with a three-file JSON bundle
pub fn create_test_template(conn: &Connection, seller_id: &str, name: &str) -> Template {
    create_test_template_with(
        conn,
        seller_id,
        name,
        "Travel Blog",
        r#"{"html":"<h1>A</h1>","css":"body{}","js":"console.log(1)"}"#,
    )
}

pub fn create_test_template_with(
    conn: &Connection,
    seller_id: &str,
    name: &str,
    category: &str,
    code: &str,
) -> Template {
    let input = CreateTemplate {
        seller_id: seller_id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        code: code.to_string(),
        price_cents: 4900,
    };
    queries::create_template(conn, &input).expect("Failed to create test template")
}

/// Create a completed test purchase
pub fn create_test_purchase(conn: &Connection, user_id: &str, template: &Template) -> Purchase {
    let input = CreatePurchase {
        user_id: user_id.to_string(),
        template_id: template.id.clone(),
        seller_id: template.seller_id.clone(),
        price_cents: template.price_cents,
        transaction_id: format!("cs_test_{}", uuid_suffix()),
        payment_method: "stripe".to_string(),
        metadata: None,
    };
    queries::create_purchase(conn, &input)
        .expect("Failed to create test purchase")
        .expect("Test purchase collided with an existing row")
}

fn uuid_suffix() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ============ Token helpers ============

/// Hand-compute a download token with an arbitrary timestamp, the same way
/// the service mints them. Lets tests probe the expiry boundary.
pub fn make_download_token(secret: &str, purchase_id: &str, timestamp_ms: i64) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let signature = hmac_sha256_hex(secret, &format!("{}-{}", purchase_id, timestamp_ms));
    URL_SAFE_NO_PAD.encode(format!("{}.{}", timestamp_ms, signature))
}

pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============ Stripe webhook helpers ============

/// Compute a valid `stripe-signature` header for a payload.
pub fn stripe_signature(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let signature = hmac_sha256_hex(secret, &signed_payload);
    format!("t={},v1={}", timestamp, signature)
}

/// Build a checkout.session.completed event payload.
pub fn checkout_completed_payload(
    session_id: &str,
    template_id: &str,
    user_id: &str,
    amount_total: i64,
) -> String {
    serde_json::json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_status": "paid",
                "amount_total": amount_total,
                "currency": "usd",
                "customer": "cus_test_1",
                "customer_details": { "email": "buyer@example.com" },
                "metadata": {
                    "productId": template_id,
                    "userId": user_id,
                    "productName": "Test Template"
                }
            }
        }
    })
    .to_string()
}
