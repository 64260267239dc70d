use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    query_all, query_one, ANALYTICS_EVENT_COLS, PURCHASE_COLS, TEMPLATE_COLS, USER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let id = EntityType::User.gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, password_hash, subscription_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'none', ?5, ?6)",
        params![&id, &email, &input.name, &input.password_hash, now, now],
    )?;

    Ok(User {
        id,
        email,
        name: input.name.clone(),
        password_hash: input.password_hash.clone(),
        api_token_hash: None,
        stripe_customer_id: None,
        stripe_subscription_id: None,
        subscription_status: SubscriptionStatus::None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

pub fn get_user_by_api_token_hash(conn: &Connection, token_hash: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE api_token_hash = ?1", USER_COLS),
        &[&token_hash],
    )
}

pub fn set_user_api_token_hash(
    conn: &Connection,
    user_id: &str,
    token_hash: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET api_token_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![token_hash, now(), user_id],
    )?;
    Ok(affected > 0)
}

/// Set a new password hash and invalidate the active bearer token.
pub fn set_user_password(conn: &Connection, user_id: &str, password_hash: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET password_hash = ?1, api_token_hash = NULL, updated_at = ?2 WHERE id = ?3",
        params![password_hash, now(), user_id],
    )?;
    Ok(affected > 0)
}

pub fn get_user_by_stripe_customer(
    conn: &Connection,
    stripe_customer_id: &str,
) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE stripe_customer_id = ?1", USER_COLS),
        &[&stripe_customer_id],
    )
}

pub fn set_user_subscription(
    conn: &Connection,
    user_id: &str,
    subscription_id: Option<&str>,
    status: SubscriptionStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users
         SET stripe_subscription_id = ?1, subscription_status = ?2, updated_at = ?3
         WHERE id = ?4",
        params![subscription_id, status.as_str(), now(), user_id],
    )?;
    Ok(affected > 0)
}

pub fn set_user_stripe_customer(
    conn: &Connection,
    user_id: &str,
    stripe_customer_id: &str,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET stripe_customer_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![stripe_customer_id, now(), user_id],
    )?;
    Ok(affected > 0)
}

// ============ Templates ============

pub fn create_template(conn: &Connection, input: &CreateTemplate) -> Result<Template> {
    let id = EntityType::Template.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO templates (id, seller_id, name, category, code, price_cents, sales, downloads, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?8)",
        params![
            &id,
            &input.seller_id,
            &input.name,
            &input.category,
            &input.code,
            input.price_cents,
            now,
            now
        ],
    )?;

    Ok(Template {
        id,
        seller_id: input.seller_id.clone(),
        name: input.name.clone(),
        category: input.category.clone(),
        code: input.code.clone(),
        price_cents: input.price_cents,
        sales: 0,
        downloads: 0,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_template_by_id(conn: &Connection, id: &str) -> Result<Option<Template>> {
    query_one(
        conn,
        &format!("SELECT {} FROM templates WHERE id = ?1", TEMPLATE_COLS),
        &[&id],
    )
}

/// Atomic increment so concurrent webhooks cannot under-count.
pub fn increment_template_sales(conn: &Connection, template_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE templates SET sales = sales + 1, updated_at = ?1 WHERE id = ?2",
        params![now(), template_id],
    )?;
    Ok(affected > 0)
}

/// Atomic increment so concurrent downloads cannot under-count.
pub fn increment_template_downloads(conn: &Connection, template_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE templates SET downloads = downloads + 1, updated_at = ?1 WHERE id = ?2",
        params![now(), template_id],
    )?;
    Ok(affected > 0)
}

// ============ Purchases ============

/// Idempotently record a purchase.
///
/// Redelivered webhook events hit the UNIQUE(transaction_id) constraint and
/// a repeat buy hits UNIQUE(user_id, template_id); both collapse to
/// `Ok(None)` via INSERT OR IGNORE so the webhook can acknowledge with 200
/// instead of tripping the provider's retry loop.
pub fn create_purchase(conn: &Connection, input: &CreatePurchase) -> Result<Option<Purchase>> {
    let id = EntityType::Purchase.gen_id();
    let now = now();

    let affected = conn.execute(
        "INSERT OR IGNORE INTO purchases
         (id, user_id, template_id, seller_id, price_cents, transaction_id, payment_method, status, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'completed', ?8, ?9)",
        params![
            &id,
            &input.user_id,
            &input.template_id,
            &input.seller_id,
            input.price_cents,
            &input.transaction_id,
            &input.payment_method,
            &input.metadata,
            now
        ],
    )?;

    if affected == 0 {
        return Ok(None);
    }

    Ok(Some(Purchase {
        id,
        user_id: input.user_id.clone(),
        template_id: input.template_id.clone(),
        seller_id: input.seller_id.clone(),
        price_cents: input.price_cents,
        transaction_id: input.transaction_id.clone(),
        payment_method: input.payment_method.clone(),
        status: PurchaseStatus::Completed,
        metadata: input.metadata.clone(),
        created_at: now,
    }))
}

pub fn get_purchase_by_id(conn: &Connection, id: &str) -> Result<Option<Purchase>> {
    query_one(
        conn,
        &format!("SELECT {} FROM purchases WHERE id = ?1", PURCHASE_COLS),
        &[&id],
    )
}

pub fn get_purchase_by_transaction_id(
    conn: &Connection,
    transaction_id: &str,
) -> Result<Option<Purchase>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM purchases WHERE transaction_id = ?1",
            PURCHASE_COLS
        ),
        &[&transaction_id],
    )
}

pub fn count_purchases(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM purchases", [], |row| row.get(0))?;
    Ok(count)
}

// ============ Analytics ============

pub fn insert_analytics_event(
    conn: &Connection,
    event_type: AnalyticsEventType,
    event_data: &serde_json::Value,
) -> Result<AnalyticsEvent> {
    let id = EntityType::AnalyticsEvent.gen_id();
    let now = now();
    let data = event_data.to_string();

    conn.execute(
        "INSERT INTO analytics_events (id, event_type, event_data, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![&id, event_type.as_str(), &data, now],
    )?;

    Ok(AnalyticsEvent {
        id,
        event_type,
        event_data: data,
        created_at: now,
    })
}

pub fn list_analytics_events(
    conn: &Connection,
    event_type: AnalyticsEventType,
) -> Result<Vec<AnalyticsEvent>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM analytics_events WHERE event_type = ?1 ORDER BY created_at DESC",
            ANALYTICS_EVENT_COLS
        ),
        &[&event_type.as_str()],
    )
}
