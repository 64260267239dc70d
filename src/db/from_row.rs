//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupted values.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, password_hash, api_token_hash, stripe_customer_id, stripe_subscription_id, subscription_status, created_at, updated_at";

pub const TEMPLATE_COLS: &str =
    "id, seller_id, name, category, code, price_cents, sales, downloads, created_at, updated_at";

pub const PURCHASE_COLS: &str = "id, user_id, template_id, seller_id, price_cents, transaction_id, payment_method, status, metadata, created_at";

pub const ANALYTICS_EVENT_COLS: &str = "id, event_type, event_data, created_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            password_hash: row.get(3)?,
            api_token_hash: row.get(4)?,
            stripe_customer_id: row.get(5)?,
            stripe_subscription_id: row.get(6)?,
            subscription_status: parse_enum(row, 7, "subscription_status")?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Template {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Template {
            id: row.get(0)?,
            seller_id: row.get(1)?,
            name: row.get(2)?,
            category: row.get(3)?,
            code: row.get(4)?,
            price_cents: row.get(5)?,
            sales: row.get(6)?,
            downloads: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Purchase {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Purchase {
            id: row.get(0)?,
            user_id: row.get(1)?,
            template_id: row.get(2)?,
            seller_id: row.get(3)?,
            price_cents: row.get(4)?,
            transaction_id: row.get(5)?,
            payment_method: row.get(6)?,
            status: parse_enum(row, 7, "status")?,
            metadata: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

impl FromRow for AnalyticsEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AnalyticsEvent {
            id: row.get(0)?,
            event_type: parse_enum(row, 1, "event_type")?,
            event_data: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}
