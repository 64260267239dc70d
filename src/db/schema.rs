use rusqlite::Connection;

/// Initialize the database schema
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Marketplace accounts (buyers and sellers)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            api_token_hash TEXT,
            stripe_customer_id TEXT,
            stripe_subscription_id TEXT,
            subscription_status TEXT NOT NULL DEFAULT 'none'
                CHECK (subscription_status IN ('none', 'active', 'canceled')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
        CREATE INDEX IF NOT EXISTS idx_users_api_token ON users(api_token_hash);
        CREATE INDEX IF NOT EXISTS idx_users_stripe_customer ON users(stripe_customer_id);

        -- Travel website templates. The fulfillment core only reads code
        -- and bumps the sales/downloads counters.
        CREATE TABLE IF NOT EXISTS templates (
            id TEXT PRIMARY KEY,
            seller_id TEXT NOT NULL REFERENCES users(id),
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            code TEXT NOT NULL,
            price_cents INTEGER NOT NULL DEFAULT 0,
            sales INTEGER NOT NULL DEFAULT 0,
            downloads INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_templates_seller ON templates(seller_id);

        -- Purchases. transaction_id uniqueness is the idempotency anchor
        -- for webhook redelivery; (user_id, template_id) uniqueness models
        -- one purchase per buyer per template. Rows are never deleted.
        CREATE TABLE IF NOT EXISTS purchases (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            template_id TEXT NOT NULL REFERENCES templates(id),
            seller_id TEXT NOT NULL REFERENCES users(id),
            price_cents INTEGER NOT NULL,
            transaction_id TEXT NOT NULL,
            payment_method TEXT NOT NULL DEFAULT 'stripe',
            status TEXT NOT NULL DEFAULT 'completed'
                CHECK (status IN ('pending', 'completed', 'refunded')),
            metadata TEXT,
            created_at INTEGER NOT NULL,

            UNIQUE(transaction_id),
            UNIQUE(user_id, template_id)
        );
        CREATE INDEX IF NOT EXISTS idx_purchases_user ON purchases(user_id);
        CREATE INDEX IF NOT EXISTS idx_purchases_template ON purchases(template_id);

        -- Append-only analytics log (purchase, download)
        CREATE TABLE IF NOT EXISTS analytics_events (
            id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL CHECK (event_type IN ('purchase', 'download')),
            event_data TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_analytics_type ON analytics_events(event_type);
        "#,
    )
}
