mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::email::EmailService;
use crate::token::TokenService;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool and shared services
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL for absolute download/reset links (e.g. https://runyourtrip.com)
    pub base_url: String,
    pub tokens: TokenService,
    pub email: EmailService,
    /// Support contact embedded in generated archive READMEs
    pub support_email: String,
    /// Stripe-issued webhook signing secret. None means webhooks are
    /// acknowledged but never processed.
    pub stripe_webhook_secret: Option<String>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
