use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripvault::config::Config;
use tripvault::crypto;
use tripvault::db::{create_pool, init_db, queries, AppState};
use tripvault::email::EmailService;
use tripvault::handlers;
use tripvault::models::{CreatePurchase, CreateTemplate, CreateUser};
use tripvault::rate_limit;
use tripvault::token::TokenService;

#[derive(Parser, Debug)]
#[command(name = "tripvault")]
#[command(about = "Purchase fulfillment and secure downloads for Run Your Trip")]
struct Cli {
    /// Seed the database with dev data (seller, buyer, template, purchase)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for testing.
/// Creates a seller, a buyer, a template, and one completed purchase.
/// Only runs in dev mode and when the database is empty.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_purchases(&conn).expect("Failed to count purchases");
    if count > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let password_hash =
        crypto::hash_password("password123").expect("Failed to hash dev password");

    let seller = queries::create_user(
        &conn,
        &CreateUser {
            email: "seller@tripvault.local".to_string(),
            name: "Dev Seller".to_string(),
            password_hash: password_hash.clone(),
        },
    )
    .expect("Failed to create dev seller");

    let buyer = queries::create_user(
        &conn,
        &CreateUser {
            email: "buyer@tripvault.local".to_string(),
            name: "Dev Buyer".to_string(),
            password_hash,
        },
    )
    .expect("Failed to create dev buyer");

    let template = queries::create_template(
        &conn,
        &CreateTemplate {
            seller_id: seller.id.clone(),
            name: "Wanderlust Tours".to_string(),
            category: "Tour Booking".to_string(),
            code: serde_json::json!({
                "html": "<!doctype html><html><body><h1>Wanderlust Tours</h1></body></html>",
                "css": "body { font-family: sans-serif; }",
                "js": "console.log('wanderlust');",
            })
            .to_string(),
            price_cents: 4900,
        },
    )
    .expect("Failed to create dev template");

    let purchase = queries::create_purchase(
        &conn,
        &CreatePurchase {
            user_id: buyer.id.clone(),
            template_id: template.id.clone(),
            seller_id: seller.id.clone(),
            price_cents: 4900,
            transaction_id: "cs_dev_seed".to_string(),
            payment_method: "stripe".to_string(),
            metadata: None,
        },
    )
    .expect("Failed to create dev purchase")
    .expect("Dev purchase already exists");

    let token = state.tokens.issue_download_token(&purchase.id);

    tracing::info!("Seller: {} ({})", seller.email, seller.id);
    tracing::info!("Buyer: {} ({}) password: password123", buyer.email, buyer.id);
    tracing::info!("Template: {} ({})", template.name, template.id);
    tracing::info!("Purchase: {}", purchase.id);
    tracing::info!(
        "Download: {}/api/download/{}?token={}",
        state.base_url,
        purchase.id,
        token
    );
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripvault=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    if config.stripe_webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set: webhooks will be acknowledged but not processed");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        tokens: TokenService::new(&config.token_secret),
        email: EmailService::new(config.sendgrid_api_key.clone(), config.email_from.clone()),
        support_email: config.support_email.clone(),
        stripe_webhook_secret: config.stripe_webhook_secret.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set TRIPVAULT_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Webhooks stay unthrottled - Stripe is the only caller and retries
    // on failure; throttling it just delays fulfillment.
    let app = Router::new()
        .merge(
            handlers::health_router()
                .layer(rate_limit::relaxed_layer(config.rate_limit.relaxed_rpm)),
        )
        .merge(handlers::webhooks::router())
        .merge(
            handlers::download::router(state.clone())
                .layer(rate_limit::standard_layer(config.rate_limit.standard_rpm)),
        )
        .merge(
            handlers::auth::router()
                .layer(rate_limit::strict_layer(config.rate_limit.strict_rpm)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("tripvault server listening on {}", addr);

    // connect-info enables IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
