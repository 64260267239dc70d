use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Base public URL used to construct absolute download links
    pub base_url: String,
    /// Shared HMAC signing secret for download and password-reset tokens.
    /// Must be stable across restarts or outstanding links stop verifying.
    pub token_secret: String,
    /// Stripe-issued webhook signing secret (whsec_xxx)
    pub stripe_webhook_secret: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub email_from: String,
    pub support_email: String,
    pub rate_limit: RateLimitConfig,
    pub dev_mode: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TRIPVAULT_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "tripvault.db".to_string()),
            base_url,
            token_secret: resolve_token_secret(dev_mode),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").ok(),
            sendgrid_api_key: env::var("SENDGRID_API_KEY").ok(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "noreply@runyourtrip.com".to_string()),
            support_email: env::var("SUPPORT_EMAIL")
                .unwrap_or_else(|_| "support@runyourtrip.com".to_string()),
            rate_limit: RateLimitConfig {
                strict_rpm: env_u32("RATE_LIMIT_STRICT_RPM", 10),
                standard_rpm: env_u32("RATE_LIMIT_STANDARD_RPM", 30),
                relaxed_rpm: env_u32("RATE_LIMIT_RELAXED_RPM", 60),
            },
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Resolve the token signing secret through a fallback chain of environment
/// variables. Any single value works as long as it is stable across restarts,
/// since outstanding tokens must remain verifiable after a redeploy.
///
/// A missing secret is a fatal startup condition outside dev mode.
fn resolve_token_secret(dev_mode: bool) -> String {
    for key in ["TOKEN_SECRET", "SESSION_SECRET", "JWT_SECRET"] {
        if let Ok(value) = env::var(key) {
            let value = value.trim().to_string();
            if !value.is_empty() {
                return value;
            }
        }
    }

    if dev_mode {
        tracing::warn!(
            "No token secret configured, using dev default. Set TOKEN_SECRET in production."
        );
        return "tripvault-dev-secret".to_string();
    }

    panic!("TOKEN_SECRET (or SESSION_SECRET / JWT_SECRET) must be set");
}
