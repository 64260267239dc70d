use serde::{Deserialize, Serialize};

/// A marketplace account: buyer of templates, subject of password resets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,

    /// scrypt hash in `hex(salt):hex(key)` format. Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// SHA-256 hash of the active bearer token. None until first login;
    /// cleared on password reset.
    #[serde(skip_serializing)]
    pub api_token_hash: Option<String>,

    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub subscription_status: SubscriptionStatus,

    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    None,
    Active,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Active => "active",
            Self::Canceled => "canceled",
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            _ => Err(()),
        }
    }
}
