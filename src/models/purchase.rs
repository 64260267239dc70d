use serde::{Deserialize, Serialize};

/// One completed transaction of a buyer for one template.
///
/// Created exclusively by the purchase recorder from a verified checkout
/// webhook. At most one purchase exists per (user, template) pair; re-buying
/// is not modeled, download-link regeneration reuses the same purchase id.
/// Rows are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub template_id: String,
    pub seller_id: String,

    /// Price in minor units (cents). Rendered as "49.00" at the API boundary.
    pub price_cents: i64,

    /// External gateway id (Stripe checkout session). Unique across all
    /// purchases - the idempotency anchor for webhook redelivery.
    pub transaction_id: String,

    pub payment_method: String,
    pub status: PurchaseStatus,

    /// Free-form gateway context (session id, payment status, buyer email).
    pub metadata: Option<String>,

    pub created_at: i64,
}

impl Purchase {
    /// Currency-scale display string, e.g. 4900 -> "49.00".
    pub fn price_display(&self) -> String {
        format!("{}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }
}

/// Data required to record a new purchase
#[derive(Debug, Clone)]
pub struct CreatePurchase {
    pub user_id: String,
    pub template_id: String,
    pub seller_id: String,
    pub price_cents: i64,
    pub transaction_id: String,
    pub payment_method: String,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Refunded,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for PurchaseStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "refunded" => Ok(Self::Refunded),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_display() {
        let purchase = Purchase {
            id: "ryt_pur_x".into(),
            user_id: "ryt_usr_x".into(),
            template_id: "ryt_tpl_x".into(),
            seller_id: "ryt_usr_y".into(),
            price_cents: 4900,
            transaction_id: "cs_test_1".into(),
            payment_method: "stripe".into(),
            status: PurchaseStatus::Completed,
            metadata: None,
            created_at: 0,
        };
        assert_eq!(purchase.price_display(), "49.00");
    }

    #[test]
    fn test_price_display_pads_cents() {
        let purchase = Purchase {
            id: "ryt_pur_x".into(),
            user_id: "ryt_usr_x".into(),
            template_id: "ryt_tpl_x".into(),
            seller_id: "ryt_usr_y".into(),
            price_cents: 10205,
            transaction_id: "cs_test_2".into(),
            payment_method: "stripe".into(),
            status: PurchaseStatus::Completed,
            metadata: None,
            created_at: 0,
        };
        assert_eq!(purchase.price_display(), "102.05");
    }
}
