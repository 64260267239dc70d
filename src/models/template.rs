use serde::{Deserialize, Serialize};

/// A travel website template listed on the marketplace.
///
/// The fulfillment core reads `code` and mutates only the `sales` and
/// `downloads` counters; all other fields are owned by the listing side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub seller_id: String,
    pub name: String,

    /// Marketplace category, e.g. "Tour Booking", "Travel Blog", "Hotel SaaS"
    pub category: String,

    /// Either a single HTML document or a JSON bundle of named files.
    pub code: String,

    pub price_cents: i64,
    pub sales: i64,
    pub downloads: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Template {
    /// Filename-safe slug: lowercased, whitespace runs collapsed to hyphens.
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }

    /// SaaS and booking products ship with a `package.json` in the archive.
    pub fn is_saas_or_booking(&self) -> bool {
        let category = self.category.to_lowercase();
        category.contains("saas") || category.contains("booking")
    }
}

/// Data required to create a template (used by seeding and tests)
#[derive(Debug, Clone)]
pub struct CreateTemplate {
    pub seller_id: String,
    pub name: String,
    pub category: String,
    pub code: String,
    pub price_cents: i64,
}
