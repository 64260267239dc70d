//! Prefixed ID generation for tripvault entities.
//!
//! All IDs use a `ryt_` brand prefix to guarantee collision avoidance with
//! payment provider IDs (Stripe's `cs_`, `pi_`, `sub_`, etc.).
//!
//! Format: `ryt_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// Entity types that have prefixed IDs in tripvault.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    User,
    Template,
    Purchase,
    AnalyticsEvent,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "ryt_usr",
            Self::Template => "ryt_tpl",
            Self::Purchase => "ryt_pur",
            Self::AnalyticsEvent => "ryt_evt",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }

    /// Cheap format check to reject garbage ids before hitting the database.
    /// Validates `{prefix}_{32_hex_chars}`.
    pub fn is_valid_id(&self, s: &str) -> bool {
        let Some(hex_part) = s
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix('_'))
        else {
            return false;
        };
        hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
    }
}
