use serde::{Deserialize, Serialize};

/// Append-only event log entry recorded as a side effect of purchases and
/// downloads. Insert failures are logged, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub id: String,
    pub event_type: AnalyticsEventType,
    /// Free-form JSON payload (amount, currency, session id, ...)
    pub event_data: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventType {
    Purchase,
    Download,
}

impl AnalyticsEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Download => "download",
        }
    }
}

impl std::str::FromStr for AnalyticsEventType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(Self::Purchase),
            "download" => Ok(Self::Download),
            _ => Err(()),
        }
    }
}
