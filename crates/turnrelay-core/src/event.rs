//! Turn events
//!
//! An [`Event`] is the inbound "turn resolved" record. It carries no
//! identity beyond its display name and is never deduplicated.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A resolved game turn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Display name; substituted with a generated title when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional status label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Optional free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Event {
    /// Create an event with just a name
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Set the status label
    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Drop blank fields so that `""` and `"   "` behave like absent values.
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        Self {
            name: keep(self.name),
            status: keep(self.status),
            description: keep(self.description),
        }
    }

    /// Title used for delivery.
    ///
    /// A missing name is never rejected; it is replaced by a title derived
    /// from `now`, the delivery time.
    pub fn title_at(&self, now: DateTime<Utc>) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!(
                "Turn resolved {}",
                now.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        }
    }
}
