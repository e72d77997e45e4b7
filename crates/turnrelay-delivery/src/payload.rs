//! Mapping from [`Event`] onto the external page schema
//!
//! The external database has four properties: a title, an optional select
//! status, an optional rich-text description and a delivery date. The
//! mapping is explicit; nothing is assembled dynamically.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use turnrelay_core::Event;

/// Per-text-object character limit of the external API
pub const MAX_TEXT_CHARS: usize = 2000;

/// Request body for creating a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRequest {
    parent: Parent,
    properties: PageProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Parent {
    database_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct PageProperties {
    #[serde(rename = "Name")]
    name: TitleProperty,
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    status: Option<SelectProperty>,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    description: Option<RichTextProperty>,
    #[serde(rename = "Delivered At")]
    delivered_at: DateProperty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct TitleProperty {
    title: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct SelectProperty {
    select: SelectOption,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct SelectOption {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct RichTextProperty {
    rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct RichText {
    text: TextContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct TextContent {
    content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct DateProperty {
    date: DateValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct DateValue {
    start: String,
}

impl PageRequest {
    /// Build the page body for `event`.
    ///
    /// `now` is the delivery time: it stamps "Delivered At" and seeds the
    /// default title of an unnamed event.
    pub fn from_event(event: &Event, database_id: &str, now: DateTime<Utc>) -> Self {
        let title = event.title_at(now);

        Self {
            parent: Parent {
                database_id: database_id.to_string(),
            },
            properties: PageProperties {
                name: TitleProperty {
                    title: rich_text(&title),
                },
                status: non_blank(&event.status).map(|s| SelectProperty {
                    select: SelectOption {
                        name: s.to_string(),
                    },
                }),
                description: non_blank(&event.description).map(|d| RichTextProperty {
                    rich_text: rich_text(d),
                }),
                delivered_at: DateProperty {
                    date: DateValue {
                        start: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                    },
                },
            },
        }
    }

    /// Title text as sent
    pub fn title(&self) -> String {
        self.properties
            .name
            .title
            .iter()
            .map(|t| t.text.content.as_str())
            .collect()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn rich_text(content: &str) -> Vec<RichText> {
    chunk_chars(content, MAX_TEXT_CHARS)
        .into_iter()
        .map(|content| RichText {
            text: TextContent { content },
        })
        .collect()
}

/// Split on char boundaries into pieces of at most `max` chars
fn chunk_chars(content: &str, max: usize) -> Vec<String> {
    if content.is_empty() {
        return vec![String::new()];
    }

    let chars: Vec<char> = content.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}
