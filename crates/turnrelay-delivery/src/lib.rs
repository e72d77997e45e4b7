//! # Turnrelay Delivery
//!
//! One delivery attempt of a turn [`Event`](turnrelay_core::Event) to the
//! external note-taking database, classified into a [`DeliveryOutcome`].
//!
//! | Provider | Use |
//! |----------|-----|
//! | [`NotionProvider`] | HTTP delivery (`NOTION_TOKEN`, `NOTION_DATABASE_ID`) |
//! | [`MockProvider`] | Scripted outcomes for tests |
//!
//! Attempts never retry internally; retry policy belongs to the queue.
//!
//! ```rust
//! use turnrelay_core::Event;
//! use turnrelay_delivery::{DeliveryOutcome, DeliveryProvider, MockProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = MockProvider::delivering();
//!     let outcome = provider.deliver(&Event::named("Turn 1")).await;
//!     assert!(matches!(outcome, DeliveryOutcome::Delivered { .. }));
//! }
//! ```

pub mod config;
pub mod mock;
pub mod notion;
pub mod payload;
pub mod provider;

pub use config::{ConfigError, Credentials, NotesConfig};
pub use mock::MockProvider;
pub use notion::NotionProvider;
pub use payload::PageRequest;
pub use provider::{DeliveryFailure, DeliveryOutcome, DeliveryProvider};
