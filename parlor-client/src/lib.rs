//! Parlor chat client core.
//!
//! The [`ChatSession`] shell drives a [`ChatRepository`] (in production the
//! reqwest-backed [`HttpGateway`]) and merges every response into the
//! process-wide [`ChatCache`]. Rendering surfaces read snapshots and
//! view-models from the cache and subscribe to its [`ChatEvent`]s.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions)] // TODO(deps-001): remove once transitive dependencies converge.

pub mod auth;
pub mod cache;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod membership;
pub mod notice;
pub mod provisional;
pub mod reconcile;
pub mod repository;
pub mod session;
pub mod timeline;
pub mod view;

pub use auth::{FileSessionStore, MemorySessionStore, SessionStore};
pub use cache::{ChatCache, ChatEvent, ConversationFilter};
pub use error::{ChatError, ChatResult};
pub use gateway::HttpGateway;
pub use notice::{Notice, NoticeLevel};
pub use repository::{ChatRepository, ExportKind};
pub use session::{ChatSession, ExportFile, ImageUpload, OutgoingMessage, RefreshOutcome};
pub use timeline::{MessageView, TimelineEntry, TimelineOptions};
pub use view::ConversationView;
