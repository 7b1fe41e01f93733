//! Shared plumbing for trigger adapters: surface-specific frontends (chat,
//! webhook, API) that turn inbound events into `/investigate` calls against
//! a `StreamBroker`.
//!
//! No concrete chat-surface adapter (Slack/Teams/GChat webhook parsing) is
//! implemented here — those stay external. This crate owns the parts every
//! concrete adapter would otherwise reimplement: the `TriggerAdapter` trait
//! and its shared types, deterministic thread-id slugging, the
//! `ConfigClient` HTTP implementation, and a generic SSE-consuming helper
//! that turns a `StreamBroker` response into typed `StreamEvent`s.

pub mod adapter;
pub mod config_client;
pub mod error;
pub mod stream;
pub mod thread_id;

pub use adapter::{Attachment, ConversationRef, Identifiers, TriggerAdapter};
pub use config_client::{ConfigClient, EffectiveConfig, RoutingResult};
pub use error::{AdapterError, Result};
