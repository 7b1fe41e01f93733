//! The `TriggerAdapter` trait: the capability set the spec describes in the
//! abstract, made concrete enough that a Slack/Teams/GChat implementer has a
//! thin surface to fill in rather than a full reimplementation.

use async_trait::async_trait;
use sandbox_runtime::events::StreamEvent;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One file the user attached to their message, not yet downloaded by the
/// orchestrator — mirrors `stream_broker::types::FileAttachmentRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub size: u64,
    pub media_type: String,
    pub download_url: String,
    pub auth_header: String,
}

/// An opaque handle back to wherever the adapter needs to post a reply —
/// a Slack channel+thread_ts, a Teams conversation id, etc. The shared
/// plumbing never inspects this; only the concrete adapter's `respond` does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRef {
    pub surface: String,
    pub raw_id: String,
}

/// Everything derived from one inbound surface event, ready to become an
/// `/investigate` call.
#[derive(Debug, Clone)]
pub struct Identifiers {
    pub tenant_id: Option<String>,
    pub team_id: Option<String>,
    pub thread_id: String,
    pub prompt_text: String,
    pub user_id: String,
    pub attachments: Vec<Attachment>,
    pub conversation_ref: ConversationRef,
}

/// A surface-specific frontend that turns inbound events into orchestration
/// requests and orchestration events back into surface-specific replies.
///
/// `Event` is whatever shape the concrete surface's webhook payload takes;
/// this crate places no constraint on it beyond what `derive_identifiers`
/// needs to produce.
#[async_trait]
pub trait TriggerAdapter {
    type Event;

    /// Extract routing/session identity and the user's request from one
    /// inbound surface event. Must be deterministic for the same underlying
    /// thread (P1): same `(surface, channel, thread_anchor)` triple always
    /// yields the same `thread_id` — see [`crate::thread_id::derive_thread_id`].
    fn derive_identifiers(&self, event: &Self::Event) -> Result<Identifiers>;

    /// Render one agent event back to the surface. Implementations must
    /// preserve the order events arrive in and deliver each at most once;
    /// the shared SSE consumer in [`crate::stream`] already guarantees order,
    /// so `respond` only needs to avoid introducing its own reordering (e.g.
    /// by spawning unordered concurrent sends).
    async fn respond(&self, conversation_ref: &ConversationRef, event: StreamEvent) -> Result<()>;
}
