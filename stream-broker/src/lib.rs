//! Public HTTP surface for the investigation orchestration plane:
//! `/investigate`, `/interrupt`, `/answer`, `/health`, `/metrics`, and
//! `/proxy/files/{token}`. All domain state lives in `sandbox-runtime`; this
//! crate is the axum routing, DTOs and SSE framing layered on top of it.

pub mod app;
pub mod handlers;
pub mod sse;
pub mod types;
pub mod util;

pub use app::build_router;
