// ── Infrastructure ───────────────────────────────────────────────────────────
pub mod http;
pub mod partial;
pub mod sse;
pub mod types;

// ── Streaming client ────────────────────────────────────────────────────────
pub mod client;

// ── Re-exports ──────────────────────────────────────────────────────────────
pub use client::{
    CompletionBackend, CompletionClient, CompletionStream, StreamEvent,
};
pub use http::build_http_client;
pub use partial::{extract_string_field, salvage_string_field};
pub use sse::{SseBuffer, is_done_sentinel, parse_data_lines};
pub use types::{ChatMessage, ChatRole};
