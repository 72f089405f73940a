//! Transport-only client for the local code-execution sidecar.
//!
//! This crate owns request building and response parsing for the sidecar's
//! HTTP endpoints, including the server-sent-events stream of `/chat`. It
//! contains no session state and no process management.

pub mod client;
pub mod config;
pub mod error;
pub mod payload;
pub mod settings;
pub mod sse;
pub mod url;

pub use client::{ChatStreamEnd, SidecarClient};
pub use config::{SidecarApiConfig, DEFAULT_SIDECAR_BASE_URL, DEFAULT_SIDECAR_PORT};
pub use error::SidecarApiError;
pub use payload::{Acknowledgement, ChatRequest, ConfirmRequest};
pub use settings::Settings;
pub use sse::{SseFrameParser, SseItem};
pub use crate::url::endpoint_url;
