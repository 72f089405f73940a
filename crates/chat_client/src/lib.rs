//! Chat session runtime and line-terminal front end.
//!
//! ## Backend bootstrap
//!
//! The backend is chosen once at startup from the environment:
//!
//! - `CHAT_CLIENT_BACKEND=sidecar` (default) talks to the code-execution
//!   sidecar at `CHAT_CLIENT_SIDECAR_URL` (default `http://127.0.0.1:39821`).
//! - `CHAT_CLIENT_BACKEND=mock` runs a scripted local backend.
//!
//! With `CHAT_CLIENT_SPAWN_SIDECAR=1` the client launches the sidecar itself,
//! waits for `GET /health`, and stops it on exit. `CHAT_CLIENT_SIDECAR_ROOT`
//! adds a search root for the development script `sidecar/main.py`.
//!
//! `CHAT_CLIENT_REQUEST_TIMEOUT_SEC` bounds each sidecar request in seconds
//! and must be positive when set; without it requests wait indefinitely.
//! `CHAT_CLIENT_LOG` takes a `tracing` filter directive (default `warn`);
//! logs go to stderr.
//!
//! Session contract: [`controller::SessionController`] is the only writer of
//! session state. `send`, `resolve_confirmation`, and `reset` never fail;
//! backend failures surface as error entries in the transcript.

pub mod backends;
pub mod commands;
pub mod config;
pub mod controller;
pub mod logging;
pub mod render;
pub mod session;
