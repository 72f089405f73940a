//! Streaming transcript aggregation for chat clients driving a code-executing
//! assistant.
//!
//! Invariant: transcript state only changes through [`Transcript::apply`],
//! [`Transcript::push_closed`], and [`Transcript::clear`]; confirmation state
//! only through [`ConfirmationGate::intercept`] and [`ConfirmationGate::resolve`].
//!
//! # Public API Overview
//! - [`Fragment`] is the wire unit a backend streams, with `start`/`end`
//!   boundary flags instead of message ids.
//! - [`Transcript`] folds fragments into discrete [`TranscriptEntry`] values.
//! - [`ConfirmationGate`] intercepts confirmation fragments before they reach
//!   the transcript and holds the [`PendingConfirmation`] until resolved.
//!
//! Everything here is synchronous and free of I/O; backends, transport, and
//! session orchestration live in the workspace member crates.

pub mod confirmation;
pub mod fragment;
pub mod transcript;

pub use crate::confirmation::{ConfirmationGate, PendingConfirmation, UNKNOWN_LANGUAGE};
pub use crate::fragment::{ConsoleFormat, Fragment, FragmentKind, Role};
pub use crate::transcript::{
    EntryId, Transcript, TranscriptEntry, Transition, DEFAULT_CODE_LANGUAGE,
};
