//! Confirmation gate for proposed code executions.
//!
//! Confirmation fragments never reach the transcript. The gate decodes their
//! payload, engages, and stays engaged until an explicit resolution.

use serde::{Deserialize, Serialize};

use crate::fragment::Fragment;

/// Language reported when a confirmation payload cannot be decoded.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Code proposed for execution, awaiting the user's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub language: String,
    pub code: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfirmationPayload {
    Proposal {
        language: String,
        code: String,
    },
    CodeMessage {
        #[serde(default)]
        format: Option<String>,
        content: String,
    },
}

impl PendingConfirmation {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
        }
    }

    /// Decodes a confirmation payload. Never fails: undecodable content is
    /// kept verbatim as the code with an unknown language.
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<ConfirmationPayload>(raw) {
            Ok(ConfirmationPayload::Proposal { language, code }) => Self { language, code },
            Ok(ConfirmationPayload::CodeMessage { format, content }) => Self {
                language: format
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string()),
                code: content,
            },
            Err(_) => Self::new(UNKNOWN_LANGUAGE, raw),
        }
    }
}

/// Gating state. Engaged exactly while a confirmation is pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmationGate {
    pending: Option<PendingConfirmation>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_awaiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    /// Consumes confirmation fragments. Returns `true` when the fragment was
    /// handled here and must not be forwarded to the transcript.
    ///
    /// A new request while one is pending replaces it.
    #[must_use]
    pub fn intercept(&mut self, fragment: &Fragment) -> bool {
        if !fragment.is_confirmation() {
            return false;
        }

        self.pending = Some(PendingConfirmation::decode(&fragment.content));
        true
    }

    /// Releases the gate and returns what was pending, if anything.
    pub fn resolve(&mut self) -> Option<PendingConfirmation> {
        self.pending.take()
    }
}
