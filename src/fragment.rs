//! Wire-level fragment model.
//!
//! A [`Fragment`] is one unit of a streamed backend turn. Entry boundaries are
//! carried by the `start`/`end` flags rather than by correlation ids, so the
//! aggregator infers them from flag transitions.

use serde::{Deserialize, Deserializer, Serialize};

/// Who produced a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// The system executor that runs proposed code and reports its output.
    Computer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Computer => "computer",
        }
    }
}

/// What a fragment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    #[serde(rename = "message")]
    Text,
    Code,
    Console,
    /// Side-channel request to approve a proposed code execution.
    Confirmation,
    Error,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "message",
            Self::Code => "code",
            Self::Console => "console",
            Self::Confirmation => "confirmation",
            Self::Error => "error",
        }
    }
}

/// Known `format` values for console fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleFormat {
    Output,
    ActiveLine,
    Error,
}

impl ConsoleFormat {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "output" => Self::Output,
            "active_line" => Self::ActiveLine,
            "error" => Self::Error,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::ActiveLine => "active_line",
            Self::Error => "error",
        }
    }
}

/// One streamed unit of a backend response. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub role: Role,
    #[serde(rename = "type")]
    pub kind: FragmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    /// Opens a new transcript entry.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_false"
    )]
    pub start: bool,
    /// Closes the currently open transcript entry.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_false"
    )]
    pub end: bool,
}

impl Fragment {
    /// Creates a continuation fragment (neither boundary flag set).
    #[must_use]
    pub fn new(role: Role, kind: FragmentKind, content: impl Into<String>) -> Self {
        Self {
            role,
            kind,
            format: None,
            content: content.into(),
            start: false,
            end: false,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Marks this fragment as opening a new entry.
    #[must_use]
    pub fn starting(mut self) -> Self {
        self.start = true;
        self
    }

    /// Marks this fragment as closing the open entry.
    #[must_use]
    pub fn ending(mut self) -> Self {
        self.end = true;
        self
    }

    pub fn is_confirmation(&self) -> bool {
        self.kind == FragmentKind::Confirmation
    }

    pub fn console_format(&self) -> Option<ConsoleFormat> {
        if self.kind != FragmentKind::Console {
            return None;
        }

        self.format.as_deref().and_then(ConsoleFormat::parse)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
