//! Incremental plain-text rendering of session snapshots for a line
//! terminal.
//!
//! The printer remembers how much of each entry it already wrote and only
//! emits the difference, so repeated renders of a growing transcript read
//! as one continuous stream.

use std::fmt::Write as _;

use chat_backend_sidecar::Settings;
use chat_transcript::{
    ConsoleFormat, EntryId, FragmentKind, PendingConfirmation, Role, TranscriptEntry,
};

use tokio::sync::Notify;

use crate::controller::RenderHost;
use crate::session::SessionSnapshot;

pub const PLACEHOLDER_TEXT: &str = "Thinking...";
pub const RESET_NOTICE: &str = "--- conversation reset ---";

/// Render host that wakes a renderer task. Requests made while the task is
/// busy coalesce into one wake-up.
#[derive(Debug, Default)]
pub struct RenderSignal {
    notify: Notify,
}

impl RenderSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the next render request.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

impl RenderHost for RenderSignal {
    fn request_render(&self) {
        self.notify.notify_one();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PrintedEntry {
    id: EntryId,
    bytes: usize,
    started: bool,
    finished: bool,
}

#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    printed: Vec<PrintedEntry>,
    placeholder_for: Option<EntryId>,
    shown_confirmation: Option<PendingConfirmation>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the text needed to bring the terminal up to date with
    /// `snapshot`. Empty when nothing changed.
    pub fn render(&mut self, snapshot: &SessionSnapshot) -> String {
        let mut out = String::new();

        let cleared = self
            .printed
            .first()
            .is_some_and(|first| !snapshot.entries.iter().any(|entry| entry.id == first.id));
        if cleared {
            self.finish_last(&mut out);
            out.push_str(RESET_NOTICE);
            out.push('\n');
            self.printed.clear();
            self.placeholder_for = None;
        }

        for entry in &snapshot.entries {
            if should_skip(entry) {
                continue;
            }
            self.render_entry(entry, &mut out);
        }

        self.render_confirmation(snapshot.pending_confirmation.as_ref(), &mut out);
        out
    }

    fn render_entry(&mut self, entry: &TranscriptEntry, out: &mut String) {
        let index = match self.printed.iter().position(|printed| printed.id == entry.id) {
            Some(index) => index,
            None => {
                if entry.shows_pending_placeholder() {
                    if self.placeholder_for != Some(entry.id) {
                        self.finish_last(out);
                        out.push_str(PLACEHOLDER_TEXT);
                        out.push('\n');
                        self.placeholder_for = Some(entry.id);
                    }
                    return;
                }
                self.finish_last(out);
                self.printed.push(PrintedEntry {
                    id: entry.id,
                    bytes: 0,
                    started: false,
                    finished: false,
                });
                self.printed.len() - 1
            }
        };

        let printed = &mut self.printed[index];
        if printed.finished {
            return;
        }
        if !printed.started {
            write_header(entry, out);
            printed.started = true;
        }
        if let Some(delta) = entry.content.get(printed.bytes..) {
            out.push_str(delta);
            printed.bytes = entry.content.len();
        }
        if !entry.open {
            write_footer(entry, out);
            printed.finished = true;
        }
    }

    /// Visually terminates the most recent entry before something else is
    /// written below it. Content it receives later is not shown.
    fn finish_last(&mut self, out: &mut String) {
        if let Some(last) = self.printed.last_mut() {
            if last.started && !last.finished {
                out.push('\n');
                last.finished = true;
            }
        }
    }

    fn render_confirmation(&mut self, pending: Option<&PendingConfirmation>, out: &mut String) {
        let Some(pending) = pending else {
            self.shown_confirmation = None;
            return;
        };
        if self.shown_confirmation.as_ref() == Some(pending) {
            return;
        }

        self.finish_last(out);
        let _ = writeln!(
            out,
            "Run this {} code?\n```{}\n{}\n```\n[y/n]",
            pending.language,
            pending.language,
            pending.code.trim_end()
        );
        self.shown_confirmation = Some(pending.clone());
    }
}

/// One `key: value` line per setting. The API key is never echoed.
pub fn format_settings(settings: &Settings) -> String {
    let api_key = if settings.api_key.is_empty() {
        "(not set)"
    } else {
        "(set)"
    };
    let api_base = if settings.api_base.is_empty() {
        "(default)"
    } else {
        settings.api_base.as_str()
    };

    let mut out = String::new();
    let _ = writeln!(out, "model: {}", settings.model);
    let _ = writeln!(out, "api_key: {api_key}");
    let _ = writeln!(out, "api_base: {api_base}");
    let _ = writeln!(out, "auto_run: {}", settings.auto_run);
    let _ = writeln!(out, "context_window: {}", settings.context_window);
    let _ = writeln!(out, "max_tokens: {}", settings.max_tokens);
    let _ = writeln!(out, "temperature: {}", settings.temperature);
    if !settings.custom_instructions.is_empty() {
        let _ = writeln!(
            out,
            "custom_instructions: {}",
            settings.custom_instructions.trim_end()
        );
    }
    out
}

fn should_skip(entry: &TranscriptEntry) -> bool {
    entry.kind == FragmentKind::Console
        && entry.format.as_deref().and_then(ConsoleFormat::parse) == Some(ConsoleFormat::ActiveLine)
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::Computer => "computer",
    }
}

fn write_header(entry: &TranscriptEntry, out: &mut String) {
    match entry.kind {
        FragmentKind::Code => {
            let _ = writeln!(out, "```{}", entry.display_language());
        }
        FragmentKind::Console => out.push_str("```console\n"),
        FragmentKind::Error => out.push_str("error: "),
        FragmentKind::Text | FragmentKind::Confirmation => {
            let _ = write!(out, "{}: ", role_label(entry.role));
        }
    }
}

fn write_footer(entry: &TranscriptEntry, out: &mut String) {
    if !entry.content.ends_with('\n') {
        out.push('\n');
    }
    if matches!(entry.kind, FragmentKind::Code | FragmentKind::Console) {
        out.push_str("```\n");
    }
}
