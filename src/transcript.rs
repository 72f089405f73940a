//! Transcript entries and the fragment aggregator.
//!
//! [`Transcript::apply`] is a reducer keyed on the last entry only. It never
//! scans history, never reorders, and never removes entries; the only
//! shrinking operation is [`Transcript::clear`].
//!
//! Invariant: at most one entry is open at any time. Only an open tail can be
//! extended or closed by fragments; an open entry that a standalone entry was
//! appended behind stays open but unreachable. A `start` fragment abandons
//! whichever entry is still open: the orphan keeps its content, receives no
//! closing content, and loses its open flag.

use std::fmt;

use crate::fragment::{Fragment, FragmentKind, Role};

/// Language assumed for code entries without a `format`.
pub const DEFAULT_CODE_LANGUAGE: &str = "python";

/// Stable identifier of a transcript entry. Never reused within a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

/// One displayable message assembled from one or more fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub id: EntryId,
    pub role: Role,
    pub kind: FragmentKind,
    pub format: Option<String>,
    pub content: String,
    pub open: bool,
}

impl TranscriptEntry {
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// True when the entry should render as the transient "awaiting response"
    /// indicator instead of blank space.
    pub fn shows_pending_placeholder(&self) -> bool {
        self.open && self.content.is_empty() && self.role == Role::Assistant
    }

    /// Presentation language for code entries.
    pub fn display_language(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_CODE_LANGUAGE)
    }

    fn accepts_continuation(&self, fragment: &Fragment) -> bool {
        self.open && self.role == fragment.role && self.kind == fragment.kind
    }
}

/// Which aggregation rule a fragment triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `start` flag: a new open entry was appended.
    Opened(EntryId),
    /// `end` flag on an open tail: the tail was closed, content untouched.
    Closed(EntryId),
    /// Continuation of the open tail with matching role and kind.
    Appended(EntryId),
    /// Anything else: a closed, standalone entry was appended.
    Standalone(EntryId),
}

impl Transition {
    pub fn entry_id(&self) -> EntryId {
        match self {
            Self::Opened(id) | Self::Closed(id) | Self::Appended(id) | Self::Standalone(id) => *id,
        }
    }
}

/// Append-only ordered sequence of transcript entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    open_index: Option<usize>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn get(&self, id: EntryId) -> Option<&TranscriptEntry> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Returns the tail entry when it is still accepting content.
    pub fn open_entry(&self) -> Option<&TranscriptEntry> {
        self.entries.last().filter(|entry| entry.open)
    }

    /// Counts entries flagged open. Always 0 or 1.
    pub fn open_entries(&self) -> usize {
        self.entries.iter().filter(|entry| entry.open).count()
    }

    fn abandon_open_entry(&mut self) {
        if let Some(index) = self.open_index.take() {
            if let Some(orphan) = self.entries.get_mut(index) {
                orphan.open = false;
            }
        }
    }

    /// Folds one fragment into the transcript.
    ///
    /// Rules are evaluated in this order:
    /// 1. `start` always opens a new entry, abandoning any open tail;
    /// 2. `end` with an open tail closes it without appending content;
    /// 3. an open tail with the same role and kind absorbs the content;
    /// 4. otherwise the fragment becomes a closed standalone entry.
    ///
    /// Confirmation fragments are expected to have been intercepted upstream.
    pub fn apply(&mut self, fragment: &Fragment) -> Transition {
        if fragment.start {
            self.abandon_open_entry();
            let id = self.push_entry(
                fragment.role,
                fragment.kind,
                fragment.format.clone(),
                fragment.content.clone(),
                true,
            );
            return Transition::Opened(id);
        }

        if let Some(last) = self.entries.last_mut() {
            if fragment.end && last.open {
                last.open = false;
                self.open_index = None;
                return Transition::Closed(last.id);
            }

            if last.accepts_continuation(fragment) {
                last.content.push_str(&fragment.content);
                return Transition::Appended(last.id);
            }
        }

        let id = self.push_entry(
            fragment.role,
            fragment.kind,
            fragment.format.clone(),
            fragment.content.clone(),
            false,
        );
        Transition::Standalone(id)
    }

    /// Functional form of [`Transcript::apply`].
    #[must_use]
    pub fn applied(mut self, fragment: &Fragment) -> Self {
        self.apply(fragment);
        self
    }

    /// Appends a closed entry directly, bypassing the fragment rules.
    pub fn push_closed(
        &mut self,
        role: Role,
        kind: FragmentKind,
        format: Option<String>,
        content: impl Into<String>,
    ) -> EntryId {
        self.push_entry(role, kind, format, content.into(), false)
    }

    /// Removes every entry. Ids handed out before the clear are not reused.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.open_index = None;
    }

    fn push_entry(
        &mut self,
        role: Role,
        kind: FragmentKind,
        format: Option<String>,
        content: String,
        open: bool,
    ) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        if open {
            self.open_index = Some(self.entries.len());
        }
        self.entries.push(TranscriptEntry {
            id,
            role,
            kind,
            format,
            content,
            open,
        });
        id
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a TranscriptEntry;
    type IntoIter = std::slice::Iter<'a, TranscriptEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{EntryId, Transcript, Transition, DEFAULT_CODE_LANGUAGE};
    use crate::fragment::{Fragment, FragmentKind, Role};

    fn assistant_text(content: &str) -> Fragment {
        Fragment::new(Role::Assistant, FragmentKind::Text, content)
    }

    #[test]
    fn start_then_continuations_then_end_builds_one_closed_entry() {
        let mut transcript = Transcript::new();

        assert_eq!(
            transcript.apply(&assistant_text("Hel").starting()),
            Transition::Opened(EntryId(0))
        );
        assert_eq!(
            transcript.apply(&assistant_text("lo")),
            Transition::Appended(EntryId(0))
        );
        assert_eq!(
            transcript.apply(&assistant_text("ignored").ending()),
            Transition::Closed(EntryId(0))
        );

        assert_eq!(transcript.len(), 1);
        let entry = transcript.last().expect("entry should exist");
        assert_eq!(entry.content, "Hello");
        assert!(!entry.open);
    }

    #[test]
    fn start_wins_over_matching_open_tail() {
        let transcript = Transcript::new()
            .applied(&assistant_text("first").starting())
            .applied(&assistant_text("second").starting());

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.entries()[0].content, "first");
        assert!(!transcript.entries()[0].open, "orphaned entry is abandoned");
        assert_eq!(transcript.entries()[1].content, "second");
        assert!(transcript.entries()[1].open);
        assert_eq!(transcript.open_entries(), 1);
        assert_eq!(
            transcript.open_entry().map(|entry| entry.id),
            Some(EntryId(1))
        );
    }

    #[test]
    fn start_abandons_open_entry_hidden_behind_standalone_entry() {
        let transcript = Transcript::new()
            .applied(&assistant_text("a").starting())
            .applied(&Fragment::new(Role::Computer, FragmentKind::Console, "out"))
            .applied(&assistant_text("b").starting());

        assert_eq!(transcript.len(), 3);
        assert!(!transcript.entries()[0].open);
        assert_eq!(transcript.entries()[0].content, "a");
        assert_eq!(transcript.open_entries(), 1);
        assert_eq!(
            transcript.open_entry().map(|entry| entry.id),
            Some(EntryId(2))
        );
    }

    #[test]
    fn end_closes_open_tail_even_when_role_differs() {
        let mut transcript = Transcript::new().applied(&assistant_text("a").starting());

        let transition =
            transcript.apply(&Fragment::new(Role::Computer, FragmentKind::Console, "x").ending());

        assert_eq!(transition, Transition::Closed(EntryId(0)));
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].content, "a");
    }

    #[test]
    fn end_without_open_tail_becomes_standalone_entry() {
        let mut transcript = Transcript::new();
        let transition = transcript.apply(&assistant_text("tail").ending());

        assert_eq!(transition, Transition::Standalone(EntryId(0)));
        assert_eq!(transcript.entries()[0].content, "tail");
        assert!(!transcript.entries()[0].open);
    }

    #[test]
    fn kind_mismatch_with_open_tail_appends_standalone_behind_it() {
        let mut transcript = Transcript::new().applied(&assistant_text("a").starting());
        let transition =
            transcript.apply(&Fragment::new(Role::Assistant, FragmentKind::Code, "print(1)"));

        assert_eq!(transition, Transition::Standalone(EntryId(1)));
        assert_eq!(transcript.len(), 2);
        assert!(transcript.entries()[0].open);
        assert!(!transcript.entries()[1].open);
        assert_eq!(transcript.open_entry(), None);
        assert_eq!(transcript.open_entries(), 1);
    }

    #[test]
    fn start_fragment_copies_format_and_empty_content() {
        let transcript = Transcript::new().applied(
            &Fragment::new(Role::Assistant, FragmentKind::Code, "")
                .with_format("shell")
                .starting(),
        );

        let entry = transcript.last().expect("entry should exist");
        assert_eq!(entry.format.as_deref(), Some("shell"));
        assert_eq!(entry.content, "");
        assert_eq!(entry.display_language(), "shell");
    }

    #[test]
    fn code_entry_without_format_displays_default_language() {
        let transcript = Transcript::new()
            .applied(&Fragment::new(Role::Assistant, FragmentKind::Code, "x = 1"));
        assert_eq!(
            transcript.entries()[0].display_language(),
            DEFAULT_CODE_LANGUAGE
        );
    }

    #[test]
    fn pending_placeholder_only_for_open_empty_assistant_entries() {
        let mut transcript = Transcript::new().applied(&assistant_text("").starting());
        assert!(transcript.entries()[0].shows_pending_placeholder());

        transcript.apply(&assistant_text("x"));
        assert!(!transcript.entries()[0].shows_pending_placeholder());

        let console = Transcript::new()
            .applied(&Fragment::new(Role::Computer, FragmentKind::Console, "").starting());
        assert!(!console.entries()[0].shows_pending_placeholder());
    }

    #[test]
    fn clear_keeps_ids_monotonic() {
        let mut transcript = Transcript::new()
            .applied(&assistant_text("a"))
            .applied(&assistant_text("b").starting());
        transcript.clear();
        assert!(transcript.is_empty());

        let transition = transcript.apply(&assistant_text("c"));
        assert_eq!(transition.entry_id(), EntryId(2));
        assert_eq!(transcript.get(EntryId(2)).map(|e| e.content.as_str()), Some("c"));
        assert_eq!(transcript.get(EntryId(0)), None);
    }

    #[test]
    fn push_closed_bypasses_fragment_rules() {
        let mut transcript = Transcript::new().applied(&assistant_text("open").starting());
        let id = transcript.push_closed(Role::User, FragmentKind::Text, None, "hi");

        assert_eq!(id, EntryId(1));
        assert_eq!(transcript.len(), 2);
        assert!(!transcript.entries()[1].open);
    }
}
