//! Session state: the transcript, the confirmation gate, and the busy flag.
//!
//! Every mutation goes through the methods below. [`crate::controller`] owns
//! the only live `Session` and serializes access to it.

use std::fmt;

use chat_transcript::{
    ConfirmationGate, EntryId, Fragment, FragmentKind, PendingConfirmation, Role, Transcript,
    TranscriptEntry, Transition,
};

/// Why a send was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    AwaitingResponse,
    AwaitingConfirmation,
}

impl fmt::Display for SendRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingResponse => f.write_str("a response is still streaming"),
            Self::AwaitingConfirmation => f.write_str("a code execution is awaiting confirmation"),
        }
    }
}

/// Where a routed fragment ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Consumed by the confirmation gate.
    Intercepted,
    Applied(Transition),
}

/// Read-only copy of session state handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub entries: Vec<TranscriptEntry>,
    pub awaiting_response: bool,
    pub awaiting_confirmation: bool,
    pub pending_confirmation: Option<PendingConfirmation>,
}

impl SessionSnapshot {
    /// True when new user input would be rejected.
    pub fn is_busy(&self) -> bool {
        self.awaiting_response || self.awaiting_confirmation
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    transcript: Transcript,
    gate: ConfirmationGate,
    awaiting_response: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.gate.is_awaiting()
    }

    pub fn pending_confirmation(&self) -> Option<&PendingConfirmation> {
        self.gate.pending()
    }

    /// Records the user's message as a closed entry and marks the session
    /// busy. Nothing changes when the session is already busy.
    pub fn begin_send(&mut self, content: &str) -> Result<EntryId, SendRejection> {
        if self.awaiting_response {
            return Err(SendRejection::AwaitingResponse);
        }
        if self.gate.is_awaiting() {
            return Err(SendRejection::AwaitingConfirmation);
        }

        let id = self
            .transcript
            .push_closed(Role::User, FragmentKind::Text, None, content);
        self.awaiting_response = true;
        Ok(id)
    }

    /// Ends the in-flight send. A failure becomes one error entry.
    pub fn finish_send(&mut self, failure: Option<&str>) {
        if let Some(message) = failure {
            self.push_error(message);
        }
        self.awaiting_response = false;
    }

    /// Routes one backend fragment through the gate, then the transcript.
    pub fn on_fragment(&mut self, fragment: &Fragment) -> Routed {
        if self.gate.intercept(fragment) {
            return Routed::Intercepted;
        }
        Routed::Applied(self.transcript.apply(fragment))
    }

    /// Releases the confirmation gate, returning the proposal it held.
    pub fn resolve_confirmation(&mut self) -> Option<PendingConfirmation> {
        self.gate.resolve()
    }

    /// Appends a closed executor-role error entry.
    pub fn push_error(&mut self, message: &str) -> EntryId {
        self.transcript
            .push_closed(Role::Computer, FragmentKind::Error, None, message)
    }

    /// Empties the transcript and drops every flag.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.gate.resolve();
        self.awaiting_response = false;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            entries: self.transcript.entries().to_vec(),
            awaiting_response: self.awaiting_response,
            awaiting_confirmation: self.gate.is_awaiting(),
            pending_confirmation: self.gate.pending().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chat_transcript::{Fragment, FragmentKind, PendingConfirmation, Role};
    use pretty_assertions::assert_eq;

    use super::{Routed, SendRejection, Session};

    fn confirmation(content: &str) -> Fragment {
        Fragment::new(Role::Computer, FragmentKind::Confirmation, content)
    }

    #[test]
    fn begin_send_appends_closed_user_entry_and_marks_busy() {
        let mut session = Session::new();

        session.begin_send("hi").expect("idle session accepts send");

        let snapshot = session.snapshot();
        assert!(snapshot.awaiting_response);
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].role, Role::User);
        assert_eq!(snapshot.entries[0].kind, FragmentKind::Text);
        assert_eq!(snapshot.entries[0].content, "hi");
        assert!(!snapshot.entries[0].open);
    }

    #[test]
    fn begin_send_is_rejected_while_busy() {
        let mut session = Session::new();
        session.begin_send("first").expect("first send");

        assert_eq!(
            session.begin_send("second"),
            Err(SendRejection::AwaitingResponse)
        );
        assert_eq!(session.transcript().len(), 1);

        session.finish_send(None);
        assert_eq!(
            session.on_fragment(&confirmation(r#"{"language":"python","code":"1"}"#)),
            Routed::Intercepted
        );
        assert_eq!(
            session.begin_send("third"),
            Err(SendRejection::AwaitingConfirmation)
        );
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn failed_send_appends_one_error_entry_and_clears_busy_flag() {
        let mut session = Session::new();
        session.begin_send("hi").expect("send");

        session.finish_send(Some("connection refused"));

        let snapshot = session.snapshot();
        assert!(!snapshot.awaiting_response);
        assert_eq!(snapshot.entries.len(), 2);
        assert_eq!(snapshot.entries[1].role, Role::Computer);
        assert_eq!(snapshot.entries[1].kind, FragmentKind::Error);
        assert_eq!(snapshot.entries[1].content, "connection refused");
    }

    #[test]
    fn malformed_confirmation_still_engages_gate() {
        let mut session = Session::new();

        session.on_fragment(&confirmation("not json"));

        assert!(session.is_awaiting_confirmation());
        assert_eq!(
            session.pending_confirmation(),
            Some(&PendingConfirmation::new("unknown", "not json"))
        );
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn clear_resets_everything_regardless_of_prior_state() {
        let mut session = Session::new();
        session.begin_send("hi").expect("send");
        session.on_fragment(
            &Fragment::new(Role::Assistant, FragmentKind::Text, "partial").starting(),
        );
        session.on_fragment(&confirmation("x"));

        session.clear();

        let snapshot = session.snapshot();
        assert!(snapshot.entries.is_empty());
        assert!(!snapshot.awaiting_response);
        assert!(!snapshot.awaiting_confirmation);
        assert_eq!(snapshot.pending_confirmation, None);

        session.clear();
        assert_eq!(session.snapshot(), snapshot);
    }
}
