//! Deterministic scripted implementation of the `chat_backend` contract.
//!
//! This crate contains no transport logic and is intended for local
//! development and contract-level integration testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chat_backend::{
    BackendError, BackendFuture, BackendProfile, ChatBackend, FragmentBus, FragmentStream,
};
use chat_transcript::{Fragment, FragmentKind, Role};
use tokio::sync::{mpsc, Notify};
use tracing::debug;

/// Stable backend identifier used for explicit startup selection.
pub const MOCK_BACKEND_ID: &str = "mock";

/// Console output emitted when a proposed execution is denied.
pub const SKIPPED_EXECUTION_MESSAGE: &str = "Code execution skipped by user.";

/// One scripted action of a mock turn.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Emit(Fragment),
    /// Proposes code and waits for the next decision. A denial emits
    /// [`SKIPPED_EXECUTION_MESSAGE`] and ends the turn.
    Confirm { language: String, code: String },
    /// Parks the turn until the handle is notified.
    Hold(Arc<Notify>),
    /// Ends the turn with a failure.
    Fail(String),
}

impl ScriptStep {
    #[must_use]
    pub fn emit(fragment: Fragment) -> Self {
        Self::Emit(fragment)
    }

    #[must_use]
    pub fn confirm(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Confirm {
            language: language.into(),
            code: code.into(),
        }
    }

    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    /// Frames `text` as one entry streamed token by token: an empty opening
    /// fragment, one fragment per whitespace-terminated token, and an empty
    /// closing fragment.
    #[must_use]
    pub fn streamed(role: Role, kind: FragmentKind, format: Option<&str>, text: &str) -> Vec<Self> {
        let frame = |content: String| {
            let fragment = Fragment::new(role, kind, content);
            match format {
                Some(format) => fragment.with_format(format),
                None => fragment,
            }
        };

        let mut steps = vec![Self::Emit(frame(String::new()).starting())];
        let mut pending_token = String::new();
        for ch in text.chars() {
            pending_token.push(ch);
            if matches!(ch, ' ' | '\n') {
                steps.push(Self::Emit(frame(std::mem::take(&mut pending_token))));
            }
        }
        if !pending_token.is_empty() {
            steps.push(Self::Emit(frame(pending_token)));
        }
        steps.push(Self::Emit(frame(String::new()).ending()));
        steps
    }
}

/// Contract call observed by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Completion(String),
    Confirmation(bool),
    Reset,
}

/// Scripted backend. Each completion request consumes the next queued turn,
/// falling back to [`MockBackend::demo_turn`] once the queue is empty.
#[derive(Debug)]
pub struct MockBackend {
    bus: FragmentBus,
    turns: Mutex<VecDeque<Vec<ScriptStep>>>,
    calls: Mutex<Vec<MockCall>>,
    decision_sender: mpsc::UnboundedSender<bool>,
    decisions: tokio::sync::Mutex<mpsc::UnboundedReceiver<bool>>,
    confirmation_failure: Mutex<Option<String>>,
    reset_failure: Mutex<Option<String>>,
    token_delay: Option<Duration>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_turns(Vec::new())
    }

    #[must_use]
    pub fn with_turns(turns: Vec<Vec<ScriptStep>>) -> Self {
        let (decision_sender, decisions) = mpsc::unbounded_channel();
        Self {
            bus: FragmentBus::new(),
            turns: Mutex::new(turns.into()),
            calls: Mutex::new(Vec::new()),
            decision_sender,
            decisions: tokio::sync::Mutex::new(decisions),
            confirmation_failure: Mutex::new(None),
            reset_failure: Mutex::new(None),
            token_delay: None,
        }
    }

    /// Pauses after every emitted fragment, for a visibly streaming demo.
    #[must_use]
    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    pub fn push_turn(&self, steps: Vec<ScriptStep>) {
        lock_unpoisoned(&self.turns).push_back(steps);
    }

    /// Makes every later confirmation notification fail with `message`.
    pub fn fail_confirmations(&self, message: impl Into<String>) {
        *lock_unpoisoned(&self.confirmation_failure) = Some(message.into());
    }

    /// Makes every later reset fail with `message`.
    pub fn fail_resets(&self, message: impl Into<String>) {
        *lock_unpoisoned(&self.reset_failure) = Some(message.into());
    }

    pub fn calls(&self) -> Vec<MockCall> {
        lock_unpoisoned(&self.calls).clone()
    }

    /// Publishes a fragment outside of any turn.
    pub fn publish(&self, fragment: Fragment) -> usize {
        self.bus.publish(fragment)
    }

    /// Turn used when no scripted turn is queued: a streamed reply, a python
    /// proposal that needs confirmation, and its console output.
    #[must_use]
    pub fn demo_turn(message: &str) -> Vec<ScriptStep> {
        let code = "print(\"hello from the mock backend\")";
        let mut steps = ScriptStep::streamed(
            Role::Assistant,
            FragmentKind::Text,
            None,
            &format!("You said: {message}\nLet me run a quick check.\n"),
        );
        steps.extend(ScriptStep::streamed(
            Role::Assistant,
            FragmentKind::Code,
            Some("python"),
            code,
        ));
        steps.push(ScriptStep::confirm("python", code));
        steps.push(ScriptStep::emit(
            Fragment::new(Role::Computer, FragmentKind::Console, "1").with_format("active_line"),
        ));
        steps.push(ScriptStep::emit(
            Fragment::new(
                Role::Computer,
                FragmentKind::Console,
                "hello from the mock backend\n",
            )
            .with_format("output")
            .starting(),
        ));
        steps.push(ScriptStep::emit(
            Fragment::new(Role::Computer, FragmentKind::Console, "")
                .with_format("output")
                .ending(),
        ));
        steps.extend(ScriptStep::streamed(
            Role::Assistant,
            FragmentKind::Text,
            None,
            "Done.",
        ));
        steps
    }

    fn record(&self, call: MockCall) {
        debug!(?call, "mock backend call");
        lock_unpoisoned(&self.calls).push(call);
    }

    fn next_turn(&self, message: &str) -> Vec<ScriptStep> {
        lock_unpoisoned(&self.turns)
            .pop_front()
            .unwrap_or_else(|| Self::demo_turn(message))
    }

    async fn emit(&self, fragment: Fragment) {
        self.bus.publish(fragment);
        if let Some(delay) = self.token_delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn run_turn(&self, message: String) -> Result<(), BackendError> {
        for step in self.next_turn(&message) {
            match step {
                ScriptStep::Emit(fragment) => self.emit(fragment).await,
                ScriptStep::Confirm { language, code } => {
                    let mut decisions = self.decisions.lock().await;
                    while decisions.try_recv().is_ok() {}

                    let payload = serde_json::json!({ "language": language, "code": code });
                    self.emit(Fragment::new(
                        Role::Computer,
                        FragmentKind::Confirmation,
                        payload.to_string(),
                    ))
                    .await;

                    let approved = decisions.recv().await.unwrap_or(false);
                    if !approved {
                        self.emit(
                            Fragment::new(
                                Role::Computer,
                                FragmentKind::Console,
                                SKIPPED_EXECUTION_MESSAGE,
                            )
                            .with_format("output"),
                        )
                        .await;
                        return Ok(());
                    }
                }
                ScriptStep::Hold(release) => release.notified().await,
                ScriptStep::Fail(message) => return Err(BackendError::new(message)),
            }
        }

        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatBackend for MockBackend {
    fn profile(&self) -> BackendProfile {
        BackendProfile {
            backend_id: MOCK_BACKEND_ID.to_string(),
            endpoint: None,
        }
    }

    fn subscribe_fragments(&self) -> FragmentStream {
        self.bus.subscribe()
    }

    fn request_completion(&self, message: String) -> BackendFuture<'_> {
        self.record(MockCall::Completion(message.clone()));
        Box::pin(self.run_turn(message))
    }

    fn notify_confirmation(&self, approved: bool) -> BackendFuture<'_> {
        self.record(MockCall::Confirmation(approved));
        let failure = lock_unpoisoned(&self.confirmation_failure).clone();
        if failure.is_none() {
            let _ = self.decision_sender.send(approved);
        }

        Box::pin(async move {
            match failure {
                Some(message) => Err(BackendError::new(message)),
                None => Ok(()),
            }
        })
    }

    fn reset_conversation(&self) -> BackendFuture<'_> {
        self.record(MockCall::Reset);
        let failure = lock_unpoisoned(&self.reset_failure).clone();

        Box::pin(async move {
            match failure {
                Some(message) => Err(BackendError::new(message)),
                None => Ok(()),
            }
        })
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
