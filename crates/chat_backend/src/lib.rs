//! Backend contract for driving one conversational turn.
//!
//! This crate defines only the four operations a session needs from a
//! backend plus the fan-out primitive backends use to push fragments. It
//! excludes transport details, wire payloads, and session orchestration.

use chat_transcript::Fragment;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

/// Completion of an asynchronous backend operation.
pub type BackendFuture<'a> = BoxFuture<'a, Result<(), BackendError>>;

/// Push subscription yielding fragments in backend emission order.
pub type FragmentStream = BoxStream<'static, Fragment>;

/// Failure reported by a backend operation.
///
/// The message is shown to the user verbatim, so it must already read as a
/// description of what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Immutable metadata describing a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendProfile {
    pub backend_id: String,
    /// Where the backend lives, when it has a meaningful address.
    pub endpoint: Option<String>,
}

/// Conversational backend with streamed output.
///
/// Fragments for a turn are delivered through [`ChatBackend::subscribe_fragments`]
/// while [`ChatBackend::request_completion`] is pending. A subscription taken
/// before the request observes every fragment of that turn.
pub trait ChatBackend: Send + Sync + 'static {
    /// Returns backend identity metadata.
    fn profile(&self) -> BackendProfile;

    /// Opens a fragment subscription. Dropping the stream unsubscribes.
    fn subscribe_fragments(&self) -> FragmentStream;

    /// Asks for a completion of `message`. Resolves once the backend has
    /// finished emitting fragments for this turn.
    fn request_completion(&self, message: String) -> BackendFuture<'_>;

    /// Reports the user's decision on the pending execution proposal.
    fn notify_confirmation(&self, approved: bool) -> BackendFuture<'_>;

    /// Discards backend-side conversation state.
    fn reset_conversation(&self) -> BackendFuture<'_>;
}

/// Broadcast fan-out of fragments to every live subscription.
#[derive(Debug, Clone)]
pub struct FragmentBus {
    sender: broadcast::Sender<Fragment>,
}

impl FragmentBus {
    /// Buffered fragments per subscriber before the slowest one lags.
    pub const DEFAULT_CAPACITY: usize = 4096;

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Delivers `fragment` to current subscribers and returns how many
    /// received it. Subscriptions opened later never see it.
    pub fn publish(&self, fragment: Fragment) -> usize {
        match self.sender.send(fragment) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("fragment published without subscribers");
                0
            }
        }
    }

    pub fn subscribe(&self) -> FragmentStream {
        let receiver = self.sender.subscribe();
        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(fragment) => return Some((fragment, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "fragment subscriber lagged; fragments dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FragmentBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chat_transcript::{Fragment, FragmentKind, Role};
    use futures_util::StreamExt;

    use super::{
        BackendError, BackendFuture, BackendProfile, ChatBackend, FragmentBus, FragmentStream,
    };

    struct EchoBackend {
        bus: FragmentBus,
    }

    impl ChatBackend for EchoBackend {
        fn profile(&self) -> BackendProfile {
            BackendProfile {
                backend_id: "echo".to_string(),
                endpoint: None,
            }
        }

        fn subscribe_fragments(&self) -> FragmentStream {
            self.bus.subscribe()
        }

        fn request_completion(&self, message: String) -> BackendFuture<'_> {
            Box::pin(async move {
                self.bus.publish(
                    Fragment::new(Role::Assistant, FragmentKind::Text, message).starting(),
                );
                self.bus
                    .publish(Fragment::new(Role::Assistant, FragmentKind::Text, "").ending());
                Ok(())
            })
        }

        fn notify_confirmation(&self, _approved: bool) -> BackendFuture<'_> {
            Box::pin(async { Err(BackendError::new("nothing to confirm")) })
        }

        fn reset_conversation(&self) -> BackendFuture<'_> {
            Box::pin(async { Ok(()) })
        }
    }

    fn text(content: &str) -> Fragment {
        Fragment::new(Role::Assistant, FragmentKind::Text, content)
    }

    #[test]
    fn backend_error_preserves_message() {
        let error = BackendError::new("sidecar unreachable");
        assert_eq!(error.message(), "sidecar unreachable");
        assert_eq!(error.to_string(), "sidecar unreachable");
        assert_eq!(BackendError::from("x"), BackendError::from("x".to_string()));
    }

    #[test]
    fn publish_without_subscribers_reports_zero_receivers() {
        let bus = FragmentBus::new();
        assert_eq!(bus.publish(text("lost")), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_fragments_in_order() {
        let bus = FragmentBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish(text("a")), 2);
        assert_eq!(bus.publish(text("b")), 2);

        for stream in [&mut first, &mut second] {
            assert_eq!(stream.next().await, Some(text("a")));
            assert_eq!(stream.next().await, Some(text("b")));
        }
    }

    #[tokio::test]
    async fn late_subscriber_only_sees_later_fragments() {
        let bus = FragmentBus::new();
        let _early = bus.subscribe();
        bus.publish(text("before"));

        let mut late = bus.subscribe();
        bus.publish(text("after"));

        assert_eq!(late.next().await, Some(text("after")));
    }

    #[tokio::test]
    async fn dropping_the_stream_unsubscribes() {
        let bus = FragmentBus::new();
        let stream = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(stream);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_retained_fragments() {
        let bus = FragmentBus::with_capacity(2);
        let mut stream = bus.subscribe();

        for content in ["1", "2", "3", "4"] {
            bus.publish(text(content));
        }

        assert_eq!(stream.next().await, Some(text("3")));
        assert_eq!(stream.next().await, Some(text("4")));
    }

    #[tokio::test]
    async fn stream_ends_when_bus_is_dropped() {
        let bus = FragmentBus::new();
        let mut stream = bus.subscribe();
        drop(bus);

        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn contract_delivers_turn_fragments_to_prior_subscription() {
        let backend = EchoBackend {
            bus: FragmentBus::new(),
        };
        let mut fragments = backend.subscribe_fragments();

        backend
            .request_completion("hi".to_string())
            .await
            .expect("echo completion succeeds");

        assert_eq!(fragments.next().await, Some(text("hi").starting()));
        assert_eq!(fragments.next().await, Some(text("").ending()));
        assert_eq!(
            backend
                .notify_confirmation(true)
                .await
                .expect_err("echo backend rejects confirmations")
                .message(),
            "nothing to confirm"
        );
        assert!(backend.reset_conversation().await.is_ok());
        assert_eq!(backend.profile().backend_id, "echo");
    }
}
