//! Session controller: drives user actions through a [`ChatBackend`] and
//! routes streamed fragments into the [`Session`].
//!
//! At most one fragment subscription is active. Each `send` allocates a new
//! subscription id; fragments arriving on any other subscription are dropped
//! before they touch the session. After a turn completes its subscription is
//! parked on a background task until the next `send` replaces it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chat_backend::{BackendProfile, ChatBackend, FragmentStream};
use chat_transcript::Fragment;
use futures_util::stream::{Fuse, StreamExt};
use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::{Routed, SendRejection, Session, SessionSnapshot};

pub type SubscriptionId = u64;

/// Observer notified after every session mutation.
pub trait RenderHost: Send + Sync {
    fn request_render(&self);
}

/// Render host for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRenderHost;

impl RenderHost for NoopRenderHost {
    fn request_render(&self) {}
}

/// How a `send` call ended. Purely informational: failures have already
/// been recorded in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    Failed(String),
    Rejected(SendRejection),
    /// A later send replaced this one's subscription before it finished.
    Superseded,
}

/// A send accepted by [`SessionController::start_send`] whose completion has
/// not been requested yet.
#[derive(Debug)]
#[must_use = "a started turn keeps the session busy until it is streamed"]
pub struct StartedTurn {
    subscription: SubscriptionId,
    content: String,
}

struct Shared {
    session: Session,
    active_subscription: Option<SubscriptionId>,
}

pub struct SessionController {
    shared: Arc<Mutex<Shared>>,
    backend: Arc<dyn ChatBackend>,
    render: Arc<dyn RenderHost>,
    listener: Mutex<Option<JoinHandle<()>>>,
    next_subscription: AtomicU64,
}

impl SessionController {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self::with_render_host(backend, Arc::new(NoopRenderHost))
    }

    pub fn with_render_host(backend: Arc<dyn ChatBackend>, render: Arc<dyn RenderHost>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                session: Session::new(),
                active_subscription: None,
            })),
            backend,
            render,
            listener: Mutex::new(None),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn backend_profile(&self) -> BackendProfile {
        self.backend.profile()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock_unpoisoned(&self.shared).session.snapshot()
    }

    /// Sends `content` as the next user message and streams the reply into
    /// the transcript. Resolves once the backend reports the turn finished.
    pub async fn send(&self, content: impl Into<String>) -> SendOutcome {
        match self.start_send(content) {
            Ok(turn) => self.stream_turn(turn).await,
            Err(rejection) => SendOutcome::Rejected(rejection),
        }
    }

    /// Synchronous half of [`send`](Self::send): records the user entry and
    /// claims the session, or rejects when it is busy. Calls are accepted in
    /// the order they are made.
    pub fn start_send(&self, content: impl Into<String>) -> Result<StartedTurn, SendRejection> {
        let content = content.into();
        let subscription = {
            let mut shared = lock_unpoisoned(&self.shared);
            if let Err(rejection) = shared.session.begin_send(&content) {
                debug!(%rejection, "send rejected");
                return Err(rejection);
            }
            let subscription = self.next_subscription.fetch_add(1, Ordering::Relaxed);
            shared.active_subscription = Some(subscription);
            subscription
        };
        self.render.request_render();
        Ok(StartedTurn {
            subscription,
            content,
        })
    }

    /// Requests the completion for a turn claimed by
    /// [`start_send`](Self::start_send) and routes its fragments.
    pub async fn stream_turn(&self, turn: StartedTurn) -> SendOutcome {
        let StartedTurn {
            subscription,
            content,
        } = turn;

        if let Some(previous) = lock_unpoisoned(&self.listener).take() {
            debug!("tearing down previous fragment subscription");
            previous.abort();
        }

        let mut fragments = self.backend.subscribe_fragments().fuse();
        let mut completion = self.backend.request_completion(content);
        debug!(subscription, "completion requested");

        let result = loop {
            tokio::select! {
                biased;
                Some(fragment) = fragments.next() => {
                    route(&self.shared, self.render.as_ref(), subscription, &fragment);
                }
                result = &mut completion => break result,
            }
        };
        drop(completion);

        while let Some(Some(fragment)) = fragments.next().now_or_never() {
            route(&self.shared, self.render.as_ref(), subscription, &fragment);
        }
        self.park_listener(subscription, fragments);

        let outcome = {
            let mut shared = lock_unpoisoned(&self.shared);
            if shared.active_subscription != Some(subscription) {
                debug!(subscription, "send superseded before completion");
                return SendOutcome::Superseded;
            }

            match result {
                Ok(()) => {
                    shared.session.finish_send(None);
                    SendOutcome::Completed
                }
                Err(error) => {
                    warn!(%error, "completion request failed");
                    shared.session.finish_send(Some(error.message()));
                    SendOutcome::Failed(error.message().to_string())
                }
            }
        };
        self.render.request_render();
        outcome
    }

    /// Releases the confirmation gate locally, then reports the decision.
    /// A failed report becomes an error entry; the gate stays released.
    pub async fn resolve_confirmation(&self, approved: bool) {
        let resolved = lock_unpoisoned(&self.shared).session.resolve_confirmation();
        if resolved.is_none() {
            debug!(approved, "confirmation resolved with nothing pending");
        }
        self.render.request_render();

        if let Err(error) = self.backend.notify_confirmation(approved).await {
            warn!(%error, approved, "confirmation notification failed");
            lock_unpoisoned(&self.shared)
                .session
                .push_error(error.message());
            self.render.request_render();
        }
    }

    /// Clears local state at once, then asks the backend to forget the
    /// conversation. Backend failures are ignored.
    pub async fn reset(&self) {
        lock_unpoisoned(&self.shared).session.clear();
        self.render.request_render();

        if let Err(error) = self.backend.reset_conversation().await {
            debug!(%error, "backend reset failed; local state already cleared");
        }
    }

    fn park_listener(&self, subscription: SubscriptionId, mut fragments: Fuse<FragmentStream>) {
        let mut listener = lock_unpoisoned(&self.listener);
        if lock_unpoisoned(&self.shared).active_subscription != Some(subscription) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let render = Arc::clone(&self.render);
        *listener = Some(tokio::spawn(async move {
            while let Some(fragment) = fragments.next().await {
                if !route(&shared, render.as_ref(), subscription, &fragment) {
                    break;
                }
            }
            debug!(subscription, "parked fragment subscription ended");
        }));
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(listener) = lock_unpoisoned(&self.listener).take() {
            listener.abort();
        }
    }
}

/// Applies `fragment` when `subscription` is still the active one. Returns
/// whether it was.
fn route(
    shared: &Mutex<Shared>,
    render: &dyn RenderHost,
    subscription: SubscriptionId,
    fragment: &Fragment,
) -> bool {
    {
        let mut shared = lock_unpoisoned(shared);
        if shared.active_subscription != Some(subscription) {
            debug!(subscription, "dropping fragment from stale subscription");
            return false;
        }
        match shared.session.on_fragment(fragment) {
            Routed::Intercepted => debug!("confirmation requested"),
            Routed::Applied(transition) => debug!(?transition, "fragment applied"),
        }
    }
    render.request_render();
    true
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
