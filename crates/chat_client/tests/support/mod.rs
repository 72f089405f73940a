use std::sync::Arc;
use std::time::Duration;

use chat_backend::ChatBackend;
use chat_backend_mock::MockBackend;
use chat_client::controller::{SendOutcome, SessionController};
use chat_client::session::SessionSnapshot;
use chat_transcript::{FragmentKind, Role};
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(2);
const POLL_ATTEMPTS: usize = 1000;

pub fn controller_for(backend: &Arc<MockBackend>) -> Arc<SessionController> {
    Arc::new(SessionController::new(Arc::clone(backend) as Arc<dyn ChatBackend>))
}

pub fn spawn_send(controller: &Arc<SessionController>, content: &str) -> JoinHandle<SendOutcome> {
    let controller = Arc::clone(controller);
    let content = content.to_string();
    tokio::spawn(async move { controller.send(content).await })
}

/// Polls snapshots until `predicate` holds.
pub async fn wait_until(
    controller: &SessionController,
    what: &str,
    predicate: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    for _ in 0..POLL_ATTEMPTS {
        let snapshot = controller.snapshot();
        if predicate(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("timed out waiting for {what}");
}

/// `(role, kind, content, open)` per entry, for compact comparisons.
pub fn entries(snapshot: &SessionSnapshot) -> Vec<(Role, FragmentKind, String, bool)> {
    snapshot
        .entries
        .iter()
        .map(|entry| (entry.role, entry.kind, entry.content.clone(), entry.open))
        .collect()
}

pub fn closed(role: Role, kind: FragmentKind, content: &str) -> (Role, FragmentKind, String, bool) {
    (role, kind, content.to_string(), false)
}
