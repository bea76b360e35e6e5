//! Scoped handle for a live insert stream.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::mission::Mission;

/// How long a release waits for the producer task to say goodbye.
const RELEASE_GRACE: Duration = Duration::from_secs(2);

/// A live stream of inserted missions.
///
/// The producer task runs until the subscription is released. Release
/// happens exactly once: either through [`Subscription::release`] or when
/// the subscription is dropped.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<Mission>,
    guard: Option<ReleaseGuard>,
}

#[derive(Debug)]
struct ReleaseGuard {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a producer task.
    ///
    /// The task must send inserts on the channel behind `events` and stop
    /// once `shutdown` flips to `true` (or its sender goes away).
    #[must_use]
    pub fn new(
        events: mpsc::Receiver<Mission>,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            events,
            guard: Some(ReleaseGuard {
                shutdown,
                task: Some(task),
            }),
        }
    }

    /// Wait for the next inserted mission.
    ///
    /// Returns `None` once the producer has stopped.
    pub async fn recv(&mut self) -> Option<Mission> {
        self.events.recv().await
    }

    /// Stop delivery and wait for the producer to finish.
    ///
    /// A producer that does not stop within a short grace period is aborted.
    pub async fn release(mut self) {
        self.events.close();
        let Some(mut guard) = self.guard.take() else {
            return;
        };
        let _ = guard.shutdown.send(true);

        if let Some(mut task) = guard.task.take() {
            if tokio::time::timeout(RELEASE_GRACE, &mut task).await.is_err() {
                warn!("subscription producer did not stop in time, aborting");
                task.abort();
            }
        }
        debug!("subscription released");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            let _ = guard.shutdown.send(true);
            debug!("subscription released on drop");
        }
    }
}
