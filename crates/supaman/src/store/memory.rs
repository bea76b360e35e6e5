//! In-process mission store.
//!
//! Behaves like the hosted backend from the controller's point of view: it
//! assigns ids and timestamps on insert and pushes each insert to every open
//! subscription. Failure switches and call counters let tests observe how
//! the controller drives it.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::mission::{Mission, MissionId, NewMission};
use crate::store::{MissionStore, Subscription};

/// Capacity of the internal insert broadcast.
const BROADCAST_CAPACITY: usize = 256;

/// An in-memory [`MissionStore`].
#[derive(Debug)]
pub struct MemoryStore {
    rows: Mutex<Vec<Mission>>,
    inserts_tx: broadcast::Sender<Mission>,
    next_id: AtomicI64,
    event_buffer: usize,
    fail_fetch: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_insert: AtomicBool,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    fetch_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    release_calls: AtomicUsize,
    inserted: Mutex<Vec<NewMission>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (inserts_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            rows: Mutex::new(Vec::new()),
            inserts_tx,
            next_id: AtomicI64::new(1),
            event_buffer: 64,
            fail_fetch: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            fail_insert: AtomicBool::new(false),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Create a store holding the given rows, without emitting events.
    #[must_use]
    pub fn with_rows(rows: Vec<Mission>) -> Self {
        let store = Self::new();
        for row in rows {
            store.seed(row);
        }
        store
    }

    /// Add a row without emitting an insert event.
    pub fn seed(&self, mission: Mission) {
        if let Ok(id) = mission.id.as_str().parse::<i64>() {
            self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
        }
        lock(&self.rows).push(mission);
    }

    /// Emit an insert event as if another client had written `mission`.
    ///
    /// The row is stored too.
    pub fn emit_insert(&self, mission: Mission) {
        self.seed(mission.clone());
        // No receivers simply means nobody is subscribed.
        let _ = self.inserts_tx.send(mission);
    }

    /// Make subsequent fetches fail (or succeed again).
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent subscribes fail (or succeed again).
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent inserts fail (or succeed again).
    pub fn set_fail_insert(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    /// Number of `fetch_all` calls so far.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.counters.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `subscribe_inserts` calls so far.
    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.counters.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of `insert` calls so far, including rejected ones.
    #[must_use]
    pub fn insert_calls(&self) -> usize {
        self.counters.insert_calls.load(Ordering::SeqCst)
    }

    /// Number of subscriptions whose producer has stopped after release.
    #[must_use]
    pub fn release_calls(&self) -> usize {
        self.counters.release_calls.load(Ordering::SeqCst)
    }

    /// Every payload passed to `insert`, in call order.
    #[must_use]
    pub fn inserted(&self) -> Vec<NewMission> {
        lock(&self.counters.inserted).clone()
    }

    /// Number of currently open subscriptions.
    #[must_use]
    pub fn open_subscriptions(&self) -> usize {
        self.inserts_tx.receiver_count()
    }
}

#[async_trait::async_trait]
impl MissionStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_all(&self) -> Result<Vec<Mission>> {
        self.counters.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::connectivity("fetch", "memory store is offline"));
        }

        let mut rows = lock(&self.rows).clone();
        // Stable sort keeps seeding order among equal timestamps.
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn subscribe_inserts(&self) -> Result<Subscription> {
        self.counters.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::connectivity("subscribe", "memory store is offline"));
        }

        let mut inserts = self.inserts_tx.subscribe();
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        let counters = Arc::clone(&self.counters);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            counters.release_calls.fetch_add(1, Ordering::SeqCst);
                            break;
                        }
                    }
                    event = inserts.recv() => match event {
                        Ok(mission) => {
                            if tx.send(mission).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "memory subscription lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            debug!("memory subscription stopped");
        });

        Ok(Subscription::new(rx, shutdown_tx, task))
    }

    async fn insert(&self, mission: NewMission) -> Result<()> {
        self.counters.insert_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.counters.inserted).push(mission.clone());
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(Error::write("memory store rejected the insert"));
        }
        if mission.title.is_empty() {
            return Err(Error::write("title must not be empty"));
        }

        let id = MissionId::from(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.emit_insert(mission.into_mission(id, Utc::now()));
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
