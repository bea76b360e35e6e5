//! The mission feed controller.
//!
//! [`FeedController`] owns the feed state and the draft, drives a
//! [`MissionStore`], and re-renders a [`FeedView`] after every change. All
//! mutation happens on the task that calls [`FeedController::run`] (or the
//! step methods), one event at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::draft::Draft;
use crate::feed::input::UiInput;
use crate::feed::reducer::{FeedEvent, FeedReducer, FeedState, Notice, NoticeKind};
use crate::mission::Mission;
use crate::store::{MissionStore, Subscription};

/// Something that can show the feed.
pub trait FeedView {
    /// Draw the current state. Called after every change.
    fn render(&mut self, state: &FeedState, draft: &Draft);
}

/// Retry schedule for the initial fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Upper bound on any delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (1-based), doubling each time.
    #[must_use]
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1 << exponent)
            .min(self.max_backoff)
    }
}

/// Tunables for a [`FeedController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOptions {
    /// Drop inserts whose id is already shown.
    pub dedupe_by_id: bool,
    /// Initial fetch retry schedule.
    pub retry: RetryPolicy,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            dedupe_by_id: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl FeedOptions {
    /// Options taken from the `[feed]` configuration section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            dedupe_by_id: config.feed.dedupe_by_id,
            retry: RetryPolicy {
                max_attempts: config.feed.fetch_max_attempts,
                initial_backoff: config.fetch_backoff(),
                max_backoff: config.fetch_max_backoff(),
            },
        }
    }
}

/// Result of submitting the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The title was empty; nothing was sent.
    Ignored,
    /// The store accepted the mission; the draft was cleared.
    Dispatched,
    /// The store rejected the mission; the draft was kept.
    Rejected(String),
}

/// Owns the feed and the draft and talks to the store.
pub struct FeedController {
    store: Arc<dyn MissionStore>,
    reducer: FeedReducer,
    retry: RetryPolicy,
    state: FeedState,
    draft: Draft,
    subscription: Option<Subscription>,
    live_updates_down: bool,
}

impl std::fmt::Debug for FeedController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedController")
            .field("store", &self.store.name())
            .field("reducer", &self.reducer)
            .field("retry", &self.retry)
            .field("state", &self.state)
            .field("draft", &self.draft)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

impl FeedController {
    /// Create an unmounted controller with an empty feed and draft.
    #[must_use]
    pub fn new(store: Arc<dyn MissionStore>, options: FeedOptions) -> Self {
        Self {
            store,
            reducer: FeedReducer::new(options.dedupe_by_id),
            retry: options.retry,
            state: FeedState::default(),
            draft: Draft::default(),
            subscription: None,
            live_updates_down: false,
        }
    }

    /// Current feed state.
    #[must_use]
    pub fn state(&self) -> &FeedState {
        &self.state
    }

    /// Missions in display order.
    #[must_use]
    pub fn missions(&self) -> &[Mission] {
        &self.state.missions
    }

    /// Current draft.
    #[must_use]
    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// Whether an insert subscription is open.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Replace the draft title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    /// Replace the draft description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    /// Feed one event through the reducer.
    pub fn apply(&mut self, event: FeedEvent) {
        let prev = std::mem::take(&mut self.state);
        self.state = self.reducer.reduce(prev, event);
    }

    /// Fetch the initial missions (with retries) and apply the result.
    ///
    /// Returns whether the fetch succeeded.
    pub async fn load(&mut self) -> bool {
        let result = fetch_with_retry(Arc::clone(&self.store), self.retry).await;
        self.finish_load(result)
    }

    fn finish_load(&mut self, result: Result<Vec<Mission>>) -> bool {
        match result {
            Ok(missions) => {
                info!(count = missions.len(), "initial missions loaded");
                self.apply(FeedEvent::Loaded(missions));
                // A broken subscription keeps its banner.
                if !self.live_updates_down {
                    self.apply(FeedEvent::ClearNotice(NoticeKind::Connectivity));
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "initial fetch failed");
                self.apply(FeedEvent::Notice(Notice::connectivity(format!(
                    "Mission feed unavailable: {e}"
                ))));
                false
            }
        }
    }

    /// Open the insert subscription if none is open.
    ///
    /// Returns whether a subscription is open afterwards.
    pub async fn subscribe(&mut self) -> bool {
        if self.subscription.is_some() {
            return true;
        }
        let result = self.store.subscribe_inserts().await;
        self.finish_subscribe(result)
    }

    fn finish_subscribe(&mut self, result: Result<Subscription>) -> bool {
        match result {
            Ok(subscription) => {
                debug!(store = self.store.name(), "subscribed to inserts");
                self.subscription = Some(subscription);
                self.live_updates_down = false;
                true
            }
            Err(e) => {
                warn!(error = %e, "subscribe failed");
                self.live_updates_down = true;
                self.apply(FeedEvent::Notice(Notice::connectivity(format!(
                    "Live updates unavailable: {e}"
                ))));
                false
            }
        }
    }

    /// Wait for the next insert and prepend it.
    ///
    /// Returns `false` without waiting if there is no subscription, or after
    /// the subscription ends.
    pub async fn next_insert(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        let received = subscription.recv().await;
        self.on_insert(received)
    }

    fn on_insert(&mut self, received: Option<Mission>) -> bool {
        if let Some(mission) = received {
            debug!(id = %mission.id, "prepending inserted mission");
            self.apply(FeedEvent::Inserted(mission));
            true
        } else {
            warn!("insert subscription ended");
            self.subscription = None;
            self.live_updates_down = true;
            self.apply(FeedEvent::Notice(Notice::connectivity(
                "Live updates disconnected",
            )));
            false
        }
    }

    /// Dispatch the draft.
    ///
    /// An empty title is a no-op. On success the draft is cleared; on
    /// failure it is kept and an inline notice is shown.
    pub async fn submit(&mut self) -> DispatchOutcome {
        let Some(payload) = self.draft.to_new_mission() else {
            debug!("ignoring submit with empty title");
            return DispatchOutcome::Ignored;
        };

        match self.store.insert(payload).await {
            Ok(()) => {
                info!(title = %self.draft.title, "mission dispatched");
                self.draft.clear();
                self.apply(FeedEvent::ClearNotice(NoticeKind::Write));
                DispatchOutcome::Dispatched
            }
            Err(e) => {
                warn!(error = %e, "dispatch failed");
                let message = e.to_string();
                self.apply(FeedEvent::Notice(Notice::write(message.clone())));
                DispatchOutcome::Rejected(message)
            }
        }
    }

    /// Release the subscription, if one is open.
    pub async fn unmount(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release().await;
            info!("feed unmounted");
        }
    }

    /// Apply one user input.
    ///
    /// Returns `false` once the input was [`UiInput::Unmount`].
    pub async fn handle_input(&mut self, input: UiInput) -> bool {
        match input {
            UiInput::SetTitle(title) => self.set_title(title),
            UiInput::SetDescription(description) => self.set_description(description),
            UiInput::Submit => {
                self.submit().await;
            }
            UiInput::Unmount => {
                self.unmount().await;
                return false;
            }
        }
        true
    }

    /// Mount the feed and process events until unmounted.
    ///
    /// The initial fetch and the subscription both start right away and
    /// complete inside the loop, so inputs are served while either is still
    /// pending. The loop ends on [`UiInput::Unmount`] or when `inputs`
    /// closes; the subscription is released and anything still pending is
    /// cancelled before returning the final state.
    pub async fn run<V>(mut self, mut inputs: mpsc::Receiver<UiInput>, view: &mut V) -> FeedState
    where
        V: FeedView + ?Sized,
    {
        view.render(&self.state, &self.draft);

        let mut fetch: JoinHandle<Result<Vec<Mission>>> =
            tokio::spawn(fetch_with_retry(Arc::clone(&self.store), self.retry));
        let mut loading = true;

        let store = Arc::clone(&self.store);
        let mut opening: JoinHandle<Result<Subscription>> =
            tokio::spawn(async move { store.subscribe_inserts().await });
        let mut subscribing = true;

        loop {
            tokio::select! {
                joined = &mut opening, if subscribing => {
                    subscribing = false;
                    let result = joined.unwrap_or_else(|e| {
                        Err(Error::internal(format!("subscribe task failed: {e}")))
                    });
                    self.finish_subscribe(result);
                }
                joined = &mut fetch, if loading => {
                    loading = false;
                    let result = joined.unwrap_or_else(|e| {
                        Err(Error::internal(format!("fetch task failed: {e}")))
                    });
                    self.finish_load(result);
                }
                received = recv_insert(&mut self.subscription), if self.subscription.is_some() => {
                    self.on_insert(received);
                }
                input = inputs.recv() => match input {
                    Some(input) => {
                        if !self.handle_input(input).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
            view.render(&self.state, &self.draft);
        }

        if loading {
            fetch.abort();
        }
        if subscribing {
            opening.abort();
            // The subscribe may have finished just before the abort.
            if let Ok(Ok(subscription)) = opening.await {
                subscription.release().await;
            }
        }
        self.unmount().await;
        std::mem::take(&mut self.state)
    }
}

async fn recv_insert(subscription: &mut Option<Subscription>) -> Option<Mission> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

/// Fetch all missions, retrying connectivity failures per `policy`.
///
/// # Errors
///
/// Returns the last error once all attempts have failed.
pub async fn fetch_with_retry(
    store: Arc<dyn MissionStore>,
    policy: RetryPolicy,
) -> Result<Vec<Mission>> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match store.fetch_all().await {
            Ok(missions) => return Ok(missions),
            Err(e) if attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(attempt, max_attempts, ?delay, error = %e, "fetch failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
