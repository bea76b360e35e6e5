//! Mission store clients.
//!
//! [`MissionStore`] is the seam between the feed controller and whatever
//! holds missions durably. [`SupabaseStore`] talks to the hosted backend;
//! [`MemoryStore`] keeps everything in process and stands in for it in tests
//! and offline mode.

pub mod memory;
pub mod protocol;
pub mod realtime;
pub mod rest;
mod subscription;

use crate::error::Result;
use crate::mission::{Mission, NewMission};

pub use memory::MemoryStore;
pub use rest::SupabaseStore;
pub use subscription::Subscription;

/// A source and sink of missions.
///
/// Implementors own all network or storage access for missions.
#[async_trait::async_trait]
pub trait MissionStore: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Fetch every mission, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Connectivity`] if the store cannot be read.
    async fn fetch_all(&self) -> Result<Vec<Mission>>;

    /// Open a stream of insert events.
    ///
    /// Each insert the store observes is delivered once, in store order.
    /// Updates and deletes are not delivered. The returned [`Subscription`]
    /// must be released (or dropped) to stop delivery.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Connectivity`] if the stream cannot be opened.
    async fn subscribe_inserts(&self) -> Result<Subscription>;

    /// Store one new mission.
    ///
    /// The created record is not returned; it arrives through any open
    /// subscription instead.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Write`] if the store rejects the record.
    async fn insert(&self, mission: NewMission) -> Result<()>;
}
