//! `supaman` - A live mission feed backed by a Supabase-compatible backend
//!
//! This library provides the mission store client (initial fetch, live insert
//! subscription, dispatch) and the feed controller that keeps a dashboard in
//! sync with it.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod mission;
pub mod store;

pub use backend::BackendClient;
pub use config::Config;
pub use error::{Error, Result};
pub use feed::{FeedController, FeedOptions, FeedState};
pub use logging::init_logging;
pub use mission::{Mission, MissionId, MissionStatus, NewMission};
pub use store::{MemoryStore, MissionStore, SupabaseStore, Subscription};
