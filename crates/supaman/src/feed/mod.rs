//! The mission feed: state, transitions, the controller and its page.

pub mod controller;
pub mod draft;
pub mod input;
pub mod reducer;
pub mod render;

pub use controller::{
    fetch_with_retry, DispatchOutcome, FeedController, FeedOptions, FeedView, RetryPolicy,
};
pub use draft::Draft;
pub use input::{parse_console_line, UiInput};
pub use reducer::{FeedEvent, FeedReducer, FeedState, Notice, NoticeKind};
pub use render::{format_mission, render_page, write_page, TerminalView};
