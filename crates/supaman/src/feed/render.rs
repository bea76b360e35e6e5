//! Text rendering of the dashboard page.

use std::fmt::Display;
use std::io::Write;

use chrono::{Local, TimeZone};
use tracing::warn;

use crate::error::Result;
use crate::feed::controller::FeedView;
use crate::feed::draft::Draft;
use crate::feed::reducer::FeedState;
use crate::mission::Mission;

/// Page header.
pub const HEADER: &str = "SupaMan Mission Control";

/// Shown when the feed has no missions.
pub const EMPTY_FEED: &str = "No active missions. Earth is safe... for now.";

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Render the whole page as text, with times shown in `tz`.
#[must_use]
pub fn render_page<Tz>(state: &FeedState, draft: &Draft, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut lines = vec![
        HEADER.to_string(),
        "=".repeat(HEADER.len()),
        String::new(),
        "Dispatch a mission".to_string(),
        format!("  Title:   {}", draft.title),
        format!("  Details: {}", draft.description),
    ];
    if let Some(error) = &state.form_error {
        lines.push(format!("  ! {}", error.message));
    }
    lines.push("  (type `title | details` and press Enter, `:q` to quit)".to_string());
    lines.push(String::new());

    lines.push("Live missions".to_string());
    if let Some(banner) = &state.banner {
        lines.push(format!("  !! {}", banner.message));
    }
    if state.missions.is_empty() {
        lines.push(format!("  {EMPTY_FEED}"));
    } else {
        for mission in &state.missions {
            lines.push(format!("  {}", format_mission(mission, tz)));
            if !mission.description.is_empty() {
                lines.push(format!("      {}", mission.description));
            }
        }
    }

    let mut page = lines.join("\n");
    page.push('\n');
    page
}

/// One-line summary: time, status badge and title.
#[must_use]
pub fn format_mission<Tz>(mission: &Mission, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}  [{}]  {}",
        mission.created_at.with_timezone(tz).format("%H:%M:%S"),
        mission.status.as_str().to_uppercase(),
        mission.title
    )
}

/// Write one page to `out`, optionally clearing the screen first.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the page cannot be written.
pub fn write_page<W: Write>(out: &mut W, page: &str, clear: bool) -> Result<()> {
    if clear {
        out.write_all(CLEAR_SCREEN.as_bytes())?;
    }
    out.write_all(page.as_bytes())?;
    if !clear {
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Writes each page to stdout.
#[derive(Debug, Clone, Copy)]
pub struct TerminalView {
    clear: bool,
}

impl TerminalView {
    /// Create a view. With `clear` the screen is wiped before each page.
    #[must_use]
    pub fn new(clear: bool) -> Self {
        Self { clear }
    }
}

impl FeedView for TerminalView {
    fn render(&mut self, state: &FeedState, draft: &Draft) {
        let page = render_page(state, draft, &Local);
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = write_page(&mut stdout, &page, self.clear) {
            warn!(error = %e, "failed to draw page");
        }
    }
}
