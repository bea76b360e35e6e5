//! User input for the dashboard.

/// One user action, delivered to [`super::FeedController::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiInput {
    /// Replace the draft title.
    SetTitle(String),
    /// Replace the draft description.
    SetDescription(String),
    /// Dispatch the draft.
    Submit,
    /// Leave the dashboard.
    Unmount,
}

const FIELD_SEPARATOR: char = '|';

/// Turn one console line into the inputs it stands for.
///
/// `title | description` (or a bare `title`) fills the form and submits it.
/// `:q` and `:quit` unmount. A blank line yields nothing.
#[must_use]
pub fn parse_console_line(line: &str) -> Vec<UiInput> {
    let line = line.trim();
    match line {
        "" => Vec::new(),
        ":q" | ":quit" => vec![UiInput::Unmount],
        _ => {
            let (title, description) = line
                .split_once(FIELD_SEPARATOR)
                .unwrap_or((line, ""));
            vec![
                UiInput::SetTitle(title.trim().to_string()),
                UiInput::SetDescription(description.trim().to_string()),
                UiInput::Submit,
            ]
        }
    }
}
