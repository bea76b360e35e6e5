//! Pure state transitions for the mission feed.

use std::collections::HashSet;

use crate::mission::{Mission, MissionId};

/// Which part of the page a notice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// Banner above the feed: the backend could not be reached.
    Connectivity,
    /// Inline message next to the form: the last dispatch was rejected.
    Write,
}

/// A transient message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Where the notice is shown.
    pub kind: NoticeKind,
    /// Human-readable text.
    pub message: String,
}

impl Notice {
    /// A connectivity banner.
    #[must_use]
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Connectivity,
            message: message.into(),
        }
    }

    /// An inline write error.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Write,
            message: message.into(),
        }
    }
}

/// Everything the feed shows apart from the form fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedState {
    /// Missions in display order.
    pub missions: Vec<Mission>,
    /// Current connectivity banner, if any.
    pub banner: Option<Notice>,
    /// Current inline form error, if any.
    pub form_error: Option<Notice>,
    /// Ids prepended by live inserts since the last load.
    pub(crate) arrivals: HashSet<MissionId>,
}

impl FeedState {
    /// The notice of the given kind, if one is showing.
    #[must_use]
    pub fn notice(&self, kind: NoticeKind) -> Option<&Notice> {
        match kind {
            NoticeKind::Connectivity => self.banner.as_ref(),
            NoticeKind::Write => self.form_error.as_ref(),
        }
    }

    /// Whether a mission with this id is in the feed.
    #[must_use]
    pub fn contains(&self, id: &MissionId) -> bool {
        self.missions.iter().any(|m| &m.id == id)
    }
}

/// Something that changes the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The initial fetch returned.
    Loaded(Vec<Mission>),
    /// The subscription delivered an insert.
    Inserted(Mission),
    /// Show a notice, replacing any of the same kind.
    Notice(Notice),
    /// Hide the notice of this kind.
    ClearNotice(NoticeKind),
}

/// Applies [`FeedEvent`]s to a [`FeedState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedReducer {
    dedupe_by_id: bool,
}

impl Default for FeedReducer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FeedReducer {
    /// Create a reducer.
    ///
    /// With `dedupe_by_id` an insert whose id is already shown is dropped,
    /// and a load keeps earlier live arrivals it does not contain. Without
    /// it every insert is prepended and a load replaces the list.
    #[must_use]
    pub fn new(dedupe_by_id: bool) -> Self {
        Self { dedupe_by_id }
    }

    /// Compute the next state.
    #[must_use]
    pub fn reduce(&self, mut state: FeedState, event: FeedEvent) -> FeedState {
        match event {
            FeedEvent::Loaded(fetched) => {
                let arrivals = std::mem::take(&mut state.arrivals);
                state.missions = if self.dedupe_by_id {
                    merge_loaded(state.missions, &arrivals, fetched)
                } else {
                    fetched
                };
            }
            FeedEvent::Inserted(mission) => {
                if !(self.dedupe_by_id && state.contains(&mission.id)) {
                    state.arrivals.insert(mission.id.clone());
                    state.missions.insert(0, mission);
                }
            }
            FeedEvent::Notice(notice) => match notice.kind {
                NoticeKind::Connectivity => state.banner = Some(notice),
                NoticeKind::Write => state.form_error = Some(notice),
            },
            FeedEvent::ClearNotice(NoticeKind::Connectivity) => state.banner = None,
            FeedEvent::ClearNotice(NoticeKind::Write) => state.form_error = None,
        }
        state
    }
}

/// Live arrivals not in the fetched result stay on top, newest first.
/// Rows from an earlier load are replaced by the fetched list.
fn merge_loaded(
    current: Vec<Mission>,
    arrivals: &HashSet<MissionId>,
    fetched: Vec<Mission>,
) -> Vec<Mission> {
    let mut seen: HashSet<MissionId> = fetched.iter().map(|m| m.id.clone()).collect();
    let mut merged: Vec<Mission> = current
        .into_iter()
        .filter(|m| arrivals.contains(&m.id) && seen.insert(m.id.clone()))
        .collect();

    let mut emitted = HashSet::new();
    merged.extend(fetched.into_iter().filter(|m| emitted.insert(m.id.clone())));
    merged
}
