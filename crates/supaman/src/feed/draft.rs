//! Form scratch state for a mission that has not been dispatched yet.

use crate::mission::NewMission;

/// Unsaved input for a new mission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Title field.
    pub title: String,
    /// Description field.
    pub description: String,
}

impl Draft {
    /// Create a draft with both fields filled in.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Whether this draft may be dispatched. Only the title is required.
    #[must_use]
    pub fn is_dispatchable(&self) -> bool {
        !self.title.is_empty()
    }

    /// Whether both fields are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.description.is_empty()
    }

    /// The insert payload for this draft, or `None` if the title is empty.
    #[must_use]
    pub fn to_new_mission(&self) -> Option<NewMission> {
        self.is_dispatchable()
            .then(|| NewMission::pending(self.title.clone(), self.description.clone()))
    }

    /// Reset both fields.
    pub fn clear(&mut self) {
        self.title.clear();
        self.description.clear();
    }
}
