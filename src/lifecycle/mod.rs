//! Draft/published lifecycle of a snippet
//!
//! A [`SnippetEditor`] wraps the snippet being edited together with the view
//! the user is looking at. The lifecycle state is derived, never stored:
//!
//! | pending draft | view        | state                |
//! |---------------|-------------|----------------------|
//! | no            | any         | `PublishedClean`     |
//! | yes           | `Published` | `PublishedWithDraft` |
//! | yes           | `Draft`     | `DraftEditing`       |
//!
//! Editing the published view forks a draft automatically when there is no
//! pending draft, and is rejected while one exists.

pub mod debounce;
pub mod guard;

use serde::{Deserialize, Serialize};

use crate::snippet::Snippet;
use crate::spec::VisualizationSpec;
use crate::{ChartbookError, Result};

pub use debounce::Debouncer;
pub use guard::{SuppressionFlag, Suppressed};

/// Which tree the user is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionState {
    /// Draft and published trees are equal
    PublishedClean,
    /// Looking at the published tree while a draft is pending; read-only
    PublishedWithDraft,
    /// Looking at the pending draft
    DraftEditing,
}

/// What an accepted edit did to the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied,
    /// The edit was made on the published view and switched it to the draft
    Forked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    Reverted,
    Cancelled,
}

/// State machine over one snippet's published and draft trees
#[derive(Debug, Clone)]
pub struct SnippetEditor {
    snippet: Snippet,
    view: ViewMode,
}

impl SnippetEditor {
    /// Start editing in the draft view
    pub fn new(snippet: Snippet) -> Self {
        Self::with_view(snippet, ViewMode::Draft)
    }

    pub fn with_view(snippet: Snippet, view: ViewMode) -> Self {
        Self { snippet, view }
    }

    pub fn snippet(&self) -> &Snippet {
        &self.snippet
    }

    pub fn into_snippet(self) -> Snippet {
        self.snippet
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view
    }

    pub fn state(&self) -> VersionState {
        match (self.snippet.has_pending_draft(), self.view) {
            (false, _) => VersionState::PublishedClean,
            (true, ViewMode::Published) => VersionState::PublishedWithDraft,
            (true, ViewMode::Draft) => VersionState::DraftEditing,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.state() == VersionState::PublishedWithDraft
    }

    /// Tree shown for the current view
    pub fn visible_spec(&self) -> &VisualizationSpec {
        match self.view {
            ViewMode::Published => self.snippet.spec(),
            ViewMode::Draft => self.snippet.draft_spec(),
        }
    }

    /// Switch views; returns whether the new view is read-only
    pub fn set_view(&mut self, view: ViewMode) -> bool {
        self.view = view;
        self.is_read_only()
    }

    /// Apply an edit to the draft
    ///
    /// Fails with `ReadOnlyView` while the published view of a snippet with
    /// a pending draft is shown; the snippet is left untouched.
    pub fn edit(&mut self, draft: VisualizationSpec) -> Result<EditOutcome> {
        let outcome = match self.state() {
            VersionState::PublishedWithDraft => {
                return Err(ChartbookError::ReadOnlyView(format!(
                    "snippet '{}' has an unpublished draft; switch to the draft view to edit",
                    self.snippet.name()
                )));
            }
            VersionState::PublishedClean if self.view == ViewMode::Published => {
                self.view = ViewMode::Draft;
                EditOutcome::Forked
            }
            _ => EditOutcome::Applied,
        };

        self.snippet.set_draft(draft);
        if outcome == EditOutcome::Forked {
            tracing::debug!(snippet = self.snippet.id(), "forked draft from published view");
        }
        Ok(outcome)
    }

    /// Copy the draft into the published tree
    pub fn publish(&mut self) {
        self.snippet.publish_draft();
        tracing::info!(snippet = self.snippet.id(), "published draft");
    }

    /// Discard the draft, if the user confirmed
    pub fn revert(&mut self, confirmed: bool) -> RevertOutcome {
        if !confirmed {
            return RevertOutcome::Cancelled;
        }
        self.snippet.revert_draft();
        tracing::info!(snippet = self.snippet.id(), "reverted draft");
        RevertOutcome::Reverted
    }

    /// Access to the fields that live outside the lifecycle (name, comment)
    pub(crate) fn snippet_mut(&mut self) -> &mut Snippet {
        &mut self.snippet
    }

    /// Rewrite dataset references in both trees
    pub(crate) fn rewrite_dataset_name(&mut self, old_name: &str, new_name: &str) -> bool {
        self.snippet.rewrite_dataset_name(old_name, new_name)
    }
}
