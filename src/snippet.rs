//! Chart snippets with a published and a draft specification.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reference;
use crate::spec::VisualizationSpec;
use crate::naming;

/// A stored chart definition
///
/// `spec` is the published tree and `draft_spec` the working copy. The
/// published tree can only change through [`crate::SnippetEditor::publish`]
/// (or a dataset rename, which rewrites references in both trees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    id: String,
    name: String,
    spec: VisualizationSpec,
    draft_spec: VisualizationSpec,
    dataset_refs: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Snippet {
    /// Create a snippet whose draft equals its published spec
    pub fn new(name: impl Into<String>, spec: VisualizationSpec) -> Self {
        let now = Utc::now();
        Self {
            id: naming::new_id(),
            name: display_name(name.into()),
            dataset_refs: reference::extract_references(&spec),
            draft_spec: spec.clone(),
            spec,
            comment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Published specification
    pub fn spec(&self) -> &VisualizationSpec {
        &self.spec
    }

    /// Working specification
    pub fn draft_spec(&self) -> &VisualizationSpec {
        &self.draft_spec
    }

    /// Dataset names referenced by the most recently changed tree
    pub fn dataset_refs(&self) -> &BTreeSet<String> {
        &self.dataset_refs
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the draft differs from the published spec
    pub fn has_pending_draft(&self) -> bool {
        self.spec != self.draft_spec
    }

    /// Whether any tree references `dataset`
    pub fn references(&self, dataset: &str) -> bool {
        self.dataset_refs.contains(dataset)
            || reference::extract_references(&self.spec).contains(dataset)
            || reference::extract_references(&self.draft_spec).contains(dataset)
    }

    /// Blank names become [`naming::UNTITLED_SNIPPET`]
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = display_name(name.into());
        self.touch();
    }

    /// A blank comment clears it
    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment.filter(|c| !c.trim().is_empty());
        self.touch();
    }

    /// Copy under a new id; the copy's draft and published trees are the source's
    pub fn duplicate(&self, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: naming::new_id(),
            name: name.into(),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    pub(crate) fn set_draft(&mut self, draft: VisualizationSpec) {
        self.dataset_refs = reference::extract_references(&draft);
        self.draft_spec = draft;
        self.touch();
    }

    pub(crate) fn publish_draft(&mut self) {
        self.spec = self.draft_spec.clone();
        self.dataset_refs = reference::extract_references(&self.spec);
        self.touch();
    }

    pub(crate) fn revert_draft(&mut self) {
        self.draft_spec = self.spec.clone();
        self.dataset_refs = reference::extract_references(&self.draft_spec);
        self.touch();
    }

    /// Rewrite dataset references in both trees; returns whether anything changed
    pub(crate) fn rewrite_dataset_name(&mut self, old_name: &str, new_name: &str) -> bool {
        let spec = reference::rewrite_name_everywhere(&self.spec, old_name, new_name);
        let draft = reference::rewrite_name_everywhere(&self.draft_spec, old_name, new_name);
        if spec == self.spec && draft == self.draft_spec {
            return false;
        }

        self.spec = spec;
        self.draft_spec = draft;
        self.dataset_refs = reference::extract_references(&self.draft_spec);
        self.touch();
        true
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn display_name(name: String) -> String {
    if name.trim().is_empty() {
        naming::UNTITLED_SNIPPET.to_string()
    } else {
        name
    }
}
