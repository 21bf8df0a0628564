//! Coordinator between the engine and its collaborators
//!
//! A [`Workbench`] owns the snippet being edited, the two debounce timers
//! and the suppression flag, and talks to storage, the network, the editing
//! surface and the renderer only through traits. All methods must be called
//! from within a tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::dataset::{Dataset, DatasetFormat, DatasetSource};
use crate::detect;
use crate::fetch::Fetcher;
use crate::lifecycle::{
    Debouncer, EditOutcome, RevertOutcome, SnippetEditor, SuppressionFlag, ViewMode,
};
use crate::naming;
use crate::reference;
use crate::snippet::Snippet;
use crate::spec::VisualizationSpec;
use crate::store::{DatasetStore, SnippetStore};
use crate::{ChartbookError, Result};

// ============================================================================
// Collaborators
// ============================================================================

/// Text-editing widget showing the visible tree
pub trait EditorSurface: Send + Sync {
    fn set_content(&self, text: &str, read_only: bool);
}

/// Consumer of resolved, reference-free specs
pub trait RenderTarget: Send + Sync {
    fn render(&self, spec: &VisualizationSpec);

    fn render_error(&self, error: &ChartbookError);
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of propagating a dataset rename to referencing snippets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameReport {
    /// Snippets that referenced the old name
    pub targeted: usize,
    pub succeeded: usize,
    pub failures: Vec<RenameFailure>,
}

impl RenameReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFailure {
    pub snippet_id: String,
    pub snippet_name: String,
    pub error: String,
}

// ============================================================================
// Save tracking
// ============================================================================

/// Edit generations shared between the workbench and its save task
///
/// Every accepted edit bumps `edited`. A write records the generation it
/// captured in `saved` only after the store accepted it, so an aborted or
/// failed write leaves the edit unsaved.
#[derive(Debug, Default)]
struct SaveProgress {
    edited: AtomicU64,
    saved: AtomicU64,
}

impl SaveProgress {
    fn mark_edited(&self) {
        self.edited.fetch_add(1, Ordering::SeqCst);
    }

    fn current(&self) -> u64 {
        self.edited.load(Ordering::SeqCst)
    }

    fn mark_saved(&self, generation: u64) {
        self.saved.fetch_max(generation, Ordering::SeqCst);
    }

    fn is_saved(&self, generation: u64) -> bool {
        self.saved.load(Ordering::SeqCst) >= generation
    }

    fn is_dirty(&self) -> bool {
        !self.is_saved(self.current())
    }

    /// Forget edits that will never be written
    fn discard(&self) {
        self.mark_saved(self.current());
    }
}

// ============================================================================
// Workbench
// ============================================================================

pub struct Workbench {
    config: EngineConfig,
    snippets: Arc<dyn SnippetStore>,
    datasets: Arc<dyn DatasetStore>,
    fetcher: Arc<dyn Fetcher>,
    surface: Option<Arc<dyn EditorSurface>>,
    renderer: Option<Arc<dyn RenderTarget>>,
    suppression: SuppressionFlag,
    active: Option<SnippetEditor>,
    progress: Arc<SaveProgress>,
    save_timer: Debouncer,
    render_timer: Debouncer,
}

impl Workbench {
    pub fn new(
        config: EngineConfig,
        snippets: Arc<dyn SnippetStore>,
        datasets: Arc<dyn DatasetStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            save_timer: Debouncer::new(config.auto_save_delay()),
            render_timer: Debouncer::new(config.auto_render_delay()),
            config,
            snippets,
            datasets,
            fetcher,
            surface: None,
            renderer: None,
            suppression: SuppressionFlag::new(),
            active: None,
            progress: Arc::new(SaveProgress::default()),
        }
    }

    pub fn with_surface(mut self, surface: Arc<dyn EditorSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn RenderTarget>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Flag the host checks before forwarding editor notifications
    pub fn suppression(&self) -> SuppressionFlag {
        self.suppression.clone()
    }

    /// Editor of the open snippet
    pub fn active(&self) -> Option<&SnippetEditor> {
        self.active.as_ref()
    }

    /// Whether an edit has not been written to the snippet store yet
    pub fn has_unsaved_changes(&self) -> bool {
        self.progress.is_dirty()
    }

    pub fn snippet_store(&self) -> &Arc<dyn SnippetStore> {
        &self.snippets
    }

    pub fn dataset_store(&self) -> &Arc<dyn DatasetStore> {
        &self.datasets
    }

    // ------------------------------------------------------------------------
    // Snippets
    // ------------------------------------------------------------------------

    pub async fn create_snippet(&self, name: &str, spec: VisualizationSpec) -> Result<Snippet> {
        let snippet = Snippet::new(name, spec);
        self.snippets.put(&snippet).await?;
        tracing::info!(snippet = snippet.id(), name = snippet.name(), "created snippet");
        Ok(snippet)
    }

    /// Make a stored snippet the active one
    ///
    /// A pending save of the outgoing snippet is written first.
    pub async fn open_snippet(&mut self, id: &str) -> Result<&SnippetEditor> {
        self.flush().await?;
        self.render_timer.cancel();

        let snippet = self
            .snippets
            .get(id)
            .await?
            .ok_or_else(|| ChartbookError::SnippetNotFound(id.to_string()))?;
        self.active = Some(SnippetEditor::new(snippet));
        self.show_visible()?;

        if self.config.auto_render {
            if let Err(e) = self.render_now().await {
                tracing::debug!(snippet = id, error = %e, "initial render failed");
            }
        }

        self.active
            .as_ref()
            .ok_or_else(|| ChartbookError::InternalError("active snippet vanished".into()))
    }

    pub async fn delete_snippet(&mut self, id: &str) -> Result<()> {
        if self.active_id() == Some(id) {
            self.save_timer.cancel();
            self.render_timer.cancel();
            self.progress.discard();
            self.active = None;
        }

        if !self.snippets.delete(id).await? {
            return Err(ChartbookError::SnippetNotFound(id.to_string()));
        }
        tracing::info!(snippet = id, "deleted snippet");
        Ok(())
    }

    /// Store a copy of a snippet, including its unsaved edits when it is active
    pub async fn duplicate_snippet(&self, id: &str, name: Option<&str>) -> Result<Snippet> {
        let source = match &self.active {
            Some(editor) if editor.snippet().id() == id => editor.snippet().clone(),
            _ => self
                .snippets
                .get(id)
                .await?
                .ok_or_else(|| ChartbookError::SnippetNotFound(id.to_string()))?,
        };

        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| naming::copy_name(source.name()));
        let copy = source.duplicate(name);
        self.snippets.put(&copy).await?;
        Ok(copy)
    }

    pub async fn rename_snippet(&mut self, id: &str, name: &str) -> Result<Snippet> {
        self.update_snippet(id, |snippet| snippet.rename(name)).await
    }

    pub async fn set_snippet_comment(
        &mut self,
        id: &str,
        comment: Option<&str>,
    ) -> Result<Snippet> {
        self.update_snippet(id, |snippet| {
            snippet.set_comment(comment.map(str::to_string))
        })
        .await
    }

    /// Apply a change outside the trees and persist it
    ///
    /// The open snippet is changed in memory so its unsaved edits go out with it.
    async fn update_snippet<F>(&mut self, id: &str, change: F) -> Result<Snippet>
    where
        F: FnOnce(&mut Snippet),
    {
        if self.active_id() == Some(id) {
            change(self.active_mut()?.snippet_mut());
            self.progress.mark_edited();
            self.persist_active().await?;
            return Ok(self.active_ref()?.snippet().clone());
        }

        let mut snippet = self
            .snippets
            .get(id)
            .await?
            .ok_or_else(|| ChartbookError::SnippetNotFound(id.to_string()))?;
        change(&mut snippet);
        self.snippets.put(&snippet).await?;
        Ok(snippet)
    }

    // ------------------------------------------------------------------------
    // Editing and versions
    // ------------------------------------------------------------------------

    /// Handle new editor text
    ///
    /// Returns `None` when the change was caused by the engine itself. Text
    /// that does not parse is reported without scheduling anything.
    pub async fn on_editor_change(&mut self, text: &str) -> Result<Option<EditOutcome>> {
        if self.suppression.is_suppressed() {
            tracing::trace!("ignoring programmatic editor change");
            return Ok(None);
        }

        let spec = VisualizationSpec::from_json(text)?;
        let outcome = self.active_mut()?.edit(spec)?;
        self.progress.mark_edited();
        self.schedule_save();
        self.schedule_render();
        Ok(Some(outcome))
    }

    /// Switch between the draft and published view of the active snippet
    pub async fn set_view_mode(&mut self, mode: ViewMode) -> Result<bool> {
        self.flush().await?;
        self.render_timer.cancel();
        let read_only = self.active_mut()?.set_view(mode);
        self.show_visible()?;
        self.schedule_render();
        Ok(read_only)
    }

    pub async fn publish(&mut self) -> Result<()> {
        self.active_mut()?.publish();
        self.progress.mark_edited();
        self.persist_active().await?;
        self.show_visible()?;
        self.schedule_render();
        Ok(())
    }

    pub async fn revert(&mut self, confirmed: bool) -> Result<RevertOutcome> {
        let outcome = self.active_mut()?.revert(confirmed);
        if outcome == RevertOutcome::Reverted {
            self.progress.mark_edited();
            self.persist_active().await?;
            self.show_visible()?;
            self.schedule_render();
        }
        Ok(outcome)
    }

    /// Write the active snippet now if it has unsaved edits
    ///
    /// A scheduled save is aborted first, even one whose write has already
    /// started; its edits count as unsaved until some write completes.
    pub async fn flush(&mut self) -> Result<()> {
        self.save_timer.cancel();
        if !self.progress.is_dirty() {
            return Ok(());
        }

        let Some(editor) = &self.active else {
            return Ok(());
        };
        let generation = self.progress.current();
        self.snippets.put(editor.snippet()).await?;
        self.progress.mark_saved(generation);
        tracing::debug!(snippet = editor.snippet().id(), "flushed pending save");
        Ok(())
    }

    /// Resolve the visible tree and hand it to the renderer
    pub async fn render_now(&mut self) -> Result<VisualizationSpec> {
        self.render_timer.cancel();
        let spec = self.active_ref()?.visible_spec().clone();
        render_resolved(&*self.datasets, self.renderer.as_deref(), &spec).await
    }

    /// Replace every reference in `spec` with data from the dataset store
    pub async fn resolve_snippet_for_render(
        &self,
        spec: &VisualizationSpec,
    ) -> Result<VisualizationSpec> {
        resolve_with_store(&*self.datasets, spec).await
    }

    // ------------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------------

    /// Create a dataset from pasted text; URLs are fetched instead
    pub async fn create_dataset_from_text(&self, name: &str, text: &str) -> Result<Dataset> {
        if detect::is_likely_url(text) {
            return self.create_dataset_from_url(name, text).await;
        }

        let dataset = Dataset::from_detection(name, detect::detect_format(text))?;
        self.datasets.put(&dataset).await?;
        tracing::info!(name, format = %dataset.format(), "created inline dataset");
        Ok(dataset)
    }

    /// Create a dataset pointing at a URL whose format is detected from its content
    ///
    /// Statistics stay unknown until [`refresh_dataset_metadata`](Self::refresh_dataset_metadata).
    pub async fn create_dataset_from_url(&self, name: &str, url: &str) -> Result<Dataset> {
        let detection = detect::detect_remote(url, &*self.fetcher).await?;
        let dataset = Dataset::from_detection(name, detection)?;
        self.datasets.put(&dataset).await?;
        tracing::info!(name, url = url.trim(), format = %dataset.format(), "created remote dataset");
        Ok(dataset)
    }

    /// Replace a dataset's content with new inline text
    ///
    /// With `format` set the text is parsed under that format, otherwise the
    /// format is detected.
    pub async fn update_dataset_payload(
        &self,
        id: &str,
        text: &str,
        format: Option<DatasetFormat>,
    ) -> Result<Dataset> {
        let mut dataset = self.dataset_by_id(id).await?;

        match format {
            Some(format) => {
                let payload = detect::parse_payload(text, format)?;
                dataset.set_content(DatasetSource::Inline, format, payload)?;
            }
            None => match detect::detect_format(text) {
                detect::DetectionResult::Detected {
                    format,
                    payload,
                    source,
                    ..
                } => dataset.set_content(source, format, payload)?,
                detect::DetectionResult::Undetected { .. } => {
                    return Err(ChartbookError::FormatUndetected(format!(
                        "new content for dataset '{}'",
                        dataset.name()
                    )));
                }
            },
        }

        self.datasets.put(&dataset).await?;
        Ok(dataset)
    }

    /// Recompute statistics; remote datasets are fetched to do so
    pub async fn refresh_dataset_metadata(&self, id: &str) -> Result<Dataset> {
        let mut dataset = self.dataset_by_id(id).await?;

        let metadata = match dataset.content() {
            crate::dataset::DatasetContent::Url(url) => {
                let body = self.fetcher.fetch(url).await?;
                detect::compute_content_stats(&body, dataset.format()).ok_or_else(|| {
                    ChartbookError::ParseError(format!(
                        "content of {} is not valid {}",
                        url,
                        dataset.format()
                    ))
                })?
            }
            _ => detect::compute_stats(dataset.payload(), dataset.format(), dataset.source()),
        };

        dataset.set_metadata(metadata);
        self.datasets.put(&dataset).await?;
        Ok(dataset)
    }

    pub async fn delete_dataset(&self, id: &str) -> Result<()> {
        let dataset = self.dataset_by_id(id).await?;
        self.datasets.delete(id).await?;

        let dangling = self
            .snippets
            .list()
            .await?
            .iter()
            .filter(|s| s.references(dataset.name()))
            .count();
        if dangling > 0 {
            tracing::warn!(
                name = dataset.name(),
                snippets = dangling,
                "deleted dataset is still referenced"
            );
        }
        Ok(())
    }

    /// Rename a dataset and rewrite every snippet referencing it
    ///
    /// The name is checked for conflicts before anything is written. Each
    /// snippet is persisted independently; failures are collected in the
    /// report rather than rolled back.
    pub async fn rename_dataset(&mut self, id: &str, new_name: &str) -> Result<RenameReport> {
        naming::validate_dataset_name(new_name)?;
        let mut dataset = self.dataset_by_id(id).await?;
        let old_name = dataset.name().to_string();
        if old_name == new_name {
            return Ok(RenameReport::default());
        }

        if let Some(other) = self.datasets.get_by_name(new_name).await? {
            if other.id() != id {
                return Err(ChartbookError::DatasetNameConflict(new_name.to_string()));
            }
        }

        dataset.rename(new_name)?;
        self.datasets.put(&dataset).await?;

        let mut report = RenameReport::default();
        let active_id = self.active_id().map(str::to_string);

        for mut snippet in self.snippets.list().await? {
            if active_id.as_deref() == Some(snippet.id()) {
                continue;
            }
            if !snippet.rewrite_dataset_name(&old_name, new_name) {
                continue;
            }
            report.targeted += 1;
            match self.snippets.put(&snippet).await {
                Ok(()) => report.succeeded += 1,
                Err(e) => report.failures.push(RenameFailure {
                    snippet_id: snippet.id().to_string(),
                    snippet_name: snippet.name().to_string(),
                    error: e.to_string(),
                }),
            }
        }

        // The active snippet is rewritten in memory, which also persists its edits
        let active_rewritten = match self.active.as_mut() {
            Some(editor) => editor.rewrite_dataset_name(&old_name, new_name),
            None => false,
        };
        if active_rewritten {
            report.targeted += 1;
            self.progress.mark_edited();
            match self.persist_active().await {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    let snippet = self.active_ref()?.snippet();
                    report.failures.push(RenameFailure {
                        snippet_id: snippet.id().to_string(),
                        snippet_name: snippet.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
            self.show_visible()?;
        }

        if report.is_complete() {
            tracing::info!(from = %old_name, to = new_name, snippets = report.targeted, "renamed dataset");
        } else {
            tracing::warn!(
                from = %old_name,
                to = new_name,
                failed = report.failures.len(),
                "dataset rename left some snippets unrewritten"
            );
        }
        Ok(report)
    }

    /// Move the active snippet's first inline data into a new dataset
    ///
    /// Without a name, the first free `dataset_<n>` is used. The inline data is
    /// replaced with a reference as a regular draft edit.
    pub async fn extract_to_dataset(&mut self, name: Option<&str>) -> Result<Dataset> {
        let editor = self.active_ref()?;
        if editor.is_read_only() {
            return Err(ChartbookError::ReadOnlyView(
                "cannot extract data from the published view while a draft is pending".into(),
            ));
        }

        let spec = editor.visible_spec().clone();
        let (payload, tag) = reference::extract_first_inline(&spec).ok_or_else(|| {
            ChartbookError::ParseError("snippet has no inline data to extract".into())
        })?;

        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let existing: Vec<String> = self
                    .datasets
                    .list()
                    .await?
                    .iter()
                    .map(|d| d.name().to_string())
                    .collect();
                naming::default_dataset_name(&existing)
            }
        };

        let dataset = match (payload, tag) {
            // Untagged text: classify it like a paste
            (serde_json::Value::String(text), None) => {
                Dataset::from_detection(&name, detect::detect_format(&text))?
            }
            (payload, tag) => Dataset::inline(&name, tag.unwrap_or(DatasetFormat::Json), payload)?,
        };
        self.datasets.put(&dataset).await?;

        let rewritten = reference::replace_inline_with_reference(&spec, &name);
        self.active_mut()?.edit(rewritten)?;
        self.progress.mark_edited();
        self.show_visible()?;
        self.schedule_save();
        self.schedule_render();

        tracing::info!(name = %name, format = %dataset.format(), "extracted inline data");
        Ok(dataset)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn active_id(&self) -> Option<&str> {
        self.active.as_ref().map(|e| e.snippet().id())
    }

    fn active_ref(&self) -> Result<&SnippetEditor> {
        self.active
            .as_ref()
            .ok_or_else(|| ChartbookError::InternalError("no snippet is open".into()))
    }

    fn active_mut(&mut self) -> Result<&mut SnippetEditor> {
        self.active
            .as_mut()
            .ok_or_else(|| ChartbookError::InternalError("no snippet is open".into()))
    }

    async fn dataset_by_id(&self, id: &str) -> Result<Dataset> {
        self.datasets
            .get(id)
            .await?
            .ok_or_else(|| ChartbookError::DatasetNotFound(id.to_string()))
    }

    /// Write the active snippet immediately, replacing any scheduled save
    async fn persist_active(&mut self) -> Result<()> {
        self.save_timer.cancel();
        let generation = self.progress.current();
        self.snippets.put(self.active_ref()?.snippet()).await?;
        self.progress.mark_saved(generation);
        Ok(())
    }

    /// Push the visible tree to the editing surface without triggering a change
    fn show_visible(&self) -> Result<()> {
        let (Some(surface), Some(editor)) = (&self.surface, &self.active) else {
            return Ok(());
        };
        let text = editor.visible_spec().to_json_pretty()?;
        let _guard = self.suppression.suppress();
        surface.set_content(&text, editor.is_read_only());
        Ok(())
    }

    fn schedule_save(&mut self) {
        if !self.config.auto_save {
            return;
        }
        let Some(editor) = &self.active else {
            return;
        };

        // The snapshot pins the write to this snippet even if another is opened
        let snapshot = editor.snippet().clone();
        let generation = self.progress.current();
        let store = Arc::clone(&self.snippets);
        let progress = Arc::clone(&self.progress);
        self.save_timer.schedule(async move {
            if progress.is_saved(generation) {
                return;
            }
            match store.put(&snapshot).await {
                Ok(()) => {
                    progress.mark_saved(generation);
                    tracing::debug!(snippet = snapshot.id(), "auto-saved draft");
                }
                Err(e) => tracing::warn!(snippet = snapshot.id(), error = %e, "auto-save failed"),
            }
        });
    }

    fn schedule_render(&mut self) {
        if !self.config.auto_render {
            return;
        }
        let (Some(renderer), Some(editor)) = (&self.renderer, &self.active) else {
            return;
        };

        let spec = editor.visible_spec().clone();
        let datasets = Arc::clone(&self.datasets);
        let renderer = Arc::clone(renderer);
        self.render_timer.schedule(async move {
            let _ = render_resolved(&*datasets, Some(&*renderer), &spec).await;
        });
    }
}

/// Look up every dataset `spec` references and resolve it
pub async fn resolve_with_store(
    store: &dyn DatasetStore,
    spec: &VisualizationSpec,
) -> Result<VisualizationSpec> {
    let mut found = HashMap::new();
    for name in reference::extract_references(spec) {
        if let Some(dataset) = store.get_by_name(&name).await? {
            found.insert(name, dataset);
        }
    }
    reference::resolve_for_render(spec, |name| found.get(name).cloned())
}

async fn render_resolved(
    store: &dyn DatasetStore,
    renderer: Option<&dyn RenderTarget>,
    spec: &VisualizationSpec,
) -> Result<VisualizationSpec> {
    let resolved = resolve_with_store(store, spec).await;
    if let Some(renderer) = renderer {
        match &resolved {
            Ok(spec) => renderer.render(spec),
            Err(e) => renderer.render_error(e),
        }
    }
    if let Err(e) = &resolved {
        tracing::debug!(error = %e, "render aborted");
    }
    resolved
}
