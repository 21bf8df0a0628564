/*!
# chartbook - Chart Snippets with Shared Datasets

Chart definitions ("snippets") are Vega-Lite style specification trees that may
reference named, separately stored datasets. chartbook keeps those references
consistent while a snippet is iterated on through a draft/published workflow.

## Example

```rust,ignore
use chartbook::{reference, detect, VisualizationSpec};

let spec: VisualizationSpec = serde_json::from_str(r#"{
    "layer": [
        {"data": {"name": "sales"}, "mark": "line"},
        {"data": {"values": [{"a": 1}]}, "mark": "rule"}
    ]
}"#)?;

let refs = reference::extract_references(&spec);
assert!(refs.contains("sales"));

let detection = detect::detect_format("a,b\n1,2\n3,4");
assert_eq!(detection.format(), Some(chartbook::DatasetFormat::Csv));
```

## Architecture

- **Spec tree** → explicit composition slots (`layer`, `concat`, `hconcat`,
  `vconcat`, `spec`) walked by a single traversal primitive
- **References** → extraction, substitution and render-time resolution of
  `{"name": ...}` data descriptors
- **Detection** → format and per-column type inference for pasted or fetched text
- **Lifecycle** → draft/published state machine with debounced auto-save and
  auto-render

## Core Components

- [`spec`] - Specification tree and walker
- [`reference`] - Dataset reference resolver
- [`detect`] - Format and column type detection
- [`lifecycle`] - Draft/published state machine, debouncing, suppression guard
- [`store`] - Snippet and dataset persistence traits with in-memory implementations
- [`validate`] - Reference and inline-data checks without rendering
- [`workbench`] - Coordinator wiring the engine to stores, fetcher, editor and renderer
*/

pub mod config;
pub mod dataset;
pub mod detect;
pub mod fetch;
pub mod lifecycle;
pub mod naming;
pub mod reference;
pub mod snippet;
pub mod spec;
pub mod store;
pub mod validate;
pub mod workbench;

// Re-export key types for convenience
pub use config::EngineConfig;
pub use dataset::{ColumnType, ColumnTypeInfo, Dataset, DatasetFormat, DatasetMetadata, DatasetSource};
pub use detect::{Confidence, DetectionResult};
pub use fetch::{FetchError, Fetcher};
pub use lifecycle::{EditOutcome, RevertOutcome, SnippetEditor, VersionState, ViewMode};
pub use snippet::Snippet;
pub use spec::{Data, DataFormat, Slot, VisualizationSpec};
pub use workbench::{EditorSurface, RenameReport, RenderTarget, Workbench};

/// Main library error type
#[derive(thiserror::Error, Debug)]
pub enum ChartbookError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Could not detect data format: {0}")]
    FormatUndetected(String),

    #[error("Dataset not found: '{0}'")]
    DatasetNotFound(String),

    #[error("A dataset named '{0}' already exists")]
    DatasetNameConflict(String),

    #[error("Storage quota exceeded: {0}")]
    PersistenceQuotaExceeded(String),

    #[error("Network fetch failed: {0}")]
    NetworkFetchError(#[from] FetchError),

    #[error("Snippet not found: '{0}'")]
    SnippetNotFound(String),

    #[error("Published view is read-only: {0}")]
    ReadOnlyView(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, ChartbookError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn parse(value: serde_json::Value) -> VisualizationSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_end_to_end_paste_extract_resolve() {
        // Paste CSV → dataset → snippet referencing it → render-ready tree
        let text = "city,population\nOslo,709000\nBergen,291000";
        let detection = detect::detect_format(text);
        assert_eq!(detection.format(), Some(DatasetFormat::Csv));

        let dataset = Dataset::from_detection("cities", detection).unwrap();
        let metadata = dataset.metadata();
        assert_eq!(metadata.row_count, Some(2));
        assert_eq!(
            metadata.columns.as_deref(),
            Some(&["city".to_string(), "population".to_string()][..])
        );

        let spec = parse(json!({
            "vconcat": [
                {"data": {"name": "cities"}, "mark": "bar"},
                {"spec": {"data": {"name": "cities"}, "mark": "point"}}
            ]
        }));

        let mut lookup = HashMap::new();
        lookup.insert(dataset.name().to_string(), dataset);

        let resolved = reference::resolve_for_render(&spec, |name| lookup.get(name).cloned()).unwrap();
        assert!(reference::extract_references(&resolved).is_empty());

        let value = serde_json::to_value(&resolved).unwrap();
        assert_eq!(value["vconcat"][0]["data"]["format"]["type"], "csv");
        assert_eq!(
            value["vconcat"][1]["spec"]["data"]["values"],
            json!("city,population\nOslo,709000\nBergen,291000")
        );
        // Non-data keys survive the rewrite
        assert_eq!(value["vconcat"][1]["spec"]["mark"], "point");
    }

    #[test]
    fn test_end_to_end_missing_reference_aborts() {
        let spec = parse(json!({
            "layer": [
                {"data": {"name": "present"}},
                {"data": {"name": "absent"}}
            ]
        }));
        let present =
            Dataset::inline("present", DatasetFormat::Json, json!([{"x": 1}])).unwrap();

        let err = reference::resolve_for_render(&spec, |name| {
            (name == "present").then(|| present.clone())
        })
        .unwrap_err();

        assert!(matches!(err, ChartbookError::DatasetNotFound(ref name) if name == "absent"));
    }
}
