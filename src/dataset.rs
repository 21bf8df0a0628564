//! Stored datasets referenced by snippets.
//!
//! A dataset is addressed by a unique human name from inside chart
//! specifications (`{"data": {"name": "..."}}`). Its payload is kept exactly as
//! the user supplied it:
//!
//! | source  | format            | payload                    |
//! |---------|-------------------|----------------------------|
//! | inline  | json, topojson    | array or object            |
//! | inline  | csv, tsv          | raw delimited text         |
//! | url     | any               | the URL string             |
//!
//! Metadata (row/column counts, column types, byte size) is derived from the
//! payload and recomputed whenever payload, format or source change.

use crate::detect::{self, DetectionResult};
use crate::{naming, ChartbookError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Enumerations
// =============================================================================

/// Where the dataset content lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSource {
    Inline,
    Url,
}

/// Content format of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    Json,
    Csv,
    Tsv,
    #[serde(rename = "topojson")]
    TopoJson,
}

impl DatasetFormat {
    /// Vega-Lite `format.type` value
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetFormat::Json => "json",
            DatasetFormat::Csv => "csv",
            DatasetFormat::Tsv => "tsv",
            DatasetFormat::TopoJson => "topojson",
        }
    }

    /// Parse a Vega-Lite `format.type` value
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Some(DatasetFormat::Json),
            "csv" => Some(DatasetFormat::Csv),
            "tsv" => Some(DatasetFormat::Tsv),
            "topojson" => Some(DatasetFormat::TopoJson),
            _ => None,
        }
    }

    /// Field separator for delimited formats
    pub fn delimiter(&self) -> Option<char> {
        match self {
            DatasetFormat::Csv => Some(','),
            DatasetFormat::Tsv => Some('\t'),
            DatasetFormat::Json | DatasetFormat::TopoJson => None,
        }
    }

    /// Whether the inline payload is raw delimited text
    pub fn is_delimited(&self) -> bool {
        self.delimiter().is_some()
    }
}

impl std::fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Date,
    Boolean,
    Text,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
        };
        f.write_str(name)
    }
}

/// Inferred type of one named column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTypeInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Derived dataset statistics
///
/// Every field is `None` for url-sourced datasets until a metadata refresh
/// fetched the content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    pub row_count: Option<usize>,
    pub column_count: Option<usize>,
    pub columns: Option<Vec<String>>,
    pub column_types: Option<Vec<ColumnTypeInfo>>,
    pub byte_size: Option<usize>,
}

impl DatasetMetadata {
    /// Metadata of a dataset whose content has not been seen
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Whether any statistic is known
    pub fn is_known(&self) -> bool {
        self.row_count.is_some()
    }
}

/// Borrowed view of a dataset payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DatasetContent<'a> {
    /// Parsed records or topology
    Values(&'a Value),
    /// Raw delimited text
    Text(&'a str),
    /// Remote location
    Url(&'a str),
}

// =============================================================================
// Dataset
// =============================================================================

/// A named, separately stored dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    id: String,
    name: String,
    source: DatasetSource,
    format: DatasetFormat,
    payload: Value,
    metadata: DatasetMetadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Dataset {
    /// Create a dataset, validating the payload against source and format
    pub fn new(
        name: impl Into<String>,
        source: DatasetSource,
        format: DatasetFormat,
        payload: Value,
    ) -> Result<Self> {
        let name = name.into();
        naming::validate_dataset_name(&name)?;
        check_payload_shape(source, format, &payload)?;

        let metadata = detect::compute_stats(&payload, format, source);
        let now = Utc::now();
        Ok(Self {
            id: naming::new_id(),
            name,
            source,
            format,
            payload,
            metadata,
            created_at: now,
            updated_at: now,
        })
    }

    /// Inline dataset from parsed records or delimited text
    pub fn inline(name: impl Into<String>, format: DatasetFormat, payload: Value) -> Result<Self> {
        Self::new(name, DatasetSource::Inline, format, payload)
    }

    /// Dataset pointing at a remote URL
    pub fn remote(name: impl Into<String>, format: DatasetFormat, url: impl Into<String>) -> Result<Self> {
        Self::new(name, DatasetSource::Url, format, Value::String(url.into()))
    }

    /// Create a dataset from a successful detection
    ///
    /// Returns `FormatUndetected` when the detector could not classify the content.
    pub fn from_detection(name: impl Into<String>, detection: DetectionResult) -> Result<Self> {
        match detection {
            DetectionResult::Detected {
                format,
                payload,
                source,
                ..
            } => Self::new(name, source, format, payload),
            DetectionResult::Undetected { .. } => Err(ChartbookError::FormatUndetected(
                "content is neither JSON, TopoJSON, CSV nor TSV".to_string(),
            )),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> DatasetSource {
        self.source
    }

    pub fn format(&self) -> DatasetFormat {
        self.format
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Typed view of the payload
    pub fn content(&self) -> DatasetContent<'_> {
        match (self.source, &self.payload) {
            (DatasetSource::Url, Value::String(url)) => DatasetContent::Url(url),
            (DatasetSource::Inline, Value::String(text)) if self.format.is_delimited() => {
                DatasetContent::Text(text)
            }
            (_, value) => DatasetContent::Values(value),
        }
    }

    /// Rename; callers are responsible for checking uniqueness first
    pub fn rename(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        naming::validate_dataset_name(&name)?;
        self.name = name;
        self.touch();
        Ok(())
    }

    /// Replace payload, format and source, recomputing metadata
    pub fn set_content(
        &mut self,
        source: DatasetSource,
        format: DatasetFormat,
        payload: Value,
    ) -> Result<()> {
        check_payload_shape(source, format, &payload)?;
        self.metadata = detect::compute_stats(&payload, format, source);
        self.source = source;
        self.format = format;
        self.payload = payload;
        self.touch();
        Ok(())
    }

    /// Backfill metadata of a url-sourced dataset from fetched content
    pub fn set_metadata(&mut self, metadata: DatasetMetadata) {
        self.metadata = metadata;
        self.touch();
    }

    /// Vega-Lite data descriptor this dataset resolves to
    pub fn to_data(&self) -> crate::spec::Data {
        use crate::spec::Data;

        match (self.source, self.format) {
            (DatasetSource::Url, format) => Data::url(
                self.payload.as_str().unwrap_or_default(),
                Some(format.as_str()),
            ),
            (DatasetSource::Inline, DatasetFormat::Json) => Data::inline(self.payload.clone(), None),
            (DatasetSource::Inline, format) => {
                Data::inline(self.payload.clone(), Some(format.as_str()))
            }
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Check that a payload has the shape implied by source and format
fn check_payload_shape(source: DatasetSource, format: DatasetFormat, payload: &Value) -> Result<()> {
    let ok = match (source, format) {
        (DatasetSource::Url, _) => payload.as_str().is_some_and(detect::is_likely_url),
        (DatasetSource::Inline, DatasetFormat::Csv | DatasetFormat::Tsv) => payload.is_string(),
        (DatasetSource::Inline, DatasetFormat::Json) => payload.is_array() || payload.is_object(),
        (DatasetSource::Inline, DatasetFormat::TopoJson) => payload.is_object(),
    };

    if ok {
        Ok(())
    } else {
        Err(ChartbookError::ParseError(format!(
            "payload does not match a {} dataset with {} source",
            format,
            match source {
                DatasetSource::Inline => "inline",
                DatasetSource::Url => "url",
            }
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_json_metadata() {
        let ds = Dataset::inline(
            "cars",
            DatasetFormat::Json,
            json!([{"make": "Volvo", "hp": 120}, {"make": "Saab", "hp": 150}]),
        )
        .unwrap();

        let meta = ds.metadata();
        assert_eq!(meta.row_count, Some(2));
        assert_eq!(meta.column_count, Some(2));
        assert!(meta.is_known());
        assert!(matches!(ds.content(), DatasetContent::Values(_)));
    }

    #[test]
    fn test_remote_metadata_unknown() {
        let ds = Dataset::remote("cars", DatasetFormat::Csv, "https://example.com/cars.csv").unwrap();
        assert_eq!(ds.metadata(), &DatasetMetadata::unknown());
        assert_eq!(ds.content(), DatasetContent::Url("https://example.com/cars.csv"));
    }

    #[test]
    fn test_payload_shape_is_checked() {
        assert!(matches!(
            Dataset::inline("a", DatasetFormat::Csv, json!([1, 2])),
            Err(ChartbookError::ParseError(_))
        ));
        assert!(matches!(
            Dataset::remote("a", DatasetFormat::Json, "not a url"),
            Err(ChartbookError::ParseError(_))
        ));
        assert!(matches!(
            Dataset::inline("a", DatasetFormat::TopoJson, json!([])),
            Err(ChartbookError::ParseError(_))
        ));
    }

    #[test]
    fn test_set_content_recomputes_metadata() {
        let mut ds = Dataset::inline("a", DatasetFormat::Csv, json!("x\n1\n2")).unwrap();
        assert_eq!(ds.metadata().row_count, Some(2));

        ds.set_content(DatasetSource::Inline, DatasetFormat::Json, json!([{"x": 1}]))
            .unwrap();
        assert_eq!(ds.metadata().row_count, Some(1));
        assert_eq!(ds.format(), DatasetFormat::Json);
    }

    #[test]
    fn test_to_data_shapes() {
        let json_ds = Dataset::inline("a", DatasetFormat::Json, json!([{"x": 1}])).unwrap();
        assert_eq!(
            serde_json::to_value(json_ds.to_data()).unwrap(),
            json!({"values": [{"x": 1}]})
        );

        let tsv = Dataset::inline("b", DatasetFormat::Tsv, json!("x\ty\n1\t2")).unwrap();
        assert_eq!(
            serde_json::to_value(tsv.to_data()).unwrap(),
            json!({"values": "x\ty\n1\t2", "format": {"type": "tsv"}})
        );

        let url = Dataset::remote("c", DatasetFormat::Csv, "https://example.com/c.csv").unwrap();
        assert_eq!(
            serde_json::to_value(url.to_data()).unwrap(),
            json!({"url": "https://example.com/c.csv", "format": {"type": "csv"}})
        );
    }

    #[test]
    fn test_serialized_field_names() {
        let ds = Dataset::inline("a", DatasetFormat::TopoJson, json!({"type": "Topology"})).unwrap();
        let value = serde_json::to_value(&ds).unwrap();
        assert_eq!(value["format"], "topojson");
        assert_eq!(value["source"], "inline");
        assert!(value.get("createdAt").is_some());
        assert!(value["metadata"].get("rowCount").is_some());
    }

    #[test]
    fn test_format_type_names() {
        assert_eq!(DatasetFormat::from_type_name("TSV"), Some(DatasetFormat::Tsv));
        assert_eq!(DatasetFormat::from_type_name("dsv"), None);
        assert_eq!(DatasetFormat::TopoJson.to_string(), "topojson");
    }
}
