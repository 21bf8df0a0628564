//! Format and column type detection
//!
//! Classifies pasted or fetched text as JSON, TopoJSON, CSV or TSV with a
//! confidence level, and infers the semantic type of each column.
//!
//! # Detection order
//!
//! 1. Structured parse: topology object → `topojson/high`, array →
//!    `json/high`, any other JSON object → `json/medium`
//! 2. Delimited text (at least two non-blank lines): consistent tab counts →
//!    `tsv/high`, then comma counts varying by at most one → `csv/medium`
//! 3. Anything else is undetected (`low`)
//!
//! Tabs are always checked before commas so a tab-separated file with commas
//! inside its cells is not mistaken for CSV.

pub mod column;
pub mod stats;

pub use column::infer_column_type;
pub use stats::{compute_content_stats, compute_stats};

use crate::dataset::{DatasetFormat, DatasetSource};
use crate::fetch::Fetcher;
use crate::{ChartbookError, Result};
use serde::Serialize;
use serde_json::Value;

/// Number of leading lines compared by the delimiter heuristics
const DELIMITER_SAMPLE_LINES: usize = 5;

/// How certain the detector is about a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        })
    }
}

/// Outcome of format detection
///
/// A payload exists only when a format was determined.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DetectionResult {
    Detected {
        format: DatasetFormat,
        confidence: Confidence,
        /// Parsed value for JSON/TopoJSON, raw text for CSV/TSV, the URL for remote data
        payload: Value,
        source: DatasetSource,
    },
    Undetected {
        source: DatasetSource,
    },
}

impl DetectionResult {
    fn detected(format: DatasetFormat, confidence: Confidence, payload: Value) -> Self {
        DetectionResult::Detected {
            format,
            confidence,
            payload,
            source: DatasetSource::Inline,
        }
    }

    /// Detected format, if any
    pub fn format(&self) -> Option<DatasetFormat> {
        match self {
            DetectionResult::Detected { format, .. } => Some(*format),
            DetectionResult::Undetected { .. } => None,
        }
    }

    /// Confidence of the classification (`Low` when undetected)
    pub fn confidence(&self) -> Confidence {
        match self {
            DetectionResult::Detected { confidence, .. } => *confidence,
            DetectionResult::Undetected { .. } => Confidence::Low,
        }
    }

    pub fn source(&self) -> DatasetSource {
        match self {
            DetectionResult::Detected { source, .. } | DetectionResult::Undetected { source } => {
                *source
            }
        }
    }

    /// Parsed payload, if a format was detected
    pub fn payload(&self) -> Option<&Value> {
        match self {
            DetectionResult::Detected { payload, .. } => Some(payload),
            DetectionResult::Undetected { .. } => None,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, DetectionResult::Detected { .. })
    }
}

// =============================================================================
// Content detection
// =============================================================================

/// Classify inline text
pub fn detect_format(text: &str) -> DetectionResult {
    if let Some(result) = detect_structured(text) {
        tracing::debug!(format = ?result.format(), confidence = %result.confidence(), "structured content detected");
        return result;
    }

    let result = detect_delimited(text);
    tracing::debug!(format = ?result.format(), confidence = %result.confidence(), "delimited detection finished");
    result
}

fn detect_structured(text: &str) -> Option<DetectionResult> {
    let parsed: Value = serde_json::from_str(text.trim()).ok()?;

    if is_topology(&parsed) {
        return Some(DetectionResult::detected(
            DatasetFormat::TopoJson,
            Confidence::High,
            parsed,
        ));
    }

    match parsed {
        Value::Array(_) => Some(DetectionResult::detected(
            DatasetFormat::Json,
            Confidence::High,
            parsed,
        )),
        Value::Object(_) => Some(DetectionResult::detected(
            DatasetFormat::Json,
            Confidence::Medium,
            parsed,
        )),
        // Bare scalars are not datasets; let the delimiter heuristics decide
        _ => None,
    }
}

/// Whether a parsed value looks like a TopoJSON topology
pub fn is_topology(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("Topology")
}

fn detect_delimited(text: &str) -> DetectionResult {
    let lines: Vec<&str> = non_blank_lines(text).collect();
    if lines.len() < 2 {
        return DetectionResult::Undetected {
            source: DatasetSource::Inline,
        };
    }

    let sample = &lines[..lines.len().min(DELIMITER_SAMPLE_LINES)];
    let count = |line: &str, ch: char| line.matches(ch).count();

    let first_tabs = count(sample[0], '\t');
    let first_commas = count(sample[0], ',');

    if first_tabs > 0
        && first_tabs > first_commas
        && sample.iter().all(|&line| count(line, '\t') == first_tabs)
    {
        return DetectionResult::detected(
            DatasetFormat::Tsv,
            Confidence::High,
            Value::String(text.to_string()),
        );
    }

    if first_commas > 0 {
        let comma_counts: Vec<usize> = sample.iter().map(|&line| count(line, ',')).collect();
        let min = comma_counts.iter().copied().min().unwrap_or(0);
        let max = comma_counts.iter().copied().max().unwrap_or(0);
        if max - min <= 1 {
            return DetectionResult::detected(
                DatasetFormat::Csv,
                Confidence::Medium,
                Value::String(text.to_string()),
            );
        }
    }

    DetectionResult::Undetected {
        source: DatasetSource::Inline,
    }
}

/// Non-blank lines with trailing carriage returns removed
pub(crate) fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
}

// =============================================================================
// URLs
// =============================================================================

/// Whether text is an absolute http(s) URL
pub fn is_likely_url(text: &str) -> bool {
    match url::Url::parse(text.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Guess a format from the file extension of a URL
pub fn detect_format_from_extension(url: &str) -> Option<DatasetFormat> {
    let path = match url::Url::parse(url.trim()) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative paths: drop query and fragment by hand
        Err(_) => url
            .split(&['?', '#'][..])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let path = path.to_ascii_lowercase();

    if path.ends_with(".topojson") {
        Some(DatasetFormat::TopoJson)
    } else if path.ends_with(".json") {
        Some(DatasetFormat::Json)
    } else if path.ends_with(".csv") {
        Some(DatasetFormat::Csv)
    } else if path.ends_with(".tsv") || path.ends_with(".tab") {
        Some(DatasetFormat::Tsv)
    } else {
        None
    }
}

/// Fetch a URL and classify its content
///
/// See [`classify_remote`] for how the format is chosen.
pub async fn detect_remote(url: &str, fetcher: &dyn Fetcher) -> Result<DetectionResult> {
    let url = url.trim();
    if !is_likely_url(url) {
        return Err(ChartbookError::ParseError(format!(
            "'{}' is not an http(s) URL",
            url
        )));
    }

    let body = fetcher.fetch(url).await?;
    Ok(classify_remote(url, &body))
}

/// Classify content already fetched from `url`
///
/// Content detection wins; the file extension is consulted only when the
/// content is inconclusive, and then reported with `Low` confidence. The
/// payload of the result is the URL itself.
pub fn classify_remote(url: &str, body: &str) -> DetectionResult {
    let url = url.trim();
    let by_content = detect_format(body);

    let result = match (by_content.format(), detect_format_from_extension(url)) {
        (Some(format), _) => DetectionResult::Detected {
            format,
            confidence: by_content.confidence(),
            payload: Value::String(url.to_string()),
            source: DatasetSource::Url,
        },
        (None, Some(format)) => DetectionResult::Detected {
            format,
            confidence: Confidence::Low,
            payload: Value::String(url.to_string()),
            source: DatasetSource::Url,
        },
        (None, None) => DetectionResult::Undetected {
            source: DatasetSource::Url,
        },
    };

    tracing::debug!(url, format = ?result.format(), "remote detection finished");
    result
}

// =============================================================================
// Explicit formats
// =============================================================================

/// Parse text under a format chosen by the user
///
/// JSON and TopoJSON must parse; delimited text must contain a header line.
pub fn parse_payload(text: &str, format: DatasetFormat) -> Result<Value> {
    match format {
        DatasetFormat::Json => {
            let value: Value = serde_json::from_str(text.trim())
                .map_err(|e| ChartbookError::ParseError(format!("Invalid JSON: {}", e)))?;
            if value.is_array() || value.is_object() {
                Ok(value)
            } else {
                Err(ChartbookError::ParseError(
                    "JSON data must be an array or an object".to_string(),
                ))
            }
        }
        DatasetFormat::TopoJson => {
            let value: Value = serde_json::from_str(text.trim())
                .map_err(|e| ChartbookError::ParseError(format!("Invalid TopoJSON: {}", e)))?;
            if is_topology(&value) {
                Ok(value)
            } else {
                Err(ChartbookError::ParseError(
                    "TopoJSON data must be an object with \"type\": \"Topology\"".to_string(),
                ))
            }
        }
        DatasetFormat::Csv | DatasetFormat::Tsv => {
            if non_blank_lines(text).next().is_none() {
                return Err(ChartbookError::ParseError(format!(
                    "{} data needs at least a header line",
                    format.as_str().to_uppercase()
                )));
            }
            Ok(Value::String(text.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use async_trait::async_trait;
    use serde_json::json;

    #[test]
    fn test_detect_topology() {
        let result = detect_format(r#"{"type":"Topology","objects":{},"arcs":[]}"#);
        assert_eq!(result.format(), Some(DatasetFormat::TopoJson));
        assert_eq!(result.confidence(), Confidence::High);
    }

    #[test]
    fn test_detect_json_array_and_object() {
        let array = detect_format(r#"[{"a": 1}, {"a": 2}]"#);
        assert_eq!(array.format(), Some(DatasetFormat::Json));
        assert_eq!(array.confidence(), Confidence::High);
        assert_eq!(array.payload(), Some(&json!([{"a": 1}, {"a": 2}])));

        let object = detect_format(r#"{"a": [1, 2, 3]}"#);
        assert_eq!(object.format(), Some(DatasetFormat::Json));
        assert_eq!(object.confidence(), Confidence::Medium);
    }

    #[test]
    fn test_detect_csv() {
        let result = detect_format("a,b,c\n1,2,3\n4,5,6");
        assert_eq!(result.format(), Some(DatasetFormat::Csv));
        assert!(result.confidence() >= Confidence::Medium);
        assert_eq!(result.payload(), Some(&json!("a,b,c\n1,2,3\n4,5,6")));
    }

    #[test]
    fn test_detect_csv_tolerates_one_comma_difference() {
        let result = detect_format("a,b,c\n1,2\n4,5,6");
        assert_eq!(result.format(), Some(DatasetFormat::Csv));
    }

    #[test]
    fn test_detect_csv_rejects_ragged_lines() {
        let result = detect_format("a,b,c,d\n1\n4,5,6,7");
        assert!(!result.is_detected());
        assert_eq!(result.confidence(), Confidence::Low);
        assert_eq!(result.payload(), None);
    }

    #[test]
    fn test_detect_tsv_before_csv() {
        // Commas inside cells, but tabs dominate the header
        let text = "name\tnote\tvalue\nx\ta,b\t1\ny\tc\t2";
        let result = detect_format(text);
        assert_eq!(result.format(), Some(DatasetFormat::Tsv));
        assert_eq!(result.confidence(), Confidence::High);
    }

    #[test]
    fn test_detect_tsv_requires_constant_tab_count() {
        // Inconsistent tabs and no commas: nothing matches
        let result = detect_format("a\tb\tc\n1\t2\n3\t4\t5");
        assert!(!result.is_detected());
    }

    #[test]
    fn test_detect_ignores_blank_lines() {
        let result = detect_format("\n\na,b\n\n1,2\n\n");
        assert_eq!(result.format(), Some(DatasetFormat::Csv));
    }

    #[test]
    fn test_detect_single_line_is_undetected() {
        assert!(!detect_format("a,b,c").is_detected());
        assert!(!detect_format("").is_detected());
        assert!(!detect_format("just some words\nmore words").is_detected());
    }

    #[test]
    fn test_detect_scalar_json_is_not_structured() {
        assert!(!detect_format("42").is_detected());
    }

    #[test]
    fn test_is_likely_url() {
        assert!(is_likely_url("https://example.com/data.csv"));
        assert!(is_likely_url("  http://example.com  "));
        assert!(!is_likely_url("ftp://example.com/data.csv"));
        assert!(!is_likely_url("data.csv"));
        assert!(!is_likely_url("a,b\n1,2"));
    }

    #[test]
    fn test_detect_format_from_extension() {
        assert_eq!(
            detect_format_from_extension("https://x.org/a.json?v=2"),
            Some(DatasetFormat::Json)
        );
        assert_eq!(
            detect_format_from_extension("https://x.org/world.TOPOJSON"),
            Some(DatasetFormat::TopoJson)
        );
        assert_eq!(detect_format_from_extension("data/a.tab"), Some(DatasetFormat::Tsv));
        assert_eq!(detect_format_from_extension("data/a.csv#top"), Some(DatasetFormat::Csv));
        assert_eq!(detect_format_from_extension("https://x.org/a"), None);
    }

    #[test]
    fn test_parse_payload() {
        assert!(matches!(
            parse_payload("{not json", DatasetFormat::Json),
            Err(ChartbookError::ParseError(_))
        ));
        assert!(matches!(
            parse_payload(r#"{"type": "FeatureCollection"}"#, DatasetFormat::TopoJson),
            Err(ChartbookError::ParseError(_))
        ));
        assert!(matches!(
            parse_payload("  \n ", DatasetFormat::Csv),
            Err(ChartbookError::ParseError(_))
        ));
        assert_eq!(
            parse_payload("[1]", DatasetFormat::Json).unwrap(),
            json!([1])
        );
    }

    struct StaticFetcher(std::result::Result<String, FetchError>);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> std::result::Result<String, FetchError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn test_detect_remote_uses_content() {
        let fetcher = StaticFetcher(Ok("a\tb\n1\t2".to_string()));
        let result = detect_remote("https://x.org/data.csv", &fetcher).await.unwrap();

        // Content says TSV even though the extension says CSV
        assert_eq!(result.format(), Some(DatasetFormat::Tsv));
        assert_eq!(result.source(), DatasetSource::Url);
        assert_eq!(result.payload(), Some(&json!("https://x.org/data.csv")));
    }

    #[tokio::test]
    async fn test_detect_remote_falls_back_to_extension() {
        let fetcher = StaticFetcher(Ok("garbage".to_string()));
        let result = detect_remote("https://x.org/data.csv", &fetcher).await.unwrap();

        assert_eq!(result.format(), Some(DatasetFormat::Csv));
        assert_eq!(result.confidence(), Confidence::Low);
    }

    #[test]
    fn test_classify_remote_from_fetched_body() {
        let url = " https://x.org/cities ";
        let result = classify_remote(url, "city,pop\nOslo,709000\nBergen,291000");
        assert_eq!(result.format(), Some(DatasetFormat::Csv));
        assert_eq!(result.payload(), Some(&json!("https://x.org/cities")));

        let undetected = classify_remote("https://x.org/cities", "garbage");
        assert_eq!(undetected.format(), None);
        assert_eq!(undetected.source(), DatasetSource::Url);
    }

    #[tokio::test]
    async fn test_detect_remote_propagates_fetch_errors() {
        let fetcher = StaticFetcher(Err(FetchError::Status {
            url: "https://x.org/a.csv".into(),
            status: 404,
        }));
        let err = detect_remote("https://x.org/a.csv", &fetcher).await.unwrap_err();
        assert!(matches!(err, ChartbookError::NetworkFetchError(_)));
    }
}
