//! Dataset statistics derived from a payload.

use super::column::infer_column_type;
use super::non_blank_lines;
use crate::dataset::{ColumnTypeInfo, DatasetFormat, DatasetMetadata, DatasetSource};
use serde_json::Value;

/// Compute row/column statistics for a dataset payload
///
/// Remote datasets yield unknown (all `None`) statistics since their content
/// is not part of the payload. Use [`compute_content_stats`] on fetched text
/// to backfill them.
pub fn compute_stats(payload: &Value, format: DatasetFormat, source: DatasetSource) -> DatasetMetadata {
    if source == DatasetSource::Url {
        return DatasetMetadata::unknown();
    }

    match (format, payload) {
        (DatasetFormat::Csv | DatasetFormat::Tsv, Value::String(text)) => delimited_stats(text, format),
        (_, Value::Array(rows)) => record_stats(rows, serialized_size(payload)),
        // A single object (topology or plain JSON object) is one record
        (_, Value::Object(_)) => {
            record_stats(std::slice::from_ref(payload), serialized_size(payload))
        }
        _ => DatasetMetadata::unknown(),
    }
}

/// Statistics of fetched content in a given format
///
/// Returns `None` when the content does not parse under `format`.
pub fn compute_content_stats(text: &str, format: DatasetFormat) -> Option<DatasetMetadata> {
    let payload = super::parse_payload(text, format).ok()?;
    let mut stats = compute_stats(&payload, format, DatasetSource::Inline);
    stats.byte_size = Some(text.len());
    Some(stats)
}

fn serialized_size(payload: &Value) -> usize {
    serde_json::to_string(payload).map(|s| s.len()).unwrap_or(0)
}

fn record_stats(rows: &[Value], byte_size: usize) -> DatasetMetadata {
    let columns: Vec<String> = match rows.first() {
        Some(Value::Object(first)) => first.keys().cloned().collect(),
        _ => Vec::new(),
    };

    let column_types = columns
        .iter()
        .map(|column| ColumnTypeInfo {
            name: column.clone(),
            column_type: infer_column_type(
                rows.iter()
                    .map(|row| row.as_object().and_then(|obj| obj.get(column)))
                    .map(cell_text),
            ),
        })
        .collect();

    DatasetMetadata {
        row_count: Some(rows.len()),
        column_count: Some(columns.len()),
        columns: Some(columns),
        column_types: Some(column_types),
        byte_size: Some(byte_size),
    }
}

/// Text form of a JSON cell as seen by column inference (missing/null → blank)
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) => f.to_string(),
            None => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn delimited_stats(text: &str, format: DatasetFormat) -> DatasetMetadata {
    let delimiter = format.delimiter().unwrap_or(',');
    let lines: Vec<&str> = non_blank_lines(text).collect();

    let Some((header, body)) = lines.split_first() else {
        return DatasetMetadata {
            row_count: Some(0),
            column_count: Some(0),
            columns: Some(Vec::new()),
            column_types: Some(Vec::new()),
            byte_size: Some(text.len()),
        };
    };

    let columns: Vec<String> = split_cells(header, delimiter)
        .map(str::to_string)
        .collect();

    let rows: Vec<Vec<&str>> = body
        .iter()
        .map(|line| split_cells(line, delimiter).collect())
        .collect();

    let column_types = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| ColumnTypeInfo {
            name: name.clone(),
            column_type: infer_column_type(
                rows.iter().map(|cells| cells.get(idx).copied().unwrap_or_default()),
            ),
        })
        .collect();

    DatasetMetadata {
        row_count: Some(body.len()),
        column_count: Some(columns.len()),
        columns: Some(columns),
        column_types: Some(column_types),
        byte_size: Some(text.len()),
    }
}

/// Split a line on the delimiter, trimming whitespace and surrounding quotes
fn split_cells(line: &str, delimiter: char) -> impl Iterator<Item = &str> {
    line.split(delimiter).map(|cell| {
        let cell = cell.trim();
        cell.strip_prefix('"')
            .and_then(|c| c.strip_suffix('"'))
            .unwrap_or(cell)
    })
}
