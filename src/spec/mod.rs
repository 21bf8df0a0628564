//! Visualization specification tree
//!
//! A `VisualizationSpec` is one node of a Vega-Lite style chart definition.
//! Nodes may carry a `data` descriptor and may nest further nodes under the
//! composition slots `layer`, `concat`, `hconcat`, `vconcat` (ordered lists)
//! and `spec` (a single child). Every other key (`mark`, `encoding`,
//! `transform`, ...) is kept untouched in [`VisualizationSpec::rest`] so a
//! parse → rewrite → serialize cycle never loses chart content.
//!
//! # Example
//!
//! ```rust,ignore
//! use chartbook::spec::{Data, VisualizationSpec};
//!
//! let spec: VisualizationSpec = serde_json::from_str(
//!     r#"{"layer": [{"data": {"name": "sales"}, "mark": "line"}]}"#,
//! )?;
//! let child = &spec.layer.as_ref().unwrap()[0];
//! assert_eq!(child.data.as_ref().and_then(Data::name), Some("sales"));
//! ```

pub mod walk;

pub use walk::{
    traverse, traverse_all, traverse_all_mut, traverse_mut, traverse_or, try_traverse_all_mut,
};

use crate::{ChartbookError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Composition slots
// =============================================================================

/// Composition operator holding child specifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Layer,
    Concat,
    HConcat,
    VConcat,
    Spec,
}

impl Slot {
    /// Order in which the walker descends into child slots
    pub const ORDER: [Slot; 5] = [
        Slot::Layer,
        Slot::Concat,
        Slot::HConcat,
        Slot::VConcat,
        Slot::Spec,
    ];

    /// Key of this slot in the JSON form
    pub fn key(&self) -> &'static str {
        match self {
            Slot::Layer => "layer",
            Slot::Concat => "concat",
            Slot::HConcat => "hconcat",
            Slot::VConcat => "vconcat",
            Slot::Spec => "spec",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// Tree node
// =============================================================================

/// One node of a chart specification
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualizationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<Vec<VisualizationSpec>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concat: Option<Vec<VisualizationSpec>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hconcat: Option<Vec<VisualizationSpec>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vconcat: Option<Vec<VisualizationSpec>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Box<VisualizationSpec>>,

    /// Every key that is neither `data` nor a composition slot
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl VisualizationSpec {
    /// Create an empty node
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node holding only a data descriptor
    pub fn with_data(data: Data) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Parse a specification from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| ChartbookError::ParseError(format!("Invalid chart specification: {}", e)))
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ChartbookError::InternalError(format!("Failed to serialize spec: {}", e)))
    }

    /// Children stored under `slot`, in order
    pub fn slot(&self, slot: Slot) -> &[VisualizationSpec] {
        match slot {
            Slot::Layer => self.layer.as_deref().unwrap_or_default(),
            Slot::Concat => self.concat.as_deref().unwrap_or_default(),
            Slot::HConcat => self.hconcat.as_deref().unwrap_or_default(),
            Slot::VConcat => self.vconcat.as_deref().unwrap_or_default(),
            Slot::Spec => self.spec.as_deref().map(std::slice::from_ref).unwrap_or_default(),
        }
    }

    /// Mutable children stored under `slot`, in order
    pub fn slot_mut(&mut self, slot: Slot) -> &mut [VisualizationSpec] {
        match slot {
            Slot::Layer => self.layer.as_deref_mut().unwrap_or_default(),
            Slot::Concat => self.concat.as_deref_mut().unwrap_or_default(),
            Slot::HConcat => self.hconcat.as_deref_mut().unwrap_or_default(),
            Slot::VConcat => self.vconcat.as_deref_mut().unwrap_or_default(),
            Slot::Spec => self
                .spec
                .as_deref_mut()
                .map(std::slice::from_mut)
                .unwrap_or_default(),
        }
    }

    /// Direct children across all slots, in walker order
    pub fn children(&self) -> impl Iterator<Item = &VisualizationSpec> {
        Slot::ORDER.into_iter().flat_map(move |slot| self.slot(slot))
    }

    /// Dataset name referenced by this node's `data`, if any
    pub fn data_name(&self) -> Option<&str> {
        self.data.as_ref().and_then(Data::name)
    }

    /// Inline payload of this node when it is an array or delimited text
    pub fn inline_values(&self) -> Option<&Value> {
        self.data.as_ref().and_then(Data::inline_payload)
    }
}

// =============================================================================
// Data descriptors
// =============================================================================

/// Format tag attached to inline or remote data (`{"type": "csv", ...}`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataFormat {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl DataFormat {
    /// Format tag with only a `type`
    pub fn of_type(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            rest: Map::new(),
        }
    }
}

/// Data descriptor of a node
///
/// Exactly one descriptor kind is allowed per node; a descriptor combining
/// `values`, `name` and `url` is rejected when parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawData", into = "RawData")]
pub enum Data {
    /// Embedded payload: array of records, delimited text, or a topology object
    Inline {
        values: Value,
        format: Option<DataFormat>,
        extra: Map<String, Value>,
    },
    /// Reference to a stored dataset by unique name
    Named { name: String, extra: Map<String, Value> },
    /// Remote payload
    Url {
        url: String,
        format: Option<DataFormat>,
        extra: Map<String, Value>,
    },
    /// Anything else (generators, empty descriptors), kept verbatim
    Other(Map<String, Value>),
}

impl Data {
    /// `{"name": name}`
    pub fn named(name: impl Into<String>) -> Self {
        Data::Named {
            name: name.into(),
            extra: Map::new(),
        }
    }

    /// `{"values": values}` with an optional `{"format": {"type": ...}}`
    pub fn inline(values: Value, format_type: Option<&str>) -> Self {
        Data::Inline {
            values,
            format: format_type.map(DataFormat::of_type),
            extra: Map::new(),
        }
    }

    /// `{"url": url, "format": {"type": ...}}`
    pub fn url(url: impl Into<String>, format_type: Option<&str>) -> Self {
        Data::Url {
            url: url.into(),
            format: format_type.map(DataFormat::of_type),
            extra: Map::new(),
        }
    }

    /// Referenced dataset name
    pub fn name(&self) -> Option<&str> {
        match self {
            Data::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Inline payload when it is an array or a string
    ///
    /// Object payloads (inline topology) are not extractable inline data.
    pub fn inline_payload(&self) -> Option<&Value> {
        match self {
            Data::Inline { values, .. } if values.is_array() || values.is_string() => Some(values),
            _ => None,
        }
    }

    /// Explicit format tag of inline data
    pub fn inline_format_type(&self) -> Option<&str> {
        match self {
            Data::Inline {
                format: Some(format),
                ..
            } => format.kind.as_deref(),
            _ => None,
        }
    }
}

/// Wire form of a data descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    values: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<DataFormat>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl TryFrom<RawData> for Data {
    type Error = String;

    fn try_from(raw: RawData) -> std::result::Result<Self, Self::Error> {
        let RawData {
            values,
            name,
            url,
            format,
            mut rest,
        } = raw;

        match (values, name, url) {
            (Some(values), None, None) => Ok(Data::Inline {
                values,
                format,
                extra: rest,
            }),
            (None, Some(name), None) => {
                if let Some(format) = format {
                    rest.insert(
                        "format".to_string(),
                        serde_json::to_value(format).map_err(|e| e.to_string())?,
                    );
                }
                Ok(Data::Named { name, extra: rest })
            }
            (None, None, Some(url)) => Ok(Data::Url {
                url,
                format,
                extra: rest,
            }),
            (None, None, None) => {
                if let Some(format) = format {
                    rest.insert(
                        "format".to_string(),
                        serde_json::to_value(format).map_err(|e| e.to_string())?,
                    );
                }
                Ok(Data::Other(rest))
            }
            _ => Err(
                "data descriptor may hold only one of 'values', 'name' or 'url'".to_string(),
            ),
        }
    }
}

impl From<Data> for RawData {
    fn from(data: Data) -> Self {
        match data {
            Data::Inline {
                values,
                format,
                extra,
            } => RawData {
                values: Some(values),
                format,
                rest: extra,
                ..RawData::default()
            },
            Data::Named { name, extra } => RawData {
                name: Some(name),
                rest: extra,
                ..RawData::default()
            },
            Data::Url { url, format, extra } => RawData {
                url: Some(url),
                format,
                rest: extra,
                ..RawData::default()
            },
            Data::Other(rest) => RawData {
                rest,
                ..RawData::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_preserves_unknown_keys() {
        let input = json!({
            "$schema": "https://vega.github.io/schema/vega-lite/v6.json",
            "data": {"name": "sales"},
            "mark": "bar",
            "encoding": {"x": {"field": "a", "type": "nominal"}}
        });
        let spec: VisualizationSpec = serde_json::from_value(input.clone()).unwrap();

        assert_eq!(spec.data_name(), Some("sales"));
        assert_eq!(spec.rest.get("mark"), Some(&json!("bar")));
        assert_eq!(serde_json::to_value(&spec).unwrap(), input);
    }

    #[test]
    fn test_parse_composition_slots() {
        let spec: VisualizationSpec = serde_json::from_value(json!({
            "hconcat": [{"mark": "bar"}, {"mark": "line"}],
            "spec": {"layer": [{"mark": "point"}]}
        }))
        .unwrap();

        assert_eq!(spec.slot(Slot::HConcat).len(), 2);
        assert_eq!(spec.slot(Slot::Spec).len(), 1);
        assert!(spec.slot(Slot::Layer).is_empty());
        assert_eq!(spec.children().count(), 3);
    }

    #[test]
    fn test_data_descriptor_kinds() {
        let inline: Data = serde_json::from_value(json!({"values": [{"a": 1}]})).unwrap();
        assert!(inline.inline_payload().is_some());

        let text: Data =
            serde_json::from_value(json!({"values": "a,b\n1,2", "format": {"type": "csv"}}))
                .unwrap();
        assert_eq!(text.inline_format_type(), Some("csv"));

        let url: Data = serde_json::from_value(json!({"url": "data/cars.json"})).unwrap();
        assert!(matches!(url, Data::Url { .. }));

        let other: Data = serde_json::from_value(json!({"sequence": {"start": 0, "stop": 5}})).unwrap();
        assert!(matches!(other, Data::Other(_)));
    }

    #[test]
    fn test_object_values_are_not_inline_payload() {
        let data = Data::inline(json!({"type": "Topology"}), Some("topojson"));
        assert!(data.inline_payload().is_none());
    }

    #[test]
    fn test_reject_mixed_descriptor() {
        let result: std::result::Result<Data, _> =
            serde_json::from_value(json!({"name": "a", "values": []}));
        assert!(result.is_err());

        let err = VisualizationSpec::from_json(r#"{"data": {"name": "a", "url": "x.csv"}}"#)
            .unwrap_err();
        assert!(matches!(err, ChartbookError::ParseError(_)));
    }

    #[test]
    fn test_data_round_trip_keeps_extra_fields() {
        let input = json!({"url": "a.csv", "format": {"type": "csv", "parse": {"d": "date"}}});
        let data: Data = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(&data).unwrap(), input);
    }
}
