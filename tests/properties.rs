use chartbook::detect;
use chartbook::reference;
use chartbook::{Dataset, DatasetFormat, DatasetSource, VisualizationSpec};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

const NAMES: [&str; 3] = ["a", "b", "c"];

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({"mark": "bar"})),
        prop::sample::select(NAMES.to_vec())
            .prop_map(|name| json!({"data": {"name": name}, "mark": "point"})),
        (0..5i64).prop_map(|x| json!({"data": {"values": [{"x": x}]}, "mark": "tick"})),
        Just(json!({"data": {"url": "https://example.org/d.csv", "format": {"type": "csv"}}})),
    ]
}

/// Arbitrary spec trees using every composition slot
fn spec_tree() -> impl Strategy<Value = VisualizationSpec> {
    leaf()
        .prop_recursive(4, 40, 4, |inner| {
            prop_oneof![
                (
                    prop::sample::select(vec!["layer", "concat", "hconcat", "vconcat"]),
                    prop::collection::vec(inner.clone(), 1..4),
                )
                    .prop_map(|(slot, children)| {
                        let mut node = Map::new();
                        node.insert(slot.to_string(), Value::Array(children));
                        Value::Object(node)
                    }),
                inner.prop_map(|child| json!({"spec": child})),
            ]
        })
        .prop_map(|value| serde_json::from_value(value).unwrap())
}

fn catalog() -> HashMap<String, Dataset> {
    let datasets = [
        Dataset::inline("a", DatasetFormat::Json, json!([{"x": 1}])).unwrap(),
        Dataset::inline("b", DatasetFormat::Csv, json!("x,y\n1,2")).unwrap(),
        Dataset::remote("c", DatasetFormat::Tsv, "https://example.org/c.tsv").unwrap(),
    ];
    datasets
        .into_iter()
        .map(|d| (d.name().to_string(), d))
        .collect()
}

proptest! {
    #[test]
    fn prop_resolved_spec_has_no_references(spec in spec_tree()) {
        let datasets = catalog();
        let original = spec.clone();

        let resolved = reference::resolve_for_render(&spec, |name| datasets.get(name).cloned()).unwrap();

        prop_assert!(reference::extract_references(&resolved).is_empty());
        prop_assert_eq!(spec, original);
    }

    #[test]
    fn prop_missing_dataset_fails_resolution(spec in spec_tree()) {
        let refs = reference::extract_references(&spec);
        let result = reference::resolve_for_render(&spec, |_| None);
        prop_assert_eq!(result.is_err(), !refs.is_empty());
    }

    #[test]
    fn prop_rewrite_renames_every_reference(spec in spec_tree()) {
        let before = reference::extract_references(&spec);
        let rewritten = reference::rewrite_name_everywhere(&spec, "a", "z");
        let after = reference::extract_references(&rewritten);

        let expected: std::collections::BTreeSet<String> = before
            .into_iter()
            .map(|name| if name == "a" { "z".to_string() } else { name })
            .collect();
        prop_assert_eq!(after, expected);
    }

    #[test]
    fn prop_replace_removes_exactly_one_inline_node(spec in spec_tree()) {
        let count = reference::count_inline_nodes(&spec);
        let replaced = reference::replace_inline_with_reference(&spec, "x");

        prop_assert_eq!(reference::count_inline_nodes(&replaced), count.saturating_sub(1));
        if count == 1 {
            prop_assert!(!reference::has_inline_data(&replaced));
        }
        if count > 0 {
            prop_assert!(reference::extract_references(&replaced).contains("x"));
        }
    }

    #[test]
    fn prop_record_stats_match_shape(rows in 1..30usize, columns in 1..8usize) {
        let payload: Vec<Value> = (0..rows)
            .map(|r| {
                let record: Map<String, Value> = (0..columns)
                    .map(|c| (format!("c{}", c), json!(r * c)))
                    .collect();
                Value::Object(record)
            })
            .collect();
        let payload = Value::Array(payload);

        let stats = detect::compute_stats(&payload, DatasetFormat::Json, DatasetSource::Inline);
        prop_assert_eq!(stats.row_count, Some(rows));
        prop_assert_eq!(stats.column_count, Some(columns));
    }
}
