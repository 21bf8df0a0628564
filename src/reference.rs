//! Dataset reference resolution
//!
//! Every operation here is built on the tree walker in [`crate::spec::walk`]:
//!
//! - collection and renaming use the full traversal, because a reference that
//!   is missed would be silently orphaned
//! - inline-data lookups and replacement use the find-first traversal and only
//!   ever touch the first inline-data node
//!
//! All functions take the tree by reference and return new values; the input
//! tree is never modified.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::dataset::{Dataset, DatasetFormat};
use crate::spec::{walk, Data, VisualizationSpec};
use crate::{ChartbookError, Result};

/// Every dataset name referenced anywhere in the tree
pub fn extract_references(spec: &VisualizationSpec) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    walk::traverse_all(spec, &mut |node| {
        if let Some(name) = node.data_name() {
            names.insert(name.to_string());
        }
    });
    names
}

/// Whether any node embeds an array or text payload
pub fn has_inline_data(spec: &VisualizationSpec) -> bool {
    walk::traverse_or(spec, |node| node.inline_values().map(|_| true), false)
}

/// Payload of the first inline-data node
pub fn extract_inline_data(spec: &VisualizationSpec) -> Option<Value> {
    walk::traverse(spec, &mut |node| node.inline_values().cloned())
}

/// Format of the first inline data carrying a recognized format tag
///
/// Untagged inline data is JSON.
pub fn detect_inline_format(spec: &VisualizationSpec) -> DatasetFormat {
    walk::traverse_or(
        spec,
        |node| {
            node.data
                .as_ref()
                .and_then(Data::inline_format_type)
                .and_then(DatasetFormat::from_type_name)
        },
        DatasetFormat::Json,
    )
}

/// Payload of the first inline-data node with that same node's format tag
///
/// A missing or unrecognized tag reads as `None`, so the caller can tell
/// untagged text apart from text explicitly tagged as JSON.
pub fn extract_first_inline(spec: &VisualizationSpec) -> Option<(Value, Option<DatasetFormat>)> {
    walk::traverse(spec, &mut |node| {
        let data = node.data.as_ref()?;
        let payload = data.inline_payload()?.clone();
        let format = data
            .inline_format_type()
            .and_then(DatasetFormat::from_type_name);
        Some((payload, format))
    })
}

/// Number of nodes embedding an array or text payload
pub fn count_inline_nodes(spec: &VisualizationSpec) -> usize {
    let mut count = 0;
    walk::traverse_all(spec, &mut |node| {
        if node.inline_values().is_some() {
            count += 1;
        }
    });
    count
}

/// Replace the first inline-data node's `data` with `{"name": name}`
///
/// Later inline-data nodes are left as they are.
pub fn replace_inline_with_reference(spec: &VisualizationSpec, name: &str) -> VisualizationSpec {
    let mut copy = spec.clone();
    let replaced = walk::traverse_mut(&mut copy, &mut |node| {
        node.inline_values()?;
        node.data = Some(Data::named(name));
        Some(())
    });

    if replaced.is_none() {
        tracing::debug!(name, "no inline data to replace");
    }
    copy
}

/// Rewrite every reference to `old_name` into a reference to `new_name`
pub fn rewrite_name_everywhere(
    spec: &VisualizationSpec,
    old_name: &str,
    new_name: &str,
) -> VisualizationSpec {
    let mut copy = spec.clone();
    let mut rewritten = 0usize;
    walk::traverse_all_mut(&mut copy, &mut |node| {
        if let Some(Data::Named { name, .. }) = node.data.as_mut() {
            if *name == old_name {
                *name = new_name.to_string();
                rewritten += 1;
            }
        }
    });

    tracing::debug!(old_name, new_name, rewritten, "rewrote dataset references");
    copy
}

/// Replace every dataset reference with the dataset's concrete data
///
/// - inline JSON → `{"values": [...]}`
/// - inline CSV/TSV/TopoJSON → `{"values": ..., "format": {"type": ...}}`
/// - remote → `{"url": ..., "format": {"type": ...}}`
///
/// Fails with `DatasetNotFound` on the first name `lookup` cannot satisfy; no
/// partially resolved tree is returned.
pub fn resolve_for_render<F>(spec: &VisualizationSpec, mut lookup: F) -> Result<VisualizationSpec>
where
    F: FnMut(&str) -> Option<Dataset>,
{
    let mut copy = spec.clone();
    walk::try_traverse_all_mut(&mut copy, &mut |node| {
        let Some(name) = node.data_name() else {
            return Ok(());
        };

        let dataset =
            lookup(name).ok_or_else(|| ChartbookError::DatasetNotFound(name.to_string()))?;
        node.data = Some(dataset.to_data());
        Ok(())
    })?;

    Ok(copy)
}
