//! Traversal over the composition slots of a specification tree.
//!
//! Two modes share the same visiting order (node first, then children slot by
//! slot in [`Slot::ORDER`], each list front to back):
//!
//! - **find-first**: [`traverse`] / [`traverse_mut`] stop at the first node for
//!   which the visitor returns `Some`
//! - **full**: [`traverse_all`] / [`traverse_all_mut`] visit every node
//!
//! The read-only functions never modify the tree. The `_mut` variants are for
//! callers rewriting a tree they own, normally a fresh clone.

use super::{Slot, VisualizationSpec};
use crate::Result;

/// Visit nodes until `visit` returns `Some`, and return that value.
pub fn traverse<T, F>(node: &VisualizationSpec, visit: &mut F) -> Option<T>
where
    F: FnMut(&VisualizationSpec) -> Option<T>,
{
    if let Some(found) = visit(node) {
        return Some(found);
    }

    for slot in Slot::ORDER {
        for child in node.slot(slot) {
            if let Some(found) = traverse(child, visit) {
                return Some(found);
            }
        }
    }

    None
}

/// Like [`traverse`], falling back to `default` when nothing matched.
pub fn traverse_or<T, F>(node: &VisualizationSpec, mut visit: F, default: T) -> T
where
    F: FnMut(&VisualizationSpec) -> Option<T>,
{
    traverse(node, &mut visit).unwrap_or(default)
}

/// Visit every node.
pub fn traverse_all<F>(node: &VisualizationSpec, visit: &mut F)
where
    F: FnMut(&VisualizationSpec),
{
    visit(node);

    for slot in Slot::ORDER {
        for child in node.slot(slot) {
            traverse_all(child, visit);
        }
    }
}

/// Find-first traversal allowing the visitor to modify the matched node.
pub fn traverse_mut<T, F>(node: &mut VisualizationSpec, visit: &mut F) -> Option<T>
where
    F: FnMut(&mut VisualizationSpec) -> Option<T>,
{
    if let Some(found) = visit(node) {
        return Some(found);
    }

    for slot in Slot::ORDER {
        for child in node.slot_mut(slot) {
            if let Some(found) = traverse_mut(child, visit) {
                return Some(found);
            }
        }
    }

    None
}

/// Visit and possibly modify every node.
pub fn traverse_all_mut<F>(node: &mut VisualizationSpec, visit: &mut F)
where
    F: FnMut(&mut VisualizationSpec),
{
    visit(node);

    for slot in Slot::ORDER {
        for child in node.slot_mut(slot) {
            traverse_all_mut(child, visit);
        }
    }
}

/// Full traversal that stops at the first error.
///
/// Nodes visited before the failure may already be modified; callers are
/// expected to discard the tree on `Err`.
pub fn try_traverse_all_mut<F>(node: &mut VisualizationSpec, visit: &mut F) -> Result<()>
where
    F: FnMut(&mut VisualizationSpec) -> Result<()>,
{
    visit(node)?;

    for slot in Slot::ORDER {
        for child in node.slot_mut(slot) {
            try_traverse_all_mut(child, visit)?;
        }
    }

    Ok(())
}
