//! Specification validation without rendering.
//!
//! Checks what the engine itself depends on: that every dataset reference can
//! be resolved, and that inline data can be extracted unambiguously. Chart
//! grammar (marks, encodings) is left to the renderer.

use std::collections::BTreeSet;

use crate::reference;
use crate::spec::{walk, VisualizationSpec};

// ============================================================================
// Core Types
// ============================================================================

/// Result of `validate()` - reference and inline-data inspection of a spec.
#[derive(Debug, Clone)]
pub struct Validated {
    references: BTreeSet<String>,
    inline_nodes: usize,
    valid: bool,
    errors: Vec<ValidationError>,
    warnings: Vec<ValidationWarning>,
}

impl Validated {
    /// Dataset names referenced anywhere in the spec.
    pub fn references(&self) -> &BTreeSet<String> {
        &self.references
    }

    /// Number of nodes embedding inline data.
    pub fn inline_nodes(&self) -> usize {
        self.inline_nodes
    }

    /// Whether the spec is valid (no errors).
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Validation errors.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Validation warnings.
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }
}

/// A validation error (fatal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub location: Option<Location>,
}

/// A validation warning (non-fatal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub message: String,
    pub location: Option<Location>,
}

/// Position of a node in the tree: its pre-order index (root is 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub node: usize,
}

// ============================================================================
// Validation Function
// ============================================================================

/// Validate the references and inline data of a spec.
///
/// `known_datasets` are the names a render could resolve against.
pub fn validate<S: AsRef<str>>(spec: &VisualizationSpec, known_datasets: &[S]) -> Validated {
    let known: BTreeSet<&str> = known_datasets.iter().map(AsRef::as_ref).collect();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Unknown references, each reported at the node it occurs in
    let mut index = 0usize;
    walk::traverse_all(spec, &mut |node| {
        if let Some(name) = node.data_name() {
            if !known.contains(name) {
                errors.push(ValidationError {
                    message: format!("Unknown dataset '{}'", name),
                    location: Some(Location { node: index }),
                });
            }
        }
        index += 1;
    });

    let references = reference::extract_references(spec);
    let inline_nodes = reference::count_inline_nodes(spec);

    if inline_nodes > 1 {
        warnings.push(ValidationWarning {
            message: format!(
                "{} nodes carry inline data; only the first can be extracted to a dataset",
                inline_nodes
            ),
            location: None,
        });
    }

    if inline_nodes > 0 && !references.is_empty() {
        warnings.push(ValidationWarning {
            message: "Spec mixes inline data with dataset references".to_string(),
            location: None,
        });
    }

    Validated {
        references,
        inline_nodes,
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
