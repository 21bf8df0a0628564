//! Suppression of editor change notifications during programmatic updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag telling change handlers to ignore editor notifications
///
/// Clones share the same flag, so the host can hold one while the engine
/// holds another.
#[derive(Debug, Clone, Default)]
pub struct SuppressionFlag {
    inner: Arc<AtomicBool>,
}

impl SuppressionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress notifications until the returned guard is dropped
    #[must_use = "suppression ends as soon as the guard is dropped"]
    pub fn suppress(&self) -> Suppressed {
        let previous = self.inner.swap(true, Ordering::SeqCst);
        Suppressed {
            flag: Arc::clone(&self.inner),
            previous,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Scope during which editor notifications are ignored
///
/// Restores the state it found on drop, so nested scopes unwind correctly.
#[derive(Debug)]
pub struct Suppressed {
    flag: Arc<AtomicBool>,
    previous: bool,
}

impl Drop for Suppressed {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::SeqCst);
    }
}
