//! Market quotes.

use pk_core::Real;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// A mutable market-observable scalar with a version counter.
///
/// Mutated only by hosts and by the Greek bump machinery; every mutation
/// bumps the version so derived caches can detect staleness without a
/// subscriber list.
#[derive(Debug)]
pub struct SimpleQuote {
    value: RwLock<Real>,
    version: AtomicU64,
    label: Option<String>,
}

impl SimpleQuote {
    /// Create a new quote with the given value.
    pub fn new(value: Real) -> Self {
        Self {
            value: RwLock::new(value),
            version: AtomicU64::new(0),
            label: None,
        }
    }

    /// Create a labelled quote (label is informational only).
    pub fn with_label(value: Real, label: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(value),
            version: AtomicU64::new(0),
            label: Some(label.into()),
        }
    }

    /// The current value.
    pub fn value(&self) -> Real {
        *self.value.read().expect("quote lock poisoned")
    }

    /// Set a new value, bumping the version.
    pub fn set_value(&self, value: Real) {
        *self.value.write().expect("quote lock poisoned") = value;
        self.version.fetch_add(1, Ordering::Relaxed);
    }

    /// The quote label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Monotone mutation counter.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }
}
