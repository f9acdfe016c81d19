//! Non-fatal warnings raised while encoding cuts or compiling queries.
//!
//! Components never log on their own; they report through a
//! [`DiagnosticSink`] handed to them by the caller.

use std::fmt;
use std::sync::{Arc, Mutex};

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// A path element equals the empty-value sentinel and will decode as `""`.
    SentinelCollision,
    /// An ORDER BY attribute is not part of the statement and was skipped.
    UnknownOrderAttribute,
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCode::SentinelCollision => write!(f, "sentinel_collision"),
            DiagnosticCode::UnknownOrderAttribute => write!(f, "unknown_order_attribute"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Receiver of [`Diagnostic`]s.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards every diagnostic to `tracing::warn!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!(code = %diagnostic.code, "{}", diagnostic.message);
    }
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _diagnostic: Diagnostic) {}
}

/// Keeps diagnostics in memory so the caller can surface them.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    collected: Arc<Mutex<Vec<Diagnostic>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything reported so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self.collected.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn has(&self, code: DiagnosticCode) -> bool {
        self.diagnostics().iter().any(|d| d.code == code)
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        match self.collected.lock() {
            Ok(mut guard) => guard.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}

/// The sink used when the caller does not pick one.
pub fn default_sink() -> Arc<dyn DiagnosticSink> {
    Arc::new(TracingSink)
}
