//! Accumulated log of transformation rules that fired.
//!
//! Every translator pass and repair rule reports what it changed through
//! a [`FixReport`] value that is returned to the caller, never through
//! shared state. Entries merge by rule id and keep first-fired order so
//! the operator sees the pipeline's actual sequence.

use serde::Serialize;
use std::fmt;

/// Severity attached to fix entries and validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// One rule that fired, with how often it matched.
#[derive(Debug, Clone, Serialize)]
pub struct FixEntry {
    pub rule_id: &'static str,
    pub description: String,
    pub severity: Severity,
    pub occurrences: u64,
}

impl fmt::Display for FixEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({} occurrence{})",
            self.rule_id,
            self.description,
            self.occurrences,
            if self.occurrences == 1 { "" } else { "s" }
        )
    }
}

/// Ordered log of every rule that fired during a run. Created fresh per
/// invocation and discarded after being surfaced to the operator.
#[derive(Debug, Default, Serialize)]
pub struct FixReport {
    entries: Vec<FixEntry>,
}

impl FixReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an informational fix.
    pub fn record(&mut self, rule_id: &'static str, description: impl Into<String>, count: u64) {
        self.push(rule_id, description, Severity::Info, count);
    }

    /// Record a fix that requires operator follow-up.
    pub fn warn(&mut self, rule_id: &'static str, description: impl Into<String>, count: u64) {
        self.push(rule_id, description, Severity::Warning, count);
    }

    fn push(
        &mut self,
        rule_id: &'static str,
        description: impl Into<String>,
        severity: Severity,
        count: u64,
    ) {
        if count == 0 {
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.rule_id == rule_id) {
            entry.occurrences += count;
            return;
        }
        self.entries.push(FixEntry {
            rule_id,
            description: description.into(),
            severity,
            occurrences: count,
        });
    }

    /// Fold another report into this one, preserving entry order.
    pub fn merge(&mut self, other: FixReport) {
        for entry in other.entries {
            self.push(entry.rule_id, entry.description, entry.severity, entry.occurrences);
        }
    }

    pub fn entries(&self) -> &[FixEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_occurrences(&self) -> u64 {
        self.entries.iter().map(|e| e.occurrences).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .count()
    }

    /// Print a human-readable summary to stderr.
    pub fn print_summary(&self) {
        if self.entries.is_empty() {
            return;
        }

        eprintln!("\nFixes applied ({}):", self.entries.len());
        for entry in &self.entries {
            let marker = match entry.severity {
                Severity::Warning | Severity::Error => "⚠",
                Severity::Info => "✓",
            };
            eprintln!("  {} {}", marker, entry);
        }
    }
}
