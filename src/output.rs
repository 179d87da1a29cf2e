//! Result records and diagnostics exposed to the execution/reporting layer.
//!
//! The engine itself has no CLI or reporting surface; it hands the caller a
//! [`RunResult`] per tree (before/after roots plus per-rule outcomes) and a
//! serializable [`RunSummary`] with aggregate change counts.
//!
//! Diagnostics carry stable codes (see [`codes`]) so callers can filter
//! without string-matching messages.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::tree::Node;

/// Stable file identifier assigned by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file_{}", self.0)
    }
}

/// Stable diagnostic codes.
pub mod codes {
    /// Fail-closed non-match on missing type attribution. Not an error.
    pub const UNRESOLVED_TYPE_SKIP: &str = "unresolved-type-skip";
    /// Template snippet failed to parse; one edit dropped.
    pub const TEMPLATE_PARSE: &str = "template-parse";
    /// Template slot/argument mismatch; one edit dropped.
    pub const TEMPLATE_BINDING: &str = "template-binding";
    /// Scheduler stopped at the cycle budget before reaching a fixed point.
    pub const CYCLE_BUDGET_EXCEEDED: &str = "cycle-budget-exceeded";
    /// A rule failed during its pass; the pass was discarded.
    pub const RULE_FAILED: &str = "rule-failed";
    /// The run was cancelled between cycles.
    pub const CANCELLED: &str = "cancelled";
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single diagnostic attached to a rule run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable code from [`codes`].
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Info,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Outcome of one rule over one tree in one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub rule_id: String,
    /// Cycle number, starting at 1.
    pub cycle: usize,
    /// Whether this rule's pass changed the tree.
    pub changed: bool,
    /// Whether the rule failed and its pass was discarded.
    pub failed: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of a scheduler run over a single tree.
///
/// `after` is always the last fully completed, internally consistent tree; a
/// partially applied pass is never surfaced.
#[derive(Debug)]
pub struct RunResult {
    pub file_id: FileId,
    pub before: Arc<Node>,
    pub after: Arc<Node>,
    /// Cycles that ran to completion.
    pub cycles_completed: usize,
    /// True when the run reached a fixed point within the cycle budget.
    pub converged: bool,
    pub rule_results: Vec<RuleOutcome>,
    /// Run-level diagnostics (budget exhaustion, cancellation).
    pub diagnostics: Vec<Diagnostic>,
}

impl RunResult {
    /// True when any rule changed the tree.
    pub fn changed(&self) -> bool {
        !Arc::ptr_eq(&self.before, &self.after)
    }

    /// Aggregate, serializable view of this run.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            file_id: self.file_id,
            changed: self.changed(),
            cycles_completed: self.cycles_completed,
            converged: self.converged,
            rules_run: self.rule_results.len(),
            rules_changed: self.rule_results.iter().filter(|r| r.changed).count(),
            rules_failed: self.rule_results.iter().filter(|r| r.failed).count(),
            diagnostics: self
                .diagnostics
                .iter()
                .cloned()
                .chain(
                    self.rule_results
                        .iter()
                        .flat_map(|r| r.diagnostics.iter().cloned()),
                )
                .collect(),
        }
    }
}

/// Aggregate change counts for one tree, suitable for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub file_id: FileId,
    pub changed: bool,
    pub cycles_completed: usize,
    pub converged: bool,
    pub rules_run: usize,
    pub rules_changed: usize,
    pub rules_failed: usize,
    pub diagnostics: Vec<Diagnostic>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;

    #[test]
    fn summary_counts_changed_and_failed_rules() {
        let before = Arc::new(Node::new(NodeKind::CompilationUnit));
        let after = Arc::new(Node::new(NodeKind::CompilationUnit));
        let result = RunResult {
            file_id: FileId(7),
            before: before.clone(),
            after,
            cycles_completed: 2,
            converged: true,
            rule_results: vec![
                RuleOutcome {
                    rule_id: "a".to_string(),
                    cycle: 1,
                    changed: true,
                    failed: false,
                    diagnostics: vec![],
                },
                RuleOutcome {
                    rule_id: "b".to_string(),
                    cycle: 1,
                    changed: false,
                    failed: true,
                    diagnostics: vec![Diagnostic::error(codes::RULE_FAILED, "boom")],
                },
            ],
            diagnostics: vec![],
        };

        let summary = result.summary();
        assert!(summary.changed);
        assert_eq!(summary.rules_run, 2);
        assert_eq!(summary.rules_changed, 1);
        assert_eq!(summary.rules_failed, 1);
        assert_eq!(summary.diagnostics.len(), 1);
    }

    #[test]
    fn unchanged_run_reports_changed_false() {
        let tree = Arc::new(Node::new(NodeKind::CompilationUnit));
        let result = RunResult {
            file_id: FileId(1),
            before: tree.clone(),
            after: tree,
            cycles_completed: 1,
            converged: true,
            rule_results: vec![],
            diagnostics: vec![],
        };
        assert!(!result.changed());
    }

    #[test]
    fn diagnostics_serialize_with_lowercase_severity() {
        let diag = Diagnostic::info(codes::UNRESOLVED_TYPE_SKIP, "skipped");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "info");
        assert_eq!(json["code"], "unresolved-type-skip");
    }
}
