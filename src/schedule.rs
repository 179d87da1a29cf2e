//! Fixed-point scheduler: runs registered rules in cycles until no pass
//! changes the tree or the cycle budget runs out.
//!
//! Each cycle runs every registered rule once, in registration order, plus
//! any visitors queued by earlier passes. A pass queued with
//! [`TraversalContext::do_after_visit`] runs later in the same cycle; one
//! queued with [`TraversalContext::do_next`] runs in the next cycle against
//! the snapshot this cycle produces.
//!
//! Failure isolation is layered. A template error drops one edit (handled
//! inside [`DispatchVisitor`](crate::visitor::DispatchVisitor)); any other
//! rule error discards that rule's whole pass, including the visitors it
//! queued, while the remaining rules and cycles continue from the last
//! consistent tree. Only a cursor invariant violation aborts the run.
//!
//! The scheduler owns no parallelism: one run walks one tree on one thread.
//! Callers fan out across files themselves; persistent trees make the
//! snapshots safe to share.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::output::{codes, Diagnostic, FileId, RuleOutcome, RunResult};
use crate::tree::Node;
use crate::types::TypeTable;
use crate::visitor::{walk_tree, TraversalContext, TreeVisitor, WalkError};

/// Default cycle budget.
pub const DEFAULT_MAX_CYCLES: usize = 3;

/// Runs a rule set over one tree to a fixed point.
pub struct Scheduler {
    rules: Vec<Box<dyn TreeVisitor>>,
    max_cycles: usize,
    cancel: Arc<AtomicBool>,
}

enum Pass {
    /// Index into the registered rule list; re-run every cycle.
    Registered(usize),
    /// A visitor queued by an earlier pass; runs once.
    Queued(Box<dyn TreeVisitor>),
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            rules: Vec::new(),
            max_cycles: DEFAULT_MAX_CYCLES,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn with_rule(mut self, rule: impl TreeVisitor + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn add_rule(&mut self, rule: impl TreeVisitor + 'static) {
        self.rules.push(Box::new(rule));
    }

    /// Shared flag checked between cycles; setting it stops the run at the
    /// next cycle boundary with the last consistent tree.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Run all rules over one tree until convergence, budget exhaustion, or
    /// cancellation.
    pub fn run(
        &mut self,
        file_id: FileId,
        root: Arc<Node>,
        types: &TypeTable,
    ) -> Result<RunResult, EngineError> {
        let before = root.clone();
        let mut current = root;
        let mut rule_results: Vec<RuleOutcome> = Vec::new();
        let mut run_diagnostics: Vec<Diagnostic> = Vec::new();
        let mut converged = false;
        let mut cancelled = false;
        let mut cycles_completed = 0;
        // Visitors queued for the next cycle, in FIFO order.
        let mut carried: Vec<Box<dyn TreeVisitor>> = Vec::new();

        for cycle in 1..=self.max_cycles {
            if self.cancel.load(Ordering::Relaxed) {
                info!(%file_id, cycle, "run cancelled between cycles");
                run_diagnostics.push(Diagnostic::warning(
                    codes::CANCELLED,
                    format!("cancelled before cycle {}", cycle),
                ));
                cancelled = true;
                break;
            }

            let cycle_start = current.clone();
            let mut queue: VecDeque<Pass> = (0..self.rules.len()).map(Pass::Registered).collect();
            queue.extend(carried.drain(..).map(Pass::Queued));

            while let Some(pass) = queue.pop_front() {
                let mut ctx = TraversalContext::new(types);
                let (name, walked) = match pass {
                    Pass::Registered(idx) => {
                        let rule = self.rules[idx].as_mut();
                        (rule.name().to_string(), walk_tree(rule, &current, &mut ctx))
                    }
                    Pass::Queued(mut visitor) => {
                        let name = visitor.name().to_string();
                        (name, walk_tree(visitor.as_mut(), &current, &mut ctx))
                    }
                };

                match walked {
                    Ok(new_tree) => {
                        let changed = !Arc::ptr_eq(&new_tree, &current);
                        debug!(%file_id, cycle, rule = %name, changed, "pass completed");
                        current = new_tree;
                        rule_results.push(RuleOutcome {
                            rule_id: name,
                            cycle,
                            changed,
                            failed: false,
                            diagnostics: ctx.take_diagnostics(),
                        });
                        // Same-cycle fixups run right after this pass, in
                        // the order they were queued.
                        for visitor in ctx.take_after_visit().into_iter().rev() {
                            queue.push_front(Pass::Queued(visitor));
                        }
                        carried.extend(ctx.take_next_cycle());
                    }
                    Err(WalkError::Cursor(err)) => return Err(err.into()),
                    Err(WalkError::Rule(err)) => {
                        // Discard the pass: the tree stays where the last
                        // successful pass left it, and the failing rule's
                        // queued visitors are dropped with the context.
                        warn!(%file_id, cycle, rule = %name, error = %err, "pass discarded");
                        let mut diagnostics = ctx.take_diagnostics();
                        diagnostics.push(Diagnostic::error(
                            codes::RULE_FAILED,
                            format!("rule '{}' failed: {}", name, err),
                        ));
                        rule_results.push(RuleOutcome {
                            rule_id: name,
                            cycle,
                            changed: false,
                            failed: true,
                            diagnostics,
                        });
                    }
                }
            }

            cycles_completed = cycle;
            if Arc::ptr_eq(&current, &cycle_start) && carried.is_empty() {
                converged = true;
                break;
            }
        }

        if !converged && !cancelled {
            run_diagnostics.push(Diagnostic::warning(
                codes::CYCLE_BUDGET_EXCEEDED,
                format!(
                    "no fixed point after {} cycle(s); returning last consistent tree",
                    cycles_completed
                ),
            ));
        }

        info!(
            %file_id,
            cycles = cycles_completed,
            converged,
            changed = !Arc::ptr_eq(&before, &current),
            "run finished"
        );
        Ok(RunResult {
            file_id,
            before,
            after: current,
            cycles_completed,
            converged,
            rule_results,
            diagnostics: run_diagnostics,
        })
    }
}
