//! Visitor and transform infrastructure for tree traversal.
//!
//! Traversal is depth-first and strictly sequential: `visit` runs pre-order,
//! `leave` runs post-order, children in source order. Instead of a visitor
//! subclass per node type, rules dispatch on [`NodeKind`] through a
//! [`DispatchVisitor`] table of transform callbacks.
//!
//! # Control Flow
//!
//! - [`VisitResult::Continue`] — traverse into children
//! - [`VisitResult::SkipChildren`] — skip children but still call `leave`
//! - [`VisitResult::Stop`] — halt traversal immediately (no `leave` called)
//!
//! # Rewriting
//!
//! `leave` may return a replacement node. The walk rebuilds the spine above
//! every replacement persistently: untouched siblings are shared with the
//! input tree, and the input tree itself is never mutated.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::cursor::{Cursor, CursorError};
use crate::output::{codes, Diagnostic};
use crate::template::TemplateError;
use crate::tree::{Node, NodeKind};
use crate::types::TypeTable;

/// Pre-order control flow decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    Continue,
    SkipChildren,
    Stop,
}

/// A failure scoped to one rule's pass.
///
/// Template errors are narrower still (one edit) and are absorbed by
/// [`DispatchVisitor`]; any other failure discards the whole pass while the
/// remaining rules and cycles continue.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("{0}")]
    Failed(String),
}

/// Per-traversal state handed to every visitor callback.
///
/// Owns the [`Cursor`] for the current descent, the diagnostics produced so
/// far, and the deferred-work queues consumed by the scheduler.
pub struct TraversalContext<'t> {
    cursor: Cursor,
    types: &'t TypeTable,
    diagnostics: Vec<Diagnostic>,
    after_visit: Vec<Box<dyn TreeVisitor>>,
    next_cycle: Vec<Box<dyn TreeVisitor>>,
}

impl<'t> TraversalContext<'t> {
    pub fn new(types: &'t TypeTable) -> Self {
        TraversalContext {
            cursor: Cursor::new(),
            types,
            diagnostics: Vec::new(),
            after_visit: Vec::new(),
            next_cycle: Vec::new(),
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn types(&self) -> &TypeTable {
        self.types
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Enqueue a visitor to run later in the *same* cycle, after the current
    /// pass finishes. Rare; used for local fixups.
    pub fn do_after_visit(&mut self, visitor: impl TreeVisitor + 'static) {
        self.after_visit.push(Box::new(visitor));
    }

    /// Enqueue a visitor for the *next* cycle, against the tree snapshot this
    /// cycle produces. The common way to chain one rule's output into
    /// another's input.
    pub fn do_next(&mut self, visitor: impl TreeVisitor + 'static) {
        self.next_cycle.push(Box::new(visitor));
    }

    pub fn take_after_visit(&mut self) -> Vec<Box<dyn TreeVisitor>> {
        std::mem::take(&mut self.after_visit)
    }

    pub fn take_next_cycle(&mut self) -> Vec<Box<dyn TreeVisitor>> {
        std::mem::take(&mut self.next_cycle)
    }
}

/// A traversal pass over one tree.
pub trait TreeVisitor {
    /// Identifier used in rule outcomes and diagnostics.
    fn name(&self) -> &str;

    /// Pre-order step.
    fn visit(&mut self, _node: &Arc<Node>, _ctx: &mut TraversalContext<'_>) -> VisitResult {
        VisitResult::Continue
    }

    /// Post-order step; may return a replacement for the (already rebuilt)
    /// node.
    fn leave(
        &mut self,
        _node: &Arc<Node>,
        _ctx: &mut TraversalContext<'_>,
    ) -> Result<Option<Arc<Node>>, RuleError> {
        Ok(None)
    }
}

/// Errors surfaced by a walk.
#[derive(Debug, Error)]
pub enum WalkError {
    /// Structural invariant violation; fatal to the whole run.
    #[error(transparent)]
    Cursor(#[from] CursorError),

    /// The visitor failed; its pass is discarded.
    #[error(transparent)]
    Rule(RuleError),
}

/// Run one visitor over one tree, returning the (possibly new) root.
///
/// Returns the input root unchanged (pointer-equal) when the visitor made no
/// edits, which is how callers detect convergence.
pub fn walk_tree(
    visitor: &mut dyn TreeVisitor,
    root: &Arc<Node>,
    ctx: &mut TraversalContext<'_>,
) -> Result<Arc<Node>, WalkError> {
    walk_node(visitor, root, ctx).map(|(node, _)| node)
}

fn walk_node(
    visitor: &mut dyn TreeVisitor,
    node: &Arc<Node>,
    ctx: &mut TraversalContext<'_>,
) -> Result<(Arc<Node>, VisitResult), WalkError> {
    ctx.cursor.enter(node.clone());

    let mut current = node.clone();
    let mut control = VisitResult::Continue;

    match visitor.visit(node, ctx) {
        VisitResult::Stop => {
            ctx.cursor.exit()?;
            return Ok((current, VisitResult::Stop));
        }
        VisitResult::SkipChildren => {}
        VisitResult::Continue => {
            let mut new_children: Option<Vec<Arc<Node>>> = None;
            for (i, child) in node.children().iter().enumerate() {
                let (new_child, child_control) = walk_node(visitor, child, ctx)?;
                if !Arc::ptr_eq(&new_child, child) {
                    new_children.get_or_insert_with(|| node.children().to_vec())[i] = new_child;
                }
                if child_control == VisitResult::Stop {
                    control = VisitResult::Stop;
                    break;
                }
            }
            if let Some(children) = new_children {
                current = node.with_children_replaced(children);
            }
        }
    }

    if control == VisitResult::Stop {
        ctx.cursor.exit()?;
        return Ok((current, VisitResult::Stop));
    }

    let replacement = visitor.leave(&current, ctx).map_err(WalkError::Rule)?;
    ctx.cursor.exit()?;
    if let Some(node) = replacement {
        current = node;
    }
    Ok((current, VisitResult::Continue))
}

// ============================================================================
// Dispatch-table rules
// ============================================================================

/// Decision returned by a transform callback.
pub enum Transform {
    /// Leave the node as is.
    Keep,
    /// Replace the node with a new subtree.
    Replace(Arc<Node>),
}

type TransformFn = Box<dyn FnMut(&Arc<Node>, &mut TraversalContext<'_>) -> Result<Transform, RuleError>>;

/// A rule expressed as a table of `(NodeKind -> transform)` callbacks.
///
/// Callbacks run post-order, so a callback always sees children that were
/// already rewritten in this pass. A [`RuleError::Template`] returned by a
/// callback drops that one edit (recorded as a diagnostic) while the rest of
/// the pass continues; any other error discards the whole pass.
pub struct DispatchVisitor {
    name: String,
    table: HashMap<NodeKind, TransformFn>,
}

impl DispatchVisitor {
    pub fn new(name: impl Into<String>) -> Self {
        DispatchVisitor {
            name: name.into(),
            table: HashMap::new(),
        }
    }

    /// Register a transform for a node kind, replacing any previous one.
    pub fn on(
        mut self,
        kind: NodeKind,
        transform: impl FnMut(&Arc<Node>, &mut TraversalContext<'_>) -> Result<Transform, RuleError>
            + 'static,
    ) -> Self {
        self.table.insert(kind, Box::new(transform));
        self
    }
}

impl TreeVisitor for DispatchVisitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn leave(
        &mut self,
        node: &Arc<Node>,
        ctx: &mut TraversalContext<'_>,
    ) -> Result<Option<Arc<Node>>, RuleError> {
        let Some(transform) = self.table.get_mut(&node.kind()) else {
            return Ok(None);
        };
        match transform(node, ctx) {
            Ok(Transform::Keep) => Ok(None),
            Ok(Transform::Replace(replacement)) => Ok(Some(replacement)),
            Err(RuleError::Template(err)) => {
                // Fatal to this one edit only.
                debug!(rule = %self.name, error = %err, "edit dropped");
                let code = match err {
                    TemplateError::Parse { .. } => codes::TEMPLATE_PARSE,
                    _ => codes::TEMPLATE_BINDING,
                };
                ctx.add_diagnostic(Diagnostic::error(code, err.to_string()));
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }
}
