//! reweave: a rewrite-rule engine core for source-to-source transformation.
//!
//! The engine operates on persistent, format-preserving syntax trees: every
//! edit produces a new tree that shares all untouched subtrees with its
//! input, and printing a tree reproduces the original text byte for byte
//! wherever no edit touched it.
//!
//! A run wires the pieces together like this:
//!
//! 1. Compile method patterns ([`pattern`]) and templates ([`template`])
//!    once, at rule construction time.
//! 2. Express each rule as a [`visitor::DispatchVisitor`] keyed on
//!    [`tree::NodeKind`], matching call sites with [`matcher`] against the
//!    [`types::TypeTable`] and splicing instantiated fragments with
//!    [`template::splice`].
//! 3. Hand the rules to a [`schedule::Scheduler`], which cycles them to a
//!    fixed point with layered failure isolation and reports a
//!    [`output::RunResult`] per tree.
//!
//! Matching is fail-closed: a call site whose types did not resolve is
//! skipped with a diagnostic, never transformed on a guess.

pub mod cursor;
pub mod error;
pub mod matcher;
pub mod output;
pub mod pattern;
pub mod schedule;
pub mod template;
pub mod tree;
pub mod types;
pub mod visitor;

pub use error::EngineError;
pub use matcher::{match_method, MatchOutcome, MethodRef};
pub use output::{Diagnostic, FileId, RuleOutcome, RunResult, RunSummary, Severity};
pub use pattern::{MethodPattern, PatternSyntaxError};
pub use schedule::Scheduler;
pub use template::{splice, Coordinate, Fragment, Production, SpliceMode, Template, TemplateError};
pub use tree::{Node, NodeId, NodeKind};
pub use types::{Type, TypeDecl, TypeTable};
pub use visitor::{
    walk_tree, DispatchVisitor, RuleError, Transform, TraversalContext, TreeVisitor, VisitResult,
};
