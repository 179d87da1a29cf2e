//! Unified error type for the engine surface.
//!
//! Each module defines its own focused error enum; this bridges them into
//! one type for callers that drive the whole pipeline and want a single `?`
//! chain. The scheduler absorbs rule-scoped failures into diagnostics, so
//! the only errors that reach a caller through [`EngineError`] are the ones
//! that genuinely abort work: bad rule definitions and structural invariant
//! violations.

use thiserror::Error;

use crate::cursor::CursorError;
use crate::pattern::PatternSyntaxError;
use crate::template::TemplateError;
use crate::visitor::WalkError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A method pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] PatternSyntaxError),

    /// A template snippet failed to parse or bind outside a scheduled run.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Cursor frame stack corruption; fatal to the run.
    #[error(transparent)]
    Cursor(#[from] CursorError),

    /// A rule failed in a context with no scheduler to absorb it.
    #[error("rule failed: {0}")]
    Rule(String),
}

impl From<WalkError> for EngineError {
    fn from(err: WalkError) -> Self {
        match err {
            WalkError::Cursor(err) => EngineError::Cursor(err),
            WalkError::Rule(err) => EngineError::Rule(err.to_string()),
        }
    }
}
