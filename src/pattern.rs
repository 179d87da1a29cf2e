//! Method-signature pattern DSL: parser and compiled matcher structure.
//!
//! Patterns select method declarations/invocations by declaring type, simple
//! name, and parameter list:
//!
//! ```text
//! <typeGlob> <nameGlob>(<paramSpecList>)
//! ```
//!
//! ## Grammar
//!
//! - `typeGlob` / `nameGlob` — exact identifier or `*` (wildcard segment)
//! - `paramSpecList` — comma-separated: exact fully-qualified names,
//!   primitive keywords, array suffixes (`Type[]`), the wildcard `*`, or a
//!   single trailing `..` accepting zero or more further parameters
//!
//! ## Examples
//!
//! ```text
//! java.lang.Runtime exec(java.lang.String)
//! * close()
//! pkg.Handler process(java.lang.String, ..)
//! pkg.Util copy(byte[], int)
//! ```
//!
//! Compilation happens once per rule registration; the compiled
//! [`MethodPattern`] is immutable and shared across an entire traversal (and
//! across threads), amortizing the structural parse.

use thiserror::Error;
use winnow::ascii::{multispace0, multispace1};
use winnow::combinator::{alt, repeat, separated};
use winnow::prelude::*;
use winnow::token::take_while;
use winnow::ModalResult;

use crate::types::PrimitiveKind;

/// Error type for pattern compilation.
#[derive(Debug, Error)]
pub enum PatternSyntaxError {
    /// Empty pattern string.
    #[error("empty pattern")]
    Empty,

    /// Malformed pattern with a description of what went wrong.
    #[error("invalid pattern '{input}': {message}")]
    Invalid { input: String, message: String },
}

/// A single-segment glob: an exact identifier or `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Glob {
    /// Matches any single segment.
    Any,
    /// Matches exactly this text.
    Exact(String),
}

impl Glob {
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Glob::Any => true,
            Glob::Exact(text) => text == candidate,
        }
    }
}

/// One parameter position of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSpec {
    /// Exact fully-qualified reference type name.
    Exact(String),
    /// Primitive keyword.
    Primitive(PrimitiveKind),
    /// Array of an inner spec (`Type[]`, `int[][]`).
    Array(Box<ParamSpec>),
    /// Any single parameter of any type.
    Wildcard,
    /// Trailing `..`: zero or more further parameters of any type.
    VarargsTail,
}

/// A compiled method-signature pattern.
///
/// Immutable once compiled; all fields are owned, so a compiled pattern is
/// `Send + Sync` and may be shared read-only across worker threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPattern {
    target_type: Glob,
    name: Glob,
    params: Vec<ParamSpec>,
    match_overrides: bool,
}

impl MethodPattern {
    /// Compile a pattern string.
    ///
    /// Fails with [`PatternSyntaxError`] on unbalanced parentheses, a missing
    /// method name, or a `..` appearing anywhere but last.
    pub fn compile(input: &str) -> Result<Self, PatternSyntaxError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PatternSyntaxError::Empty);
        }
        if trimmed.matches('(').count() != trimmed.matches(')').count() {
            return Err(PatternSyntaxError::Invalid {
                input: input.to_string(),
                message: "unbalanced parentheses".to_string(),
            });
        }

        let (target_type, name, params) =
            parse_pattern
                .parse(trimmed)
                .map_err(|e| PatternSyntaxError::Invalid {
                    input: input.to_string(),
                    message: format!("{:?}", e),
                })?;

        for (i, spec) in params.iter().enumerate() {
            if *spec == ParamSpec::VarargsTail && i + 1 != params.len() {
                return Err(PatternSyntaxError::Invalid {
                    input: input.to_string(),
                    message: "'..' must be the last parameter spec".to_string(),
                });
            }
        }

        Ok(MethodPattern {
            target_type,
            name,
            params,
            match_overrides: false,
        })
    }

    /// Set override sensitivity. Consumed at registration time, before the
    /// pattern is shared; the shared pattern stays immutable.
    pub fn with_match_overrides(mut self, match_overrides: bool) -> Self {
        self.match_overrides = match_overrides;
        self
    }

    pub fn target_type(&self) -> &Glob {
        &self.target_type
    }

    pub fn name(&self) -> &Glob {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn match_overrides(&self) -> bool {
        self.match_overrides
    }

    /// True when the pattern ends in `..`.
    pub fn has_varargs_tail(&self) -> bool {
        self.params.last() == Some(&ParamSpec::VarargsTail)
    }

    /// The fixed parameter prefix (everything before a trailing `..`).
    pub fn fixed_params(&self) -> &[ParamSpec] {
        if self.has_varargs_tail() {
            &self.params[..self.params.len() - 1]
        } else {
            &self.params
        }
    }
}

// ============================================================================
// Parser implementation using winnow
// ============================================================================

fn parse_pattern(input: &mut &str) -> ModalResult<(Glob, Glob, Vec<ParamSpec>)> {
    let _ = multispace0.parse_next(input)?;
    let target_type = parse_type_glob(input)?;
    let _ = multispace1.parse_next(input)?;
    let name = parse_name_glob(input)?;
    let _ = (multispace0, '(').parse_next(input)?;
    let params = parse_params(input)?;
    let _ = (multispace0, ')', multispace0).parse_next(input)?;
    Ok((target_type, name, params))
}

/// Parse the declaring-type glob: `*` or a (possibly qualified) identifier.
fn parse_type_glob(input: &mut &str) -> ModalResult<Glob> {
    alt(('*'.map(|_| Glob::Any), qualified_name.map(Glob::Exact))).parse_next(input)
}

/// Parse the method-name glob: `*` or a simple identifier.
fn parse_name_glob(input: &mut &str) -> ModalResult<Glob> {
    alt((
        '*'.map(|_| Glob::Any),
        simple_name.map(|s: &str| Glob::Exact(s.to_string())),
    ))
    .parse_next(input)
}

fn parse_params(input: &mut &str) -> ModalResult<Vec<ParamSpec>> {
    let params: Vec<ParamSpec> =
        separated(0.., parse_param, (multispace0, ',')).parse_next(input)?;
    Ok(params)
}

fn parse_param(input: &mut &str) -> ModalResult<ParamSpec> {
    let _ = multispace0.parse_next(input)?;
    let base = alt((
        "..".map(|_| ParamSpec::VarargsTail),
        '*'.map(|_| ParamSpec::Wildcard),
        qualified_name.map(|name| match PrimitiveKind::from_keyword(&name) {
            Some(p) => ParamSpec::Primitive(p),
            None => ParamSpec::Exact(name),
        }),
    ))
    .parse_next(input)?;

    // Array suffixes wrap the base spec, innermost first.
    let suffixes: Vec<&str> = repeat(0.., "[]").parse_next(input)?;
    let mut spec = base;
    for _ in suffixes {
        spec = ParamSpec::Array(Box::new(spec));
    }
    Ok(spec)
}

/// A possibly dot-qualified identifier (`pkg.sub.Type`, `int`).
fn qualified_name(input: &mut &str) -> ModalResult<String> {
    take_while(1.., |c: char| {
        c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
    })
    .map(|s: &str| s.to_string())
    .parse_next(input)
}

/// A simple (unqualified) identifier.
fn simple_name<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '$').parse_next(input)
}
