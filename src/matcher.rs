//! Matcher engine: evaluates a compiled pattern against a method reference.
//!
//! The whole check is pure and side-effect free. Checks run in a fixed order:
//! name glob, declaring-type assignability, parameter arity, then each fixed
//! parameter's static type. A method reference missing the type information a
//! check needs never matches; it produces [`MatchOutcome::Skipped`] and a
//! low-severity diagnostic rather than an unsound match.

use tracing::debug;

use crate::output::{codes, Diagnostic};
use crate::pattern::{Glob, MethodPattern, ParamSpec};
use crate::tree::{Node, NodeKind};
use crate::types::{Type, TypeTable};

/// A concrete method reference extracted from a declaration or invocation.
#[derive(Debug, Clone)]
pub struct MethodRef {
    /// Simple method name.
    pub name: String,
    /// Static type of the receiver / declaring type, when attributed.
    pub declaring_type: Option<Type>,
    /// Static type of each argument, when attributed.
    pub arg_types: Vec<Option<Type>>,
}

impl MethodRef {
    pub fn new(name: impl Into<String>) -> Self {
        MethodRef {
            name: name.into(),
            declaring_type: None,
            arg_types: Vec::new(),
        }
    }

    pub fn with_declaring_type(mut self, ty: Type) -> Self {
        self.declaring_type = Some(ty);
        self
    }

    pub fn with_arg(mut self, ty: Option<Type>) -> Self {
        self.arg_types.push(ty);
        self
    }

    /// Extract a method reference from a `MethodInvocation` node.
    ///
    /// Expects the invocation layout produced by the attribution pipeline:
    /// an optional receiver expression, the method name identifier, and an
    /// `ArgumentList`. The declaring type is the receiver's resolved type;
    /// argument types come from the argument nodes themselves.
    pub fn from_invocation(node: &Node) -> Option<MethodRef> {
        if node.kind() != NodeKind::MethodInvocation {
            return None;
        }
        let children = node.children();
        let args_idx = children
            .iter()
            .position(|c| c.kind() == NodeKind::ArgumentList)?;
        let name_node = children[..args_idx]
            .iter()
            .rev()
            .find(|c| c.kind() == NodeKind::Identifier)?;
        let name = name_node.text()?.to_string();

        // The receiver is whatever expression precedes the name identifier.
        let declaring_type = children[..args_idx]
            .iter()
            .take_while(|c| !std::ptr::eq(c.as_ref(), name_node.as_ref()))
            .filter(|c| c.kind() != NodeKind::Token)
            .last()
            .and_then(|receiver| receiver.node_type().cloned());

        let arg_types = children[args_idx]
            .children()
            .iter()
            .filter(|c| c.kind() != NodeKind::Token)
            .map(|arg| arg.node_type().cloned())
            .collect();

        Some(MethodRef {
            name,
            declaring_type,
            arg_types,
        })
    }
}

/// Outcome of a single pattern-vs-method check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched,
    NotMatched,
    /// Fail-closed non-match: type information required by the pattern was
    /// missing from the method reference.
    Skipped,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        *self == MatchOutcome::Matched
    }
}

/// Evaluate `pattern` against `method`.
pub fn match_method(pattern: &MethodPattern, method: &MethodRef, types: &TypeTable) -> MatchOutcome {
    // 1. Name glob.
    if !pattern.name().matches(&method.name) {
        return MatchOutcome::NotMatched;
    }

    // 2. Declaring-type assignability. A reference with no resolved
    //    declaring type never matches, wildcard or not.
    match (pattern.target_type(), &method.declaring_type) {
        (_, None) => return MatchOutcome::Skipped,
        (Glob::Any, Some(_)) => {}
        (Glob::Exact(target), Some(declaring)) => {
            if !types.is_assignable(declaring, target, pattern.match_overrides()) {
                return MatchOutcome::NotMatched;
            }
        }
    }

    // 3. Arity: exact unless the pattern ends in `..`, in which case only
    //    the fixed prefix is required.
    let fixed = pattern.fixed_params();
    if pattern.has_varargs_tail() {
        if method.arg_types.len() < fixed.len() {
            return MatchOutcome::NotMatched;
        }
    } else if method.arg_types.len() != fixed.len() {
        return MatchOutcome::NotMatched;
    }

    // 4. Fixed parameter types.
    for (spec, arg) in fixed.iter().zip(&method.arg_types) {
        match check_param(spec, arg.as_ref()) {
            MatchOutcome::Matched => {}
            other => return other,
        }
    }

    MatchOutcome::Matched
}

/// Evaluate one parameter spec against one argument's static type.
fn check_param(spec: &ParamSpec, arg: Option<&Type>) -> MatchOutcome {
    // Even a wildcard requires the argument's type to be attributed; an
    // unattributed argument fails closed.
    let Some(ty) = arg else {
        return MatchOutcome::Skipped;
    };
    if *spec == ParamSpec::Wildcard {
        return MatchOutcome::Matched;
    }
    let matched = match (spec, ty.erased()) {
        (ParamSpec::Exact(name), _) => ty.erased_name() == *name,
        (ParamSpec::Primitive(p), Type::Primitive(actual)) => p == actual,
        (ParamSpec::Primitive(_), _) => false,
        (ParamSpec::Array(inner), Type::Array(elem)) => {
            check_param(inner, Some(elem.as_ref())) == MatchOutcome::Matched
        }
        (ParamSpec::Array(_), _) => false,
        // `..` never appears in the fixed prefix and wildcard is handled above.
        (ParamSpec::VarargsTail | ParamSpec::Wildcard, _) => true,
    };
    if matched {
        MatchOutcome::Matched
    } else {
        MatchOutcome::NotMatched
    }
}

/// Evaluate a pattern and record a skip diagnostic when type attribution was
/// missing.
pub fn match_method_with_diagnostics(
    pattern: &MethodPattern,
    method: &MethodRef,
    types: &TypeTable,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    match match_method(pattern, method, types) {
        MatchOutcome::Matched => true,
        MatchOutcome::NotMatched => false,
        MatchOutcome::Skipped => {
            debug!(method = %method.name, "skipped: missing type attribution");
            diagnostics.push(Diagnostic::info(
                codes::UNRESOLVED_TYPE_SKIP,
                format!("skipped '{}': missing type attribution", method.name),
            ));
            false
        }
    }
}

impl MethodPattern {
    /// Convenience wrapper over [`match_method`].
    pub fn matches(&self, method: &MethodRef, types: &TypeTable) -> bool {
        match_method(self, method, types).is_match()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveKind, TypeDecl};

    fn table() -> TypeTable {
        let mut t = TypeTable::new();
        t.insert(TypeDecl::class("pkg.A").extending("pkg.B"));
        t.insert(TypeDecl::class("pkg.B").implementing("pkg.C"));
        t.insert(TypeDecl::interface("pkg.C"));
        t.insert(TypeDecl::class("String"));
        t
    }

    fn string_ty() -> Type {
        Type::fq("String")
    }

    mod override_sensitivity {
        use super::*;

        #[test]
        fn interface_method_matches_subclass_with_overrides() {
            // A extends B, B implements C: a pattern targeting C's method
            // matches a call statically typed A only with match_overrides.
            let types = table();
            let method = MethodRef::new("run").with_declaring_type(Type::fq("pkg.A"));

            let with = MethodPattern::compile("pkg.C run()")
                .unwrap()
                .with_match_overrides(true);
            assert_eq!(match_method(&with, &method, &types), MatchOutcome::Matched);

            let without = MethodPattern::compile("pkg.C run()").unwrap();
            assert_eq!(
                match_method(&without, &method, &types),
                MatchOutcome::NotMatched
            );
        }
    }

    mod fail_closed {
        use super::*;

        #[test]
        fn unresolved_declaring_type_never_matches() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A run()").unwrap();
            let method = MethodRef::new("run");
            assert_eq!(
                match_method(&pattern, &method, &types),
                MatchOutcome::Skipped
            );
        }

        #[test]
        fn unresolved_argument_type_skips() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A run(String)").unwrap();
            let method = MethodRef::new("run")
                .with_declaring_type(Type::fq("pkg.A"))
                .with_arg(None);
            assert_eq!(
                match_method(&pattern, &method, &types),
                MatchOutcome::Skipped
            );
        }

        #[test]
        fn wildcard_declaring_type_still_requires_attribution() {
            // `* run()` is a wildcard over *resolved* declaring types; a
            // reference with no type attribution is skipped, not matched.
            let types = table();
            let pattern = MethodPattern::compile("* run()").unwrap();
            let method = MethodRef::new("run");
            assert_eq!(
                match_method(&pattern, &method, &types),
                MatchOutcome::Skipped
            );

            let mut diagnostics = Vec::new();
            assert!(!match_method_with_diagnostics(
                &pattern,
                &method,
                &types,
                &mut diagnostics
            ));
            assert_eq!(diagnostics[0].code, codes::UNRESOLVED_TYPE_SKIP);
        }

        #[test]
        fn wildcard_param_still_requires_attribution() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A run(*)").unwrap();
            let method = MethodRef::new("run")
                .with_declaring_type(Type::fq("pkg.A"))
                .with_arg(None);
            assert_eq!(
                match_method(&pattern, &method, &types),
                MatchOutcome::Skipped
            );

            let typed = MethodRef::new("run")
                .with_declaring_type(Type::fq("pkg.A"))
                .with_arg(Some(string_ty()));
            assert_eq!(match_method(&pattern, &typed, &types), MatchOutcome::Matched);
        }

        #[test]
        fn skip_produces_info_diagnostic() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A run()").unwrap();
            let method = MethodRef::new("run");
            let mut diagnostics = Vec::new();
            assert!(!match_method_with_diagnostics(
                &pattern,
                &method,
                &types,
                &mut diagnostics
            ));
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].code, codes::UNRESOLVED_TYPE_SKIP);
        }
    }

    mod varargs {
        use super::*;

        fn call_with_args(args: Vec<Option<Type>>) -> MethodRef {
            let mut m = MethodRef::new("method").with_declaring_type(Type::fq("pkg.A"));
            for a in args {
                m = m.with_arg(a);
            }
            m
        }

        #[test]
        fn tail_accepts_any_trailing_arity() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A method(String, ..)").unwrap();

            for extra in [0usize, 1, 4] {
                let mut args = vec![Some(string_ty())];
                args.extend((0..extra).map(|_| Some(Type::Primitive(PrimitiveKind::Int))));
                assert!(
                    pattern.matches(&call_with_args(args), &types),
                    "expected match with {} trailing args",
                    extra
                );
            }
        }

        #[test]
        fn tail_still_checks_fixed_prefix() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A method(String, ..)").unwrap();
            let call = call_with_args(vec![Some(Type::Primitive(PrimitiveKind::Int))]);
            assert!(!pattern.matches(&call, &types));
        }

        #[test]
        fn tail_requires_fixed_prefix_present() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A method(String, ..)").unwrap();
            let call = call_with_args(vec![]);
            assert!(!pattern.matches(&call, &types));
        }
    }

    mod param_specs {
        use super::*;

        #[test]
        fn exact_arity_required_without_tail() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A method(String)").unwrap();
            let call = MethodRef::new("method")
                .with_declaring_type(Type::fq("pkg.A"))
                .with_arg(Some(string_ty()))
                .with_arg(Some(string_ty()));
            assert!(!pattern.matches(&call, &types));
        }

        #[test]
        fn array_param_matches_array_argument() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A method(byte[])").unwrap();
            let call = MethodRef::new("method")
                .with_declaring_type(Type::fq("pkg.A"))
                .with_arg(Some(Type::Array(Box::new(Type::Primitive(
                    PrimitiveKind::Byte,
                )))));
            assert!(pattern.matches(&call, &types));

            let scalar = MethodRef::new("method")
                .with_declaring_type(Type::fq("pkg.A"))
                .with_arg(Some(Type::Primitive(PrimitiveKind::Byte)));
            assert!(!pattern.matches(&scalar, &types));
        }

        #[test]
        fn parameterized_argument_matches_by_raw_type() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A method(java.util.List)").unwrap();
            let call = MethodRef::new("method")
                .with_declaring_type(Type::fq("pkg.A"))
                .with_arg(Some(Type::Parameterized {
                    raw: Box::new(Type::fq("java.util.List")),
                    args: vec![string_ty()],
                }));
            assert!(pattern.matches(&call, &types));
        }

        #[test]
        fn name_glob_checked_first() {
            let types = table();
            let pattern = MethodPattern::compile("pkg.A run()").unwrap();
            let method = MethodRef::new("walk"); // no declaring type either
            assert_eq!(
                match_method(&pattern, &method, &types),
                MatchOutcome::NotMatched
            );
        }
    }

    mod from_invocation {
        use super::*;
        use std::sync::Arc;

        #[test]
        fn extracts_receiver_type_name_and_args() {
            let invocation = Node::new(NodeKind::MethodInvocation)
                .with_child(
                    Node::new(NodeKind::Identifier)
                        .with_text("handler")
                        .with_type(Type::fq("pkg.A")),
                )
                .with_child(Node::token(".", ""))
                .with_child(Node::new(NodeKind::Identifier).with_text("method"))
                .with_child(
                    Node::new(NodeKind::ArgumentList)
                        .with_child(Node::token("(", ""))
                        .with_child(
                            Node::new(NodeKind::Literal)
                                .with_text("\"x\"")
                                .with_type(Type::fq("String")),
                        )
                        .with_child(Node::token(")", "")),
                );

            let method = MethodRef::from_invocation(&invocation).unwrap();
            assert_eq!(method.name, "method");
            assert_eq!(method.declaring_type, Some(Type::fq("pkg.A")));
            assert_eq!(method.arg_types, vec![Some(Type::fq("String"))]);
        }

        #[test]
        fn non_invocation_returns_none() {
            let node = Node::new(NodeKind::Identifier).with_text("x");
            assert!(MethodRef::from_invocation(&node).is_none());
        }

        #[test]
        fn receiverless_call_has_no_declaring_type() {
            let invocation = Node::new(NodeKind::MethodInvocation)
                .with_child(Node::new(NodeKind::Identifier).with_text("helper"))
                .with_child(Arc::new(
                    Node::new(NodeKind::ArgumentList)
                        .with_child(Node::token("(", ""))
                        .with_child(Node::token(")", "")),
                ));
            let method = MethodRef::from_invocation(&invocation).unwrap();
            assert_eq!(method.name, "helper");
            assert!(method.declaring_type.is_none());
        }
    }
}
