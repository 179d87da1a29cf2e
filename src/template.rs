//! Template engine: parse placeholder-bearing snippets, instantiate them
//! against bound arguments, and splice the result into a tree.
//!
//! A snippet is parsed once per rule registration as a fragment of the
//! grammar production inferred from its shape (block, argument list,
//! statement, or expression), with numbered `#{n}` slots left unresolved.
//! [`Template::instantiate`] checks each bound argument against its slot's
//! declared type constraint, substitutes it, and renumbers every synthesized
//! node with a fresh identity so nothing aliases the surrounding tree.
//!
//! [`splice`] is all-or-nothing: it either produces a well-formed new
//! persistent tree or returns an error while the caller's original tree is
//! untouched. After the structural edit, a local reformat recomputes the
//! leading trivia of only the spliced region from its new surroundings;
//! untouched siblings print byte-identical.

use std::sync::Arc;

use thiserror::Error;

use crate::tree::{Node, NodeId, NodeKind};
use crate::types::TypeTable;

/// Error type for template parsing, binding, and splicing.
///
/// All variants are fatal to one specific edit only; other matches of the
/// same rule are still attempted.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The snippet is not a well-formed fragment.
    #[error("template parse error: {message}")]
    Parse { message: String },

    /// Slot/argument mismatch at instantiation time.
    #[error("template binding error: {message}")]
    Binding { message: String },

    /// The splice coordinate does not exist in the target tree.
    #[error("splice target not found in tree")]
    TargetNotFound,
}

impl TemplateError {
    fn parse(message: impl Into<String>) -> Self {
        TemplateError::Parse {
            message: message.into(),
        }
    }

    fn binding(message: impl Into<String>) -> Self {
        TemplateError::Binding {
            message: message.into(),
        }
    }
}

/// Grammar production a snippet was parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    Expression,
    Statement,
    Block,
    ArgumentList,
}

/// Where and how a fragment is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceMode {
    Replace,
    InsertBefore,
    InsertAfter,
    FirstChildOfBlock,
    LastChildOfBlock,
    ReplaceArgumentList,
}

/// Target node plus application mode.
#[derive(Debug, Clone, Copy)]
pub struct Coordinate {
    pub target: NodeId,
    pub mode: SpliceMode,
}

impl Coordinate {
    pub fn new(target: NodeId, mode: SpliceMode) -> Self {
        Coordinate { target, mode }
    }
}

/// A compiled snippet with unresolved slots.
///
/// Immutable once parsed; shared freely across matches and threads.
#[derive(Debug)]
pub struct Template {
    source: String,
    production: Production,
    root: Arc<Node>,
    slot_count: usize,
    constraints: Vec<Option<String>>,
    imports: Vec<String>,
}

/// A ready-to-splice instantiated fragment.
#[derive(Debug)]
pub struct Fragment {
    root: Arc<Node>,
    production: Production,
    imports: Vec<String>,
}

impl Fragment {
    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn production(&self) -> Production {
        self.production
    }

    /// Fully qualified names the snippet requires to be imported. The engine
    /// has no printing surface; the caller maintains the declaration list.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }
}

impl Template {
    /// Parse a snippet with the given number of slots.
    ///
    /// The production is inferred from the snippet's shape: `{...}` parses
    /// as a block, `(...)` as an argument list, a trailing `;` as a
    /// statement, anything else as an expression. Every slot `0..slot_count`
    /// must be referenced at least once.
    pub fn parse(source: &str, slot_count: usize) -> Result<Self, TemplateError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(TemplateError::parse("empty snippet"));
        }
        let production = if trimmed.starts_with('{') {
            Production::Block
        } else if trimmed.starts_with('(') {
            Production::ArgumentList
        } else if trimmed.ends_with(';') {
            Production::Statement
        } else {
            Production::Expression
        };

        let tokens = lex(trimmed)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = match production {
            Production::Block => parser.parse_block()?,
            Production::ArgumentList => parser.parse_argument_list()?,
            Production::Statement => parser.parse_statement()?,
            Production::Expression => parser.parse_expression()?,
        };
        if parser.pos != parser.tokens.len() {
            return Err(TemplateError::parse("unexpected trailing tokens"));
        }
        let root = Arc::new(root);

        // Validate slot references against the declared count.
        let mut referenced = vec![false; slot_count];
        let mut out_of_range = None;
        root.for_each(&mut |node| {
            if node.kind() == NodeKind::Placeholder {
                let idx = placeholder_index(node);
                match referenced.get_mut(idx) {
                    Some(seen) => *seen = true,
                    None => out_of_range = Some(idx),
                }
            }
        });
        if let Some(idx) = out_of_range {
            return Err(TemplateError::parse(format!(
                "slot #{{{}}} out of range for slot count {}",
                idx, slot_count
            )));
        }
        if let Some(idx) = referenced.iter().position(|seen| !seen) {
            return Err(TemplateError::parse(format!(
                "slot #{{{}}} is never referenced",
                idx
            )));
        }

        Ok(Template {
            source: trimmed.to_string(),
            production,
            root,
            slot_count,
            constraints: vec![None; slot_count],
            imports: Vec::new(),
        })
    }

    /// Declare a fully qualified name the snippet depends on; carried through
    /// to every [`Fragment`] this template produces.
    pub fn with_import(mut self, name: impl Into<String>) -> Self {
        self.imports.push(name.into());
        self
    }

    /// Declare a type constraint for a slot: the bound argument's resolved
    /// type must be assignable to `type_name`.
    pub fn with_constraint(
        mut self,
        slot: usize,
        type_name: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        match self.constraints.get_mut(slot) {
            Some(c) => {
                *c = Some(type_name.into());
                Ok(self)
            }
            None => Err(TemplateError::binding(format!(
                "no slot {} to constrain (slot count {})",
                slot, self.slot_count
            ))),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn production(&self) -> Production {
        self.production
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Bind arguments to slots, producing a ready-to-splice fragment.
    ///
    /// Every synthesized node gets a fresh identity. A count mismatch, an
    /// unsatisfied constraint, or an argument with no resolved type (when a
    /// constraint requires one) aborts the instantiation; the caller's tree
    /// is untouched.
    pub fn instantiate(
        &self,
        args: &[Arc<Node>],
        types: &TypeTable,
    ) -> Result<Fragment, TemplateError> {
        if args.len() != self.slot_count {
            return Err(TemplateError::binding(format!(
                "expected {} arguments, got {}",
                self.slot_count,
                args.len()
            )));
        }
        for (slot, constraint) in self.constraints.iter().enumerate() {
            let Some(target) = constraint else { continue };
            let Some(arg_type) = args[slot].node_type() else {
                return Err(TemplateError::binding(format!(
                    "argument for slot {} has no resolved type (constraint '{}')",
                    slot, target
                )));
            };
            if !types.is_assignable(arg_type, target, true) {
                return Err(TemplateError::binding(format!(
                    "argument for slot {} is not assignable to '{}'",
                    slot, target
                )));
            }
        }

        let substituted = substitute(&self.root, args);
        Ok(Fragment {
            root: substituted.with_fresh_ids(),
            production: self.production,
            imports: self.imports.clone(),
        })
    }
}

/// Replace placeholder nodes with (copies of) their bound arguments.
fn substitute(node: &Arc<Node>, args: &[Arc<Node>]) -> Arc<Node> {
    if node.kind() == NodeKind::Placeholder {
        // Index range was validated at parse time.
        let idx = placeholder_index(node);
        return args[idx].with_first_leaf_leading(node.leading());
    }
    if node.children().is_empty() {
        return node.clone();
    }
    let children = node
        .children()
        .iter()
        .map(|child| substitute(child, args))
        .collect();
    node.with_children_replaced(children)
}

fn placeholder_index(node: &Node) -> usize {
    node.text()
        .and_then(|t| t.parse().ok())
        .unwrap_or_default()
}

// ============================================================================
// Splicing
// ============================================================================

/// Apply a fragment at a coordinate, producing a new persistent tree.
///
/// The edit is atomic: on any error the original tree is returned untouched
/// (the caller still holds it; no node is ever mutated in place). After the
/// structural edit, the spliced region's leading trivia is recomputed from
/// its new context; nothing else is reformatted.
pub fn splice(
    tree: &Arc<Node>,
    coordinate: &Coordinate,
    fragment: &Fragment,
) -> Result<Arc<Node>, TemplateError> {
    let path = tree.path_to(coordinate.target).ok_or(TemplateError::TargetNotFound)?;
    splice_rec(tree, &path, coordinate.mode, fragment)
}

fn splice_rec(
    node: &Arc<Node>,
    path: &[usize],
    mode: SpliceMode,
    fragment: &Fragment,
) -> Result<Arc<Node>, TemplateError> {
    // Insertions happen in the parent's child list, so they are handled one
    // level above the target.
    if path.len() == 1 && matches!(mode, SpliceMode::InsertBefore | SpliceMode::InsertAfter) {
        let idx = path[0];
        let sibling = &node.children()[idx];
        let leading = first_leaf(sibling).leading().to_string();
        let inserted = fragment.root.with_first_leaf_leading(&leading);

        let mut children = node.children().to_vec();
        let at = match mode {
            SpliceMode::InsertBefore => idx,
            _ => idx + 1,
        };
        children.insert(at, inserted);
        return Ok(node.with_children_replaced(children));
    }

    if let Some((&idx, rest)) = path.split_first() {
        let child = node
            .children()
            .get(idx)
            .ok_or(TemplateError::TargetNotFound)?;
        let new_child = splice_rec(child, rest, mode, fragment)?;
        let mut children = node.children().to_vec();
        children[idx] = new_child;
        return Ok(node.with_children_replaced(children));
    }

    // Path is empty: `node` is the target itself.
    match mode {
        SpliceMode::Replace => {
            let leading = first_leaf(node).leading().to_string();
            Ok(fragment.root.with_first_leaf_leading(&leading))
        }

        SpliceMode::ReplaceArgumentList => {
            if fragment.production != Production::ArgumentList {
                return Err(TemplateError::binding(
                    "replace-argument-list requires an argument-list fragment",
                ));
            }
            let args_idx = node
                .children()
                .iter()
                .position(|c| c.kind() == NodeKind::ArgumentList)
                .ok_or_else(|| {
                    TemplateError::binding("target has no argument list to replace")
                })?;
            // The opening parenthesis stays attached to the callee.
            let mut children = node.children().to_vec();
            children[args_idx] = fragment.root.with_first_leaf_leading("");
            Ok(node.with_children_replaced(children))
        }

        SpliceMode::FirstChildOfBlock | SpliceMode::LastChildOfBlock => {
            if node.kind() != NodeKind::Block {
                return Err(TemplateError::binding("target is not a block"));
            }
            if fragment.production != Production::Statement {
                return Err(TemplateError::binding(
                    "block insertion requires a statement fragment",
                ));
            }
            let children = node.children();
            let open = children
                .iter()
                .position(|c| c.kind() == NodeKind::Token && c.text() == Some("{"))
                .ok_or_else(|| TemplateError::binding("malformed block: no opening brace"))?;
            let close = children
                .iter()
                .rposition(|c| c.kind() == NodeKind::Token && c.text() == Some("}"))
                .ok_or_else(|| TemplateError::binding("malformed block: no closing brace"))?;

            let leading = block_statement_leading(node, open, close);
            let inserted = fragment.root.with_first_leaf_leading(&leading);
            let at = match mode {
                SpliceMode::FirstChildOfBlock => open + 1,
                _ => close,
            };
            let mut children = children.to_vec();
            children.insert(at, inserted);
            Ok(node.with_children_replaced(children))
        }

        SpliceMode::InsertBefore | SpliceMode::InsertAfter => {
            Err(TemplateError::binding("cannot insert relative to the root"))
        }
    }
}

/// Leading trivia for a statement inserted into a block: copy an existing
/// statement's indentation, or derive one level from the closing brace.
fn block_statement_leading(block: &Node, open: usize, close: usize) -> String {
    for child in &block.children()[open + 1..close] {
        if child.kind() != NodeKind::Token {
            return first_leaf(child).leading().to_string();
        }
    }
    let brace_indent = indent_of(block.children()[close].leading());
    format!("\n{}    ", brace_indent)
}

fn first_leaf(node: &Node) -> &Node {
    match node.children().first() {
        Some(child) => first_leaf(child),
        None => node,
    }
}

/// The indentation part of a leading-trivia string: everything after the
/// last newline.
fn indent_of(leading: &str) -> &str {
    match leading.rfind('\n') {
        Some(pos) => &leading[pos + 1..],
        None => leading,
    }
}

// ============================================================================
// Snippet lexer and fragment parser
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokKind {
    Ident,
    Number,
    Str,
    Punct,
    Placeholder(usize),
}

#[derive(Debug, Clone)]
struct Tok {
    leading: String,
    text: String,
    kind: TokKind,
}

fn lex(source: &str) -> Result<Vec<Tok>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    loop {
        let trimmed = rest.trim_start();
        let leading = rest[..rest.len() - trimmed.len()].to_string();
        rest = trimmed;
        let Some(c) = rest.chars().next() else {
            break;
        };

        if let Some(after) = rest.strip_prefix("#{") {
            let end = after
                .find('}')
                .ok_or_else(|| TemplateError::parse("unterminated placeholder"))?;
            let idx: usize = after[..end]
                .parse()
                .map_err(|_| TemplateError::parse(format!("bad slot index '{}'", &after[..end])))?;
            tokens.push(Tok {
                leading,
                text: format!("#{{{}}}", idx),
                kind: TokKind::Placeholder(idx),
            });
            rest = &after[end + 1..];
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let len = rest
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '$'))
                .unwrap_or(rest.len());
            tokens.push(Tok {
                leading,
                text: rest[..len].to_string(),
                kind: TokKind::Ident,
            });
            rest = &rest[len..];
        } else if c.is_ascii_digit() {
            let len = rest.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(rest.len());
            tokens.push(Tok {
                leading,
                text: rest[..len].to_string(),
                kind: TokKind::Number,
            });
            rest = &rest[len..];
        } else if c == '"' {
            let end = string_literal_end(rest)
                .ok_or_else(|| TemplateError::parse("unterminated string literal"))?;
            tokens.push(Tok {
                leading,
                text: rest[..end + 1].to_string(),
                kind: TokKind::Str,
            });
            rest = &rest[end + 1..];
        } else if "(){}.,;".contains(c) {
            tokens.push(Tok {
                leading,
                text: c.to_string(),
                kind: TokKind::Punct,
            });
            rest = &rest[c.len_utf8()..];
        } else {
            return Err(TemplateError::parse(format!("unexpected character '{}'", c)));
        }
    }
    Ok(tokens)
}

/// Byte index of the closing quote of a string literal starting at byte 0,
/// honoring backslash escapes (`\"`, `\\`).
fn string_literal_end(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn peek_punct(&self, text: &str) -> bool {
        matches!(self.peek(), Some(t) if t.kind == TokKind::Punct && t.text == text)
    }

    fn next(&mut self) -> Result<Tok, TemplateError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| TemplateError::parse("unexpected end of snippet"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect_punct(&mut self, text: &str) -> Result<Tok, TemplateError> {
        let tok = self.next()?;
        if tok.kind == TokKind::Punct && tok.text == text {
            Ok(tok)
        } else {
            Err(TemplateError::parse(format!(
                "expected '{}', found '{}'",
                text, tok.text
            )))
        }
    }

    fn parse_block(&mut self) -> Result<Node, TemplateError> {
        let open = self.expect_punct("{")?;
        let mut block = Node::new(NodeKind::Block).with_child(Node::token(open.text, open.leading));
        while !self.peek_punct("}") {
            if self.peek().is_none() {
                return Err(TemplateError::parse("unterminated block"));
            }
            block = block.with_child(self.parse_statement()?);
        }
        let close = self.expect_punct("}")?;
        Ok(block.with_child(Node::token(close.text, close.leading)))
    }

    fn parse_statement(&mut self) -> Result<Node, TemplateError> {
        let expr = self.parse_expression()?;
        let semi = self.expect_punct(";")?;
        Ok(Node::new(NodeKind::ExpressionStatement)
            .with_child(expr)
            .with_child(Node::token(semi.text, semi.leading)))
    }

    fn parse_argument_list(&mut self) -> Result<Node, TemplateError> {
        let open = self.expect_punct("(")?;
        let mut list =
            Node::new(NodeKind::ArgumentList).with_child(Node::token(open.text, open.leading));
        if !self.peek_punct(")") {
            loop {
                list = list.with_child(self.parse_expression()?);
                if self.peek_punct(",") {
                    let comma = self.expect_punct(",")?;
                    list = list.with_child(Node::token(comma.text, comma.leading));
                } else {
                    break;
                }
            }
        }
        let close = self.expect_punct(")")?;
        Ok(list.with_child(Node::token(close.text, close.leading)))
    }

    fn parse_expression(&mut self) -> Result<Node, TemplateError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.peek_punct(".") {
                let dot = self.expect_punct(".")?;
                let name = self.next()?;
                if name.kind != TokKind::Ident {
                    return Err(TemplateError::parse(format!(
                        "expected member name after '.', found '{}'",
                        name.text
                    )));
                }
                let name_node = Node::new(NodeKind::Identifier)
                    .with_text(name.text)
                    .with_leading(name.leading);
                if self.peek_punct("(") {
                    let args = self.parse_argument_list()?;
                    expr = Node::new(NodeKind::MethodInvocation)
                        .with_child(expr)
                        .with_child(Node::token(dot.text, dot.leading))
                        .with_child(name_node)
                        .with_child(args);
                } else {
                    expr = Node::new(NodeKind::FieldAccess)
                        .with_child(expr)
                        .with_child(Node::token(dot.text, dot.leading))
                        .with_child(name_node);
                }
            } else if self.peek_punct("(") && expr.kind() == NodeKind::Identifier {
                let args = self.parse_argument_list()?;
                expr = Node::new(NodeKind::MethodInvocation)
                    .with_child(expr)
                    .with_child(args);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Node, TemplateError> {
        let tok = self.next()?;
        match tok.kind {
            TokKind::Placeholder(idx) => Ok(Node::new(NodeKind::Placeholder)
                .with_text(idx.to_string())
                .with_leading(tok.leading)),
            TokKind::Ident => Ok(Node::new(NodeKind::Identifier)
                .with_text(tok.text)
                .with_leading(tok.leading)),
            TokKind::Number | TokKind::Str => Ok(Node::new(NodeKind::Literal)
                .with_text(tok.text)
                .with_leading(tok.leading)),
            TokKind::Punct => Err(TemplateError::parse(format!(
                "unexpected '{}' in expression",
                tok.text
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeKind;
    use crate::types::{Type, TypeDecl};

    fn types_with_string() -> TypeTable {
        let mut t = TypeTable::new();
        t.insert(TypeDecl::class("java.lang.String"));
        t
    }

    fn literal(text: &str, ty: &str) -> Arc<Node> {
        Arc::new(
            Node::new(NodeKind::Literal)
                .with_text(text)
                .with_type(Type::fq(ty)),
        )
    }

    mod parsing {
        use super::*;

        #[test]
        fn expression_snippet_roundtrips() {
            let t = Template::parse("obj.call(#{0}, 42)", 1).unwrap();
            assert_eq!(t.production(), Production::Expression);
            assert_eq!(t.slot_count(), 1);
        }

        #[test]
        fn production_inference() {
            assert_eq!(
                Template::parse("{ a.b(); }", 0).unwrap().production(),
                Production::Block
            );
            assert_eq!(
                Template::parse("(#{0})", 1).unwrap().production(),
                Production::ArgumentList
            );
            assert_eq!(
                Template::parse("log.warn(#{0});", 1).unwrap().production(),
                Production::Statement
            );
            assert_eq!(
                Template::parse("#{0}", 1).unwrap().production(),
                Production::Expression
            );
        }

        #[test]
        fn unreferenced_slot_is_a_parse_error() {
            let err = Template::parse("foo(#{0})", 2).unwrap_err();
            assert!(err.to_string().contains("never referenced"));
        }

        #[test]
        fn out_of_range_slot_is_a_parse_error() {
            let err = Template::parse("foo(#{3})", 1).unwrap_err();
            assert!(err.to_string().contains("out of range"));
        }

        #[test]
        fn unterminated_string_is_a_parse_error() {
            assert!(Template::parse("foo(\"oops)", 0).is_err());
        }

        #[test]
        fn escaped_quotes_stay_inside_the_string_literal() {
            let fragment = Template::parse(r#"log.warn("a\"b", "c\\")"#, 0)
                .unwrap()
                .instantiate(&[], &TypeTable::new())
                .unwrap();
            assert_eq!(fragment.root().print(), r#"log.warn("a\"b", "c\\")"#);
        }

        #[test]
        fn escape_before_closing_quote_does_not_terminate() {
            assert!(Template::parse(r#"foo("a\")"#, 0).is_err());
        }

        #[test]
        fn unbalanced_block_is_a_parse_error() {
            assert!(Template::parse("{ a(); ", 0).is_err());
        }
    }

    mod instantiation {
        use super::*;

        #[test]
        fn substitutes_and_renumbers() {
            let types = types_with_string();
            let template = Template::parse("log.warn(#{0})", 1).unwrap();
            let arg = literal("\"oops\"", "java.lang.String");
            let fragment = template.instantiate(&[arg.clone()], &types).unwrap();

            assert_eq!(fragment.root().print(), "log.warn(\"oops\")");
            // Every synthesized node has a fresh identity.
            let mut ids = Vec::new();
            fragment.root().for_each(&mut |n| ids.push(n.id()));
            assert!(!ids.contains(&arg.id()));
        }

        #[test]
        fn repeated_slot_yields_distinct_identities() {
            let types = types_with_string();
            let template = Template::parse("eq(#{0}, #{0})", 1).unwrap();
            let arg = literal("\"x\"", "java.lang.String");
            let fragment = template.instantiate(&[arg], &types).unwrap();
            assert_eq!(fragment.root().print(), "eq(\"x\", \"x\")");

            let mut literal_ids = Vec::new();
            fragment.root().for_each(&mut |n| {
                if n.kind() == NodeKind::Literal {
                    literal_ids.push(n.id());
                }
            });
            assert_eq!(literal_ids.len(), 2);
            assert_ne!(literal_ids[0], literal_ids[1]);
        }

        #[test]
        fn fragments_carry_template_imports() {
            let types = types_with_string();
            let template = Template::parse("Collections.emptyList()", 0)
                .unwrap()
                .with_import("java.util.Collections");
            let fragment = template.instantiate(&[], &types).unwrap();
            assert_eq!(fragment.imports(), ["java.util.Collections"]);
        }

        #[test]
        fn argument_count_mismatch_is_a_binding_error() {
            let types = types_with_string();
            let template = Template::parse("foo(#{0})", 1).unwrap();
            let err = template.instantiate(&[], &types).unwrap_err();
            assert!(matches!(err, TemplateError::Binding { .. }));
        }

        #[test]
        fn constraint_rejects_wrong_type() {
            let mut types = types_with_string();
            types.insert(TypeDecl::class("java.lang.Integer"));
            let template = Template::parse("foo(#{0})", 1)
                .unwrap()
                .with_constraint(0, "java.lang.String")
                .unwrap();

            let ok = literal("\"s\"", "java.lang.String");
            assert!(template.instantiate(&[ok], &types).is_ok());

            let bad = literal("1", "java.lang.Integer");
            assert!(matches!(
                template.instantiate(&[bad], &types),
                Err(TemplateError::Binding { .. })
            ));
        }

        #[test]
        fn constraint_fails_closed_on_untyped_argument() {
            let types = types_with_string();
            let template = Template::parse("foo(#{0})", 1)
                .unwrap()
                .with_constraint(0, "java.lang.String")
                .unwrap();
            let untyped = Arc::new(Node::new(NodeKind::Literal).with_text("\"s\""));
            assert!(matches!(
                template.instantiate(&[untyped], &types),
                Err(TemplateError::Binding { .. })
            ));
        }
    }

    mod splicing {
        use super::*;

        /// `{\n    a.b();\n}` as a block node with token children.
        fn block_with_statement() -> Arc<Node> {
            Arc::new(
                Node::new(NodeKind::Block)
                    .with_child(Node::token("{", ""))
                    .with_child(
                        Node::new(NodeKind::ExpressionStatement)
                            .with_child(
                                Node::new(NodeKind::MethodInvocation)
                                    .with_child(
                                        Node::new(NodeKind::Identifier)
                                            .with_text("a")
                                            .with_leading("\n    "),
                                    )
                                    .with_child(Node::token(".", ""))
                                    .with_child(Node::new(NodeKind::Identifier).with_text("b"))
                                    .with_child(
                                        Node::new(NodeKind::ArgumentList)
                                            .with_child(Node::token("(", ""))
                                            .with_child(Node::token(")", "")),
                                    ),
                            )
                            .with_child(Node::token(";", "")),
                    )
                    .with_child(Node::token("}", "\n")),
            )
        }

        fn statement_fragment(source: &str) -> Fragment {
            Template::parse(source, 0)
                .unwrap()
                .instantiate(&[], &TypeTable::new())
                .unwrap()
        }

        #[test]
        fn replace_preserves_target_leading() {
            let block = block_with_statement();
            let stmt = &block.children()[1];
            let fragment = statement_fragment("c.d();");
            let out = splice(
                &block,
                &Coordinate::new(stmt.id(), SpliceMode::Replace),
                &fragment,
            )
            .unwrap();
            assert_eq!(out.print(), "{\n    c.d();\n}");
        }

        #[test]
        fn insert_after_copies_sibling_indentation() {
            let block = block_with_statement();
            let stmt = &block.children()[1];
            let fragment = statement_fragment("c.d();");
            let out = splice(
                &block,
                &Coordinate::new(stmt.id(), SpliceMode::InsertAfter),
                &fragment,
            )
            .unwrap();
            assert_eq!(out.print(), "{\n    a.b();\n    c.d();\n}");
        }

        #[test]
        fn insert_before_keeps_existing_statement_intact() {
            let block = block_with_statement();
            let stmt = &block.children()[1];
            let fragment = statement_fragment("c.d();");
            let out = splice(
                &block,
                &Coordinate::new(stmt.id(), SpliceMode::InsertBefore),
                &fragment,
            )
            .unwrap();
            assert_eq!(out.print(), "{\n    c.d();\n    a.b();\n}");
        }

        #[test]
        fn first_and_last_child_of_block() {
            let block = block_with_statement();
            let fragment = statement_fragment("first.call();");
            let out = splice(
                &block,
                &Coordinate::new(block.id(), SpliceMode::FirstChildOfBlock),
                &fragment,
            )
            .unwrap();
            assert_eq!(out.print(), "{\n    first.call();\n    a.b();\n}");

            let fragment = statement_fragment("last.call();");
            let out = splice(
                &block,
                &Coordinate::new(block.id(), SpliceMode::LastChildOfBlock),
                &fragment,
            )
            .unwrap();
            assert_eq!(out.print(), "{\n    a.b();\n    last.call();\n}");
        }

        #[test]
        fn empty_block_derives_indentation_from_brace() {
            let block = Arc::new(
                Node::new(NodeKind::Block)
                    .with_child(Node::token("{", ""))
                    .with_child(Node::token("}", "\n    ")),
            );
            let fragment = statement_fragment("x.y();");
            let out = splice(
                &block,
                &Coordinate::new(block.id(), SpliceMode::FirstChildOfBlock),
                &fragment,
            )
            .unwrap();
            assert_eq!(out.print(), "{\n        x.y();\n    }");
        }

        #[test]
        fn replace_argument_list_touches_only_the_list() {
            let block = block_with_statement();
            let invocation = block.children()[1].children()[0].clone();
            let types = types_with_string();
            let fragment = Template::parse("(#{0})", 1)
                .unwrap()
                .instantiate(&[literal("\"x\"", "java.lang.String")], &types)
                .unwrap();
            let out = splice(
                &block,
                &Coordinate::new(invocation.id(), SpliceMode::ReplaceArgumentList),
                &fragment,
            )
            .unwrap();
            assert_eq!(out.print(), "{\n    a.b(\"x\");\n}");
            // Original tree untouched.
            assert_eq!(block.print(), "{\n    a.b();\n}");
        }

        #[test]
        fn missing_target_is_an_error_and_tree_is_untouched() {
            let block = block_with_statement();
            let fragment = statement_fragment("c.d();");
            let before = block.print();
            let err = splice(
                &block,
                &Coordinate::new(NodeId::fresh(), SpliceMode::Replace),
                &fragment,
            )
            .unwrap_err();
            assert!(matches!(err, TemplateError::TargetNotFound));
            assert_eq!(block.print(), before);
        }

        #[test]
        fn replace_argument_list_requires_list_fragment() {
            let block = block_with_statement();
            let invocation = block.children()[1].children()[0].clone();
            let fragment = statement_fragment("c.d();");
            assert!(splice(
                &block,
                &Coordinate::new(invocation.id(), SpliceMode::ReplaceArgumentList),
                &fragment,
            )
            .is_err());
        }
    }
}
