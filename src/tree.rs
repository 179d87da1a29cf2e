//! Persistent tree model: nodes, identity, and format-preserving printing.
//!
//! Trees produced by the (external) parser/type-attribution pipeline are
//! represented as `Arc`-shared [`Node`]s. Edits never mutate a published node:
//! every rewrite builds new nodes along the edited spine and shares the
//! untouched structure, so a caller holding the pre-edit root always sees a
//! consistent tree.
//!
//! # Formatting
//!
//! Punctuation and keywords are modelled as [`NodeKind::Token`] leaves, and
//! every node carries the whitespace/comments that precede its first token in
//! [`Formatting::leading`]. Printing a tree is a pure in-order concatenation
//! of `leading + text`, which is what makes splices local: siblings that were
//! not rebuilt print byte-identical to the original source.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::fmt;

use crate::types::Type;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a tree node.
///
/// Identities are process-unique: freshly synthesized nodes (templates) never
/// alias nodes already present in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh, never-before-issued identity.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// The tag of a tree node.
///
/// Rules dispatch on this tag (see `visitor::DispatchVisitor`) instead of
/// subclassing a visitor per node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    CompilationUnit,
    ClassDecl,
    MethodDecl,
    ParameterList,
    Parameter,
    Block,
    ExpressionStatement,
    ReturnStatement,
    LocalVariableDecl,
    MethodInvocation,
    ArgumentList,
    FieldAccess,
    Identifier,
    Literal,
    /// Punctuation or keyword leaf (`(`, `,`, `;`, `{`, ...).
    Token,
    /// Unresolved template slot; only appears inside a parsed template,
    /// never in a published tree.
    Placeholder,
}

/// Formatting metadata attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formatting {
    /// Whitespace and comments preceding this node's first token.
    pub leading: String,
}

/// A tree element with identity, ordered children, and optional resolved type.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    text: Option<String>,
    children: Vec<Arc<Node>>,
    node_type: Option<Type>,
    formatting: Formatting,
}

impl Node {
    /// Create a node of the given kind with a fresh identity.
    pub fn new(kind: NodeKind) -> Self {
        Node {
            id: NodeId::fresh(),
            kind,
            text: None,
            children: Vec::new(),
            node_type: None,
            formatting: Formatting::default(),
        }
    }

    /// Convenience constructor for a punctuation/keyword leaf.
    pub fn token(text: impl Into<String>, leading: impl Into<String>) -> Self {
        Node::new(NodeKind::Token)
            .with_text(text)
            .with_leading(leading)
    }

    /// Set the token text (leaf nodes).
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child.
    pub fn with_child(mut self, child: impl Into<Arc<Node>>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append several children.
    pub fn with_children(mut self, children: Vec<Arc<Node>>) -> Self {
        self.children.extend(children);
        self
    }

    /// Attach a resolved type.
    pub fn with_type(mut self, ty: Type) -> Self {
        self.node_type = Some(ty);
        self
    }

    /// Set the leading whitespace/comments.
    pub fn with_leading(mut self, leading: impl Into<String>) -> Self {
        self.formatting.leading = leading.into();
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[Arc<Node>] {
        &self.children
    }

    pub fn node_type(&self) -> Option<&Type> {
        self.node_type.as_ref()
    }

    pub fn formatting(&self) -> &Formatting {
        &self.formatting
    }

    pub fn leading(&self) -> &str {
        &self.formatting.leading
    }

    // ------------------------------------------------------------------
    // Persistent edits (same identity, new allocation)
    // ------------------------------------------------------------------

    /// New node with the same identity and attributes but different children.
    pub fn with_children_replaced(&self, children: Vec<Arc<Node>>) -> Arc<Node> {
        Arc::new(Node {
            id: self.id,
            kind: self.kind,
            text: self.text.clone(),
            children,
            node_type: self.node_type.clone(),
            formatting: self.formatting.clone(),
        })
    }

    /// New node with the same identity but different leading trivia.
    pub fn with_leading_replaced(&self, leading: impl Into<String>) -> Arc<Node> {
        Arc::new(Node {
            id: self.id,
            kind: self.kind,
            text: self.text.clone(),
            children: self.children.clone(),
            node_type: self.node_type.clone(),
            formatting: Formatting {
                leading: leading.into(),
            },
        })
    }

    /// Deep copy with a fresh identity for every node in the subtree.
    ///
    /// Used when a template fragment is instantiated so that synthesized
    /// nodes never alias the surrounding tree.
    pub fn with_fresh_ids(&self) -> Arc<Node> {
        Arc::new(Node {
            id: NodeId::fresh(),
            kind: self.kind,
            text: self.text.clone(),
            children: self.children.iter().map(|c| c.with_fresh_ids()).collect(),
            node_type: self.node_type.clone(),
            formatting: self.formatting.clone(),
        })
    }

    /// New subtree whose leftmost leaf has the given leading trivia.
    ///
    /// Interior nodes along the left spine are rebuilt; everything else is
    /// shared. Used by the local reformat step after a splice.
    pub fn with_first_leaf_leading(&self, leading: &str) -> Arc<Node> {
        if self.children.is_empty() {
            return self.with_leading_replaced(leading);
        }
        let mut children = self.children.clone();
        children[0] = children[0].with_first_leaf_leading(leading);
        self.with_children_replaced(children)
    }

    // ------------------------------------------------------------------
    // Printing
    // ------------------------------------------------------------------

    /// Render this subtree back to source text.
    pub fn print(&self) -> String {
        let mut out = String::new();
        self.print_to(&mut out);
        out
    }

    fn print_to(&self, out: &mut String) {
        out.push_str(&self.formatting.leading);
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.children {
            child.print_to(out);
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Find a node by identity anywhere in the subtree.
    pub fn find_by_id(self: &Arc<Node>, id: NodeId) -> Option<Arc<Node>> {
        if self.id == id {
            return Some(self.clone());
        }
        for child in &self.children {
            if let Some(found) = child.find_by_id(id) {
                return Some(found);
            }
        }
        None
    }

    /// Child-index path from this node to the node with the given identity.
    ///
    /// Returns an empty path when this node itself carries the identity.
    pub fn path_to(self: &Arc<Node>, id: NodeId) -> Option<Vec<usize>> {
        if self.id == id {
            return Some(Vec::new());
        }
        for (i, child) in self.children.iter().enumerate() {
            if let Some(mut path) = child.path_to(id) {
                path.insert(0, i);
                return Some(path);
            }
        }
        None
    }

    /// Walk the subtree, calling `f` on every node (pre-order).
    pub fn for_each(&self, f: &mut impl FnMut(&Node)) {
        f(self);
        for child in &self.children {
            child.for_each(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation() -> Arc<Node> {
        // obj.run(x)
        Arc::new(
            Node::new(NodeKind::MethodInvocation)
                .with_child(Node::new(NodeKind::Identifier).with_text("obj"))
                .with_child(Node::token(".", ""))
                .with_child(Node::new(NodeKind::Identifier).with_text("run"))
                .with_child(
                    Node::new(NodeKind::ArgumentList)
                        .with_child(Node::token("(", ""))
                        .with_child(Node::new(NodeKind::Identifier).with_text("x"))
                        .with_child(Node::token(")", "")),
                ),
        )
    }

    mod printing {
        use super::*;

        #[test]
        fn print_concatenates_leading_and_text() {
            let node = invocation();
            assert_eq!(node.print(), "obj.run(x)");
        }

        #[test]
        fn leading_trivia_is_preserved() {
            let stmt = Arc::new(
                Node::new(NodeKind::ExpressionStatement)
                    .with_child(invocation().with_first_leaf_leading("\n    "))
                    .with_child(Node::token(";", "")),
            );
            assert_eq!(stmt.print(), "\n    obj.run(x);");
        }
    }

    mod identity {
        use super::*;

        #[test]
        fn fresh_ids_are_unique() {
            let a = Node::new(NodeKind::Identifier);
            let b = Node::new(NodeKind::Identifier);
            assert_ne!(a.id(), b.id());
        }

        #[test]
        fn with_fresh_ids_renumbers_whole_subtree() {
            let original = invocation();
            let copy = original.with_fresh_ids();

            let mut original_ids = Vec::new();
            original.for_each(&mut |n| original_ids.push(n.id()));
            let mut copied_ids = Vec::new();
            copy.for_each(&mut |n| copied_ids.push(n.id()));

            for id in &copied_ids {
                assert!(!original_ids.contains(id));
            }
            assert_eq!(copy.print(), original.print());
        }

        #[test]
        fn persistent_edit_keeps_identity_and_shares_children() {
            let original = invocation();
            let mut children = original.children().to_vec();
            children[2] = Arc::new(Node::new(NodeKind::Identifier).with_text("start"));
            let edited = original.with_children_replaced(children);

            assert_eq!(edited.id(), original.id());
            // Untouched children are shared, not copied.
            assert!(Arc::ptr_eq(&edited.children()[0], &original.children()[0]));
            assert!(Arc::ptr_eq(&edited.children()[3], &original.children()[3]));
            assert_eq!(edited.print(), "obj.start(x)");
            assert_eq!(original.print(), "obj.run(x)");
        }
    }

    mod lookup {
        use super::*;

        #[test]
        fn find_by_id_locates_descendant() {
            let node = invocation();
            let args = &node.children()[3];
            let found = node.find_by_id(args.id()).unwrap();
            assert!(Arc::ptr_eq(&found, args));
        }

        #[test]
        fn path_to_returns_child_indexes() {
            let node = invocation();
            let open_paren = &node.children()[3].children()[0];
            assert_eq!(node.path_to(open_paren.id()), Some(vec![3, 0]));
            assert_eq!(node.path_to(node.id()), Some(vec![]));
        }

        #[test]
        fn find_by_id_missing_returns_none() {
            let node = invocation();
            assert!(node.find_by_id(NodeId::fresh()).is_none());
        }
    }
}
