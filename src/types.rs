//! Type model and resolver: assignability over declared inheritance graphs.
//!
//! The parser/type-attribution pipeline (an external collaborator) hands us
//! trees whose nodes optionally carry a resolved [`Type`], plus a
//! [`TypeTable`] of declared types. The resolver answers the two questions
//! rules need: "is this type assignable to that name?" and "which methods
//! does this type declare or inherit?".
//!
//! # Termination over malformed models
//!
//! Declared hierarchies come from partially analyzed source and may contain
//! cycles or dangling references. Every walk keeps a visited set of type
//! names; a revisited name counts as "not found" so the walk terminates and
//! fails closed instead of looping.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Type Model
// ============================================================================

/// Primitive type keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveKind {
    /// Parse a primitive keyword.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "boolean" => Some(PrimitiveKind::Boolean),
            "byte" => Some(PrimitiveKind::Byte),
            "char" => Some(PrimitiveKind::Char),
            "short" => Some(PrimitiveKind::Short),
            "int" => Some(PrimitiveKind::Int),
            "long" => Some(PrimitiveKind::Long),
            "float" => Some(PrimitiveKind::Float),
            "double" => Some(PrimitiveKind::Double),
            "void" => Some(PrimitiveKind::Void),
            _ => None,
        }
    }

    /// The source keyword for this primitive.
    pub fn keyword(&self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Void => "void",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A resolved static type attached to a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Reference type identified by fully qualified name.
    FullyQualified(String),
    /// Primitive type.
    Primitive(PrimitiveKind),
    /// Array type; recurses on the element type.
    Array(Box<Type>),
    /// Parameterized type. Compared by raw type only (erasure semantics);
    /// type arguments are carried but never matched.
    Parameterized { raw: Box<Type>, args: Vec<Type> },
}

impl Type {
    /// Convenience constructor for a fully qualified reference type.
    pub fn fq(name: impl Into<String>) -> Self {
        Type::FullyQualified(name.into())
    }

    /// Erase parameterization, yielding the underlying raw type.
    pub fn erased(&self) -> &Type {
        match self {
            Type::Parameterized { raw, .. } => raw.erased(),
            other => other,
        }
    }

    /// The erased type name as written in a pattern (`int`, `pkg.Type`,
    /// `pkg.Type[]`).
    pub fn erased_name(&self) -> String {
        match self.erased() {
            Type::FullyQualified(name) => name.clone(),
            Type::Primitive(p) => p.keyword().to_string(),
            Type::Array(elem) => format!("{}[]", elem.erased_name()),
            Type::Parameterized { .. } => unreachable!("erased() removes parameterization"),
        }
    }
}

// ============================================================================
// Declared Types
// ============================================================================

/// Classification of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDeclKind {
    Class,
    Interface,
    Enum,
}

/// Modifier flags on a declared type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeFlags {
    pub is_abstract: bool,
    pub is_final: bool,
}

/// Signature of a declared method: name plus erased parameter types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Type>,
}

impl MethodSig {
    pub fn new(name: impl Into<String>, params: Vec<Type>) -> Self {
        MethodSig {
            name: name.into(),
            params,
        }
    }
}

/// A declared reference type and its inheritance edges.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    /// Fully qualified name.
    pub name: String,
    pub kind: TypeDeclKind,
    /// Declared supertype, if any.
    pub supertype: Option<String>,
    /// Declared interfaces (`implements` for classes, `extends` for
    /// interfaces).
    pub interfaces: Vec<String>,
    /// Methods declared directly on this type.
    pub methods: Vec<MethodSig>,
    pub flags: TypeFlags,
}

impl TypeDecl {
    /// Create a class declaration with no inheritance edges.
    pub fn class(name: impl Into<String>) -> Self {
        TypeDecl {
            name: name.into(),
            kind: TypeDeclKind::Class,
            supertype: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            flags: TypeFlags::default(),
        }
    }

    /// Create an interface declaration.
    pub fn interface(name: impl Into<String>) -> Self {
        TypeDecl {
            kind: TypeDeclKind::Interface,
            ..TypeDecl::class(name)
        }
    }

    pub fn extending(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    pub fn implementing(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_method(mut self, method: MethodSig) -> Self {
        self.methods.push(method);
        self
    }
}

// ============================================================================
// Type Table / Resolver
// ============================================================================

/// Registry of declared types, keyed by fully qualified name.
///
/// Immutable once populated; safely shared read-only across worker threads.
#[derive(Debug, Default)]
pub struct TypeTable {
    decls: HashMap<String, Arc<TypeDecl>>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable::default()
    }

    /// Register a declared type, replacing any previous declaration of the
    /// same name.
    pub fn insert(&mut self, decl: TypeDecl) {
        self.decls.insert(decl.name.clone(), Arc::new(decl));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDecl>> {
        self.decls.get(name)
    }

    /// Decide whether `candidate` is assignable to the type named `target`.
    ///
    /// Exact erased-name equality always succeeds. With `match_overrides`,
    /// the walk also succeeds when `target` appears anywhere in the
    /// candidate's supertype chain or in the transitive closure of its
    /// interfaces. An unresolved or unknown candidate never matches.
    pub fn is_assignable(&self, candidate: &Type, target: &str, match_overrides: bool) -> bool {
        match candidate.erased() {
            Type::Array(elem) => match target.strip_suffix("[]") {
                Some(elem_target) => self.is_assignable(elem, elem_target, match_overrides),
                None => false,
            },
            Type::Primitive(p) => p.keyword() == target,
            Type::FullyQualified(name) => {
                if name == target {
                    return true;
                }
                if !match_overrides {
                    return false;
                }
                let mut visited = HashSet::new();
                self.ancestor_reaches(name, target, &mut visited)
            }
            Type::Parameterized { .. } => unreachable!("erased() removes parameterization"),
        }
    }

    /// Walk supertype/interface edges looking for `target`.
    ///
    /// A name already in `visited` is treated as "not matched" so cyclic or
    /// otherwise malformed hierarchies terminate.
    fn ancestor_reaches(&self, name: &str, target: &str, visited: &mut HashSet<String>) -> bool {
        if !visited.insert(name.to_string()) {
            return false;
        }
        let Some(decl) = self.decls.get(name) else {
            // Dangling edge: nothing to walk.
            return false;
        };
        if let Some(supertype) = &decl.supertype {
            if supertype == target || self.ancestor_reaches(supertype, target, visited) {
                return true;
            }
        }
        for interface in &decl.interfaces {
            if interface == target || self.ancestor_reaches(interface, target, visited) {
                return true;
            }
        }
        false
    }

    /// All methods the named type declares or inherits, paired with the
    /// declaring type. Entries appear in resolution order: the type itself,
    /// then supertypes, then interfaces.
    pub fn methods_of(&self, name: &str) -> Vec<(Arc<TypeDecl>, MethodSig)> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.collect_methods(name, &mut visited, &mut out);
        out
    }

    fn collect_methods(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        out: &mut Vec<(Arc<TypeDecl>, MethodSig)>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }
        let Some(decl) = self.decls.get(name) else {
            return;
        };
        for method in &decl.methods {
            out.push((decl.clone(), method.clone()));
        }
        if let Some(supertype) = decl.supertype.clone() {
            self.collect_methods(&supertype, visited, out);
        }
        for interface in decl.interfaces.clone() {
            self.collect_methods(&interface, visited, out);
        }
    }
}
