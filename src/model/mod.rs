pub mod refs;

use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::AstNode;
use crate::lexer::token::Token;
use crate::span::SourceSpan;
pub use refs::TypeRef;

/// Namespace used for declarations outside any `namespace` statement and
/// without a doc-comment package annotation.
pub const DEFAULT_NAMESPACE: &str = "+global";

/// Identity handle of a type declaration. Same qualified name within one
/// run always yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    Trait,
}

/// Declaration modifier bitmask. Visibility defaults to public whenever
/// neither private nor protected is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers(u16);

impl Modifiers {
    pub const PUBLIC: Modifiers = Modifiers(0x0001);
    pub const PROTECTED: Modifiers = Modifiers(0x0002);
    pub const PRIVATE: Modifiers = Modifiers(0x0004);
    pub const STATIC: Modifiers = Modifiers(0x0008);
    pub const ABSTRACT: Modifiers = Modifiers(0x0010);
    pub const FINAL: Modifiers = Modifiers(0x0020);
    pub const READONLY: Modifiers = Modifiers(0x0040);

    pub fn empty() -> Self {
        Modifiers(0)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    pub fn is_public(self) -> bool {
        !self.contains(Self::PRIVATE) && !self.contains(Self::PROTECTED)
    }

    pub fn is_protected(self) -> bool {
        self.contains(Self::PROTECTED)
    }

    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    pub fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    pub fn is_readonly(self) -> bool {
        self.contains(Self::READONLY)
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

/// Small value model for parameter/property/constant initializers. Numeric
/// literals track their sign; array values are token-consumed only and
/// carry no reconstructed elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array,
    /// `Some\Class::CONSTANT`, class part fully resolved.
    ClassConstant(String),
    /// Bare constant reference such as `PHP_EOL`.
    Constant(String),
}

#[derive(Debug)]
pub struct Parameter {
    /// Verbatim variable name including the leading `$`.
    pub name: String,
    /// 0-based, contiguous position in the parameter list.
    pub position: usize,
    pub type_ref: Option<Rc<TypeRef>>,
    pub is_array: bool,
    pub by_reference: bool,
    pub default: Option<DefaultValue>,
    pub span: SourceSpan,
}

impl Parameter {
    pub fn is_passed_by_reference(&self) -> bool {
        self.by_reference
    }

    pub fn is_default_value_available(&self) -> bool {
        self.default.is_some()
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }
}

#[derive(Debug)]
pub struct Property {
    /// Verbatim name including the leading `$`.
    pub name: String,
    pub modifiers: Modifiers,
    /// From the declaration hint or, when annotation mining is enabled,
    /// the doc comment's `@var` tag.
    pub type_ref: Option<Rc<TypeRef>>,
    pub default: Option<DefaultValue>,
    pub doc_comment: Option<String>,
    pub span: SourceSpan,
}

#[derive(Debug)]
pub struct Constant {
    pub name: String,
    pub value: Option<DefaultValue>,
    pub doc_comment: Option<String>,
    pub span: SourceSpan,
}

/// Shared shape of methods and functions.
#[derive(Debug)]
pub struct Callable {
    pub name: String,
    pub modifiers: Modifiers,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<Rc<TypeRef>>,
    pub exception_types: Vec<Rc<TypeRef>>,
    pub returns_reference: bool,
    /// Absent for abstract methods and interface signatures.
    pub body: Option<AstNode>,
    /// `static $var = init;` locals, name (with `$`) to initializer.
    pub static_variables: IndexMap<String, Option<DefaultValue>>,
    /// Types referenced from the body: allocations, instanceof, static
    /// access, catch clauses.
    pub dependencies: Vec<Rc<TypeRef>>,
    pub doc_comment: Option<String>,
    pub span: SourceSpan,
    pub tokens: Vec<Token>,
}

impl Callable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: Modifiers::empty(),
            parameters: Vec::new(),
            return_type: None,
            exception_types: Vec::new(),
            returns_reference: false,
            body: None,
            static_variables: IndexMap::new(),
            dependencies: Vec::new(),
            doc_comment: None,
            span: SourceSpan::default(),
            tokens: Vec::new(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug)]
pub struct FunctionDecl {
    pub namespace_name: String,
    pub source_file: Option<String>,
    pub callable: Callable,
}

impl FunctionDecl {
    pub fn qualified_name(&self) -> String {
        join_qualified(&self.namespace_name, &self.callable.name)
    }
}

#[derive(Debug)]
pub struct TypeDecl {
    pub kind: TypeKind,
    pub name: String,
    pub namespace_name: String,
    pub modifiers: Modifiers,
    pub doc_comment: Option<String>,
    /// Classes only, 0 or 1, lazily resolved.
    pub parent: Option<Rc<TypeRef>>,
    /// Implemented (class) or extended (interface) interfaces.
    pub interfaces: Vec<Rc<TypeRef>>,
    pub trait_uses: Vec<Rc<TypeRef>>,
    pub methods: Vec<Callable>,
    pub properties: Vec<Property>,
    pub constants: Vec<Constant>,
    pub span: SourceSpan,
    pub tokens: Vec<Token>,
    /// False for synthesized placeholders standing in for types referenced
    /// but never defined within the analyzed sources.
    pub is_user_defined: bool,
    pub source_file: Option<String>,
}

impl TypeDecl {
    pub fn new(kind: TypeKind, namespace_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            namespace_name: namespace_name.into(),
            modifiers: Modifiers::empty(),
            doc_comment: None,
            parent: None,
            interfaces: Vec::new(),
            trait_uses: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            constants: Vec::new(),
            span: SourceSpan::default(),
            tokens: Vec::new(),
            is_user_defined: false,
            source_file: None,
        }
    }

    pub fn qualified_name(&self) -> String {
        join_qualified(&self.namespace_name, &self.name)
    }

    pub fn method(&self, name: &str) -> Option<&Callable> {
        self.methods.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants.iter().find(|c| c.name == name)
    }
}

/// One namespace and the declarations it owns, in insertion order.
#[derive(Debug)]
pub struct Namespace {
    pub name: String,
    types: IndexMap<String, TypeId>,
    functions: IndexMap<String, FunctionId>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: IndexMap::new(),
            functions: IndexMap::new(),
        }
    }

    pub(crate) fn add_type(&mut self, simple_name: &str, id: TypeId) {
        self.types.insert(simple_name.to_lowercase(), id);
    }

    pub(crate) fn add_function(&mut self, simple_name: &str, id: FunctionId) {
        self.functions.insert(simple_name.to_lowercase(), id);
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.types.values().copied()
    }

    pub fn function_ids(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.functions.values().copied()
    }

    pub fn type_by_name(&self, simple_name: &str) -> Option<TypeId> {
        self.types.get(&simple_name.to_lowercase()).copied()
    }

    pub fn function_by_name(&self, simple_name: &str) -> Option<FunctionId> {
        self.functions.get(&simple_name.to_lowercase()).copied()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

/// Split a canonical qualified name (no leading separator) into namespace
/// and simple name.
pub fn split_qualified(qualified_name: &str) -> (&str, &str) {
    match qualified_name.rfind('\\') {
        Some(pos) => (&qualified_name[..pos], &qualified_name[pos + 1..]),
        None => (DEFAULT_NAMESPACE, qualified_name),
    }
}

pub fn join_qualified(namespace_name: &str, name: &str) -> String {
    if namespace_name.is_empty() || namespace_name == DEFAULT_NAMESPACE {
        name.to_string()
    } else {
        format!("{}\\{}", namespace_name, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_defaults_to_public() {
        let mut mods = Modifiers::empty();
        mods.insert(Modifiers::STATIC);
        assert!(mods.is_public());
        mods.insert(Modifiers::PROTECTED);
        assert!(!mods.is_public());
        assert!(mods.is_protected());
    }

    #[test]
    fn qualified_name_splitting() {
        assert_eq!(split_qualified("foo\\bar\\Baz"), ("foo\\bar", "Baz"));
        assert_eq!(split_qualified("Baz"), (DEFAULT_NAMESPACE, "Baz"));
        assert_eq!(join_qualified(DEFAULT_NAMESPACE, "Baz"), "Baz");
        assert_eq!(join_qualified("foo", "Baz"), "foo\\Baz");
    }

    #[test]
    fn namespace_preserves_insertion_order() {
        let mut ns = Namespace::new("app");
        ns.add_type("Zebra", TypeId(0));
        ns.add_type("Alpha", TypeId(1));
        let ids: Vec<_> = ns.type_ids().collect();
        assert_eq!(ids, vec![TypeId(0), TypeId(1)]);
        assert_eq!(ns.type_by_name("zebra"), Some(TypeId(0)));
    }
}
