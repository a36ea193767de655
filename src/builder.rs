use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::model::{
    split_qualified, FunctionDecl, FunctionId, Namespace, TypeDecl, TypeId, TypeKind, TypeRef,
};

/// The Declaration Registry: the single, run-scoped authority creating and
/// indexing every declaration discovered in a run. Identity is stable —
/// one qualified name maps to one `TypeId` for the whole run, whether the
/// name was first seen as a reference or as a definition.
#[derive(Debug, Default)]
pub struct Builder {
    namespaces: IndexMap<String, Namespace>,
    types: Vec<TypeDecl>,
    functions: Vec<FunctionDecl>,
    // Case-folded qualified name indexes.
    type_index: HashMap<String, TypeId>,
    function_index: HashMap<String, FunctionId>,
    // Every reference handed out, so finalization can bind stragglers.
    refs: Vec<Rc<TypeRef>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_type(&self, qualified_name: &str) -> Option<TypeId> {
        self.type_index.get(&qualified_name.to_lowercase()).copied()
    }

    pub fn lookup_function(&self, qualified_name: &str) -> Option<FunctionId> {
        self.function_index
            .get(&qualified_name.to_lowercase())
            .copied()
    }

    /// Hand out a reference to the given qualified name. Already-registered
    /// names yield a bound reference; unknown names yield a pending one
    /// that finalization will bind, synthesizing an external placeholder if
    /// the name never gets defined.
    pub fn build_type_ref(&mut self, qualified_name: &str) -> Rc<TypeRef> {
        let reference = match self.lookup_type(qualified_name) {
            Some(id) => TypeRef::bound(qualified_name.to_string(), id),
            None => TypeRef::new(qualified_name.to_string()),
        };
        let reference = Rc::new(reference);
        self.refs.push(Rc::clone(&reference));
        reference
    }

    /// Register a fully parsed type declaration. Re-declaration of a known
    /// qualified name (a placeholder created for a forward reference, or a
    /// duplicate definition) reuses the existing id and replaces the stored
    /// declaration in place.
    pub fn commit_type(&mut self, decl: TypeDecl) -> TypeId {
        let qualified = decl.qualified_name();
        let key = qualified.to_lowercase();

        if let Some(&id) = self.type_index.get(&key) {
            debug!("merging re-declaration of {}", qualified);
            self.types[id.0] = decl;
            return id;
        }

        trace!("registering type {}", qualified);
        let id = TypeId(self.types.len());
        self.namespace_mut(&decl.namespace_name.clone())
            .add_type(&decl.name, id);
        self.types.push(decl);
        self.type_index.insert(key, id);
        id
    }

    pub fn commit_function(&mut self, decl: FunctionDecl) -> FunctionId {
        let qualified = decl.qualified_name();
        let key = qualified.to_lowercase();

        if let Some(&id) = self.function_index.get(&key) {
            debug!("merging re-declaration of function {}", qualified);
            self.functions[id.0] = decl;
            return id;
        }

        trace!("registering function {}", qualified);
        let id = FunctionId(self.functions.len());
        self.namespace_mut(&decl.namespace_name.clone())
            .add_function(&decl.callable.name, id);
        self.functions.push(decl);
        self.function_index.insert(key, id);
        id
    }

    /// Bind every reference still dangling at end of run. Names without a
    /// definition get an external placeholder declaration (marked not
    /// user-defined), so a consumer reading any property of an unresolved
    /// reference never fails.
    pub fn finalize(&mut self) {
        let pending: Vec<Rc<TypeRef>> = self
            .refs
            .iter()
            .filter(|r| r.target().is_none())
            .cloned()
            .collect();

        for reference in pending {
            let qualified = reference.qualified_name().to_string();
            let id = match self.lookup_type(&qualified) {
                Some(id) => id,
                None => self.intern_placeholder(&qualified),
            };
            reference.bind(id);
        }
    }

    fn intern_placeholder(&mut self, qualified_name: &str) -> TypeId {
        debug!("synthesizing external declaration for {}", qualified_name);
        let (namespace_name, simple_name) = split_qualified(qualified_name);
        let decl = TypeDecl::new(TypeKind::Class, namespace_name, simple_name);
        let id = TypeId(self.types.len());
        self.namespace_mut(namespace_name).add_type(simple_name, id);
        self.types.push(decl);
        self.type_index.insert(qualified_name.to_lowercase(), id);
        id
    }

    fn namespace_mut(&mut self, name: &str) -> &mut Namespace {
        self.namespaces
            .entry(name.to_string())
            .or_insert_with(|| Namespace::new(name))
    }

    pub fn type_decl(&self, id: TypeId) -> &TypeDecl {
        &self.types[id.0]
    }

    pub fn function(&self, id: FunctionId) -> &FunctionDecl {
        &self.functions[id.0]
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.namespaces.values()
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Types defined by the given file, in registration order. Used to
    /// capture a file's contribution into a cache record.
    pub fn types_in_file<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a TypeDecl> {
        self.types
            .iter()
            .filter(move |t| t.source_file.as_deref() == Some(file))
    }

    pub fn functions_in_file<'a>(
        &'a self,
        file: &'a str,
    ) -> impl Iterator<Item = &'a FunctionDecl> {
        self.functions
            .iter()
            .filter(move |f| f.source_file.as_deref() == Some(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;

    #[test]
    fn reference_before_definition_shares_identity() {
        let mut builder = Builder::new();
        let reference = builder.build_type_ref("foo\\B");
        assert!(reference.target().is_none());

        let mut decl = TypeDecl::new(TypeKind::Class, "foo", "B");
        decl.is_user_defined = true;
        let id = builder.commit_type(decl);

        builder.finalize();
        assert_eq!(reference.target(), Some(id));
        assert!(builder.type_decl(id).is_user_defined);
    }

    #[test]
    fn unresolved_reference_degrades_to_placeholder() {
        let mut builder = Builder::new();
        let reference = builder.build_type_ref("ext\\Missing");
        builder.finalize();

        let id = reference.target().unwrap();
        let decl = builder.type_decl(id);
        assert!(!decl.is_user_defined);
        assert_eq!(decl.name, "Missing");
        assert_eq!(decl.namespace_name, "ext");
        assert!(builder.namespace("ext").is_some());
    }

    #[test]
    fn redeclaration_reuses_the_existing_id() {
        let mut builder = Builder::new();
        let first = builder.commit_type(TypeDecl::new(TypeKind::Class, "foo", "A"));
        let second = builder.commit_type(TypeDecl::new(TypeKind::Class, "foo", "A"));
        assert_eq!(first, second);
        assert_eq!(builder.namespace("foo").unwrap().type_count(), 1);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut builder = Builder::new();
        let id = builder.commit_type(TypeDecl::new(TypeKind::Class, "Foo", "Bar"));
        assert_eq!(builder.lookup_type("foo\\bar"), Some(id));
    }
}
