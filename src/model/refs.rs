use std::cell::OnceCell;

use crate::model::TypeId;

/// Deferred handle to a type declaration, identified by qualified name.
/// Cross-file declaration order is not controlled by the parser, so a
/// reference may be created before its target exists; the registry binds it
/// once, either when the name is already known or during end-of-run
/// finalization, which synthesizes an external placeholder for names never
/// defined in the analyzed sources.
#[derive(Debug)]
pub struct TypeRef {
    qualified_name: String,
    target: OnceCell<TypeId>,
}

impl TypeRef {
    pub(crate) fn new(qualified_name: String) -> Self {
        Self {
            qualified_name,
            target: OnceCell::new(),
        }
    }

    pub(crate) fn bound(qualified_name: String, id: TypeId) -> Self {
        let target = OnceCell::new();
        let _ = target.set(id);
        Self {
            qualified_name,
            target,
        }
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// The resolved target. `None` only before the registry has finalized
    /// the run; afterwards every reference is bound.
    pub fn target(&self) -> Option<TypeId> {
        self.target.get().copied()
    }

    pub(crate) fn bind(&self, id: TypeId) {
        // First binding wins; the registry never rebinds a reference.
        let _ = self.target.set(id);
    }
}
