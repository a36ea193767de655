use std::collections::HashMap;

/// Per-file alias map for `use` imports. A scope brackets exactly one
/// file's parse; aliases are case-insensitive, so keys are case-folded.
/// Redefining an alias within one scope is last-write-wins.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn destroy_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn add(&mut self, alias: &str, qualified_name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(alias.to_lowercase(), qualified_name.to_string());
        }
    }

    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.scopes
            .last()
            .and_then(|scope| scope.get(&alias.to_lowercase()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut table = SymbolTable::new();
        table.create_scope();
        table.add("Bar", "foo\\Bar");
        assert_eq!(table.lookup("bar"), Some("foo\\Bar"));
        assert_eq!(table.lookup("BAR"), Some("foo\\Bar"));
    }

    #[test]
    fn destroying_a_scope_drops_its_aliases() {
        let mut table = SymbolTable::new();
        table.create_scope();
        table.add("A", "x\\A");
        table.destroy_scope();
        table.create_scope();
        assert_eq!(table.lookup("A"), None);
    }

    #[test]
    fn redefinition_is_last_write_wins() {
        let mut table = SymbolTable::new();
        table.create_scope();
        table.add("A", "x\\A");
        table.add("A", "y\\A");
        assert_eq!(table.lookup("A"), Some("y\\A"));
    }
}
