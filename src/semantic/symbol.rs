use std::collections::HashMap;

use crate::semantic::types::Type;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SymbolKind {
    Variable,
    Function,
    Struct,
    TypeAlias,
    LoopBound,
    Parameter,
    Field,
}

/// (name, kind, declared-type, mutability, depth). No reference back to the
/// declaring AST node: nothing downstream needs to walk back from a symbol
/// to its syntax, and borrowing one here would tie `Symbol`'s lifetime to
/// the `Program` for no benefit.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub declared_type: Type,
    pub mutable: bool,
    pub depth: usize,
}

/// A stack of lexically nested scopes. Depth 0 is the program's top level;
/// `enter_scope`/`exit_scope` push/pop child scopes exactly the way the
/// analyzer's recursive walk enters and leaves blocks.
pub struct SymbolResolver {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl SymbolResolver {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Pushes a new child scope and returns a handle to the scope that was
    /// current before the call, so `exit_scope` can restore it.
    pub fn enter_scope(&mut self) -> usize {
        let handle = self.scopes.len() - 1;
        self.scopes.push(HashMap::new());
        handle
    }

    pub fn exit_scope(&mut self, handle: usize) {
        self.scopes.truncate(handle + 1);
    }

    /// Fails with `Err("already declared")`-style message only if `name`
    /// exists in the CURRENT scope; shadowing an outer scope's binding is
    /// permitted.
    pub fn define(&mut self, symbol: Symbol) -> Result<(), String> {
        let depth = self.depth();
        let current = self.scopes.last_mut().expect("at least the root scope always exists");
        if current.contains_key(&symbol.name) {
            return Err(format!("'{}' is already declared in this scope", symbol.name));
        }
        let mut symbol = symbol;
        symbol.depth = depth;
        current.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Rewrites `name`'s declared type in place, wherever it's currently
    /// bound. Used to narrow a `nul`-declared binding to a concrete type
    /// the first time it's assigned one.
    pub fn narrow(&mut self, name: &str, declared_type: Type) -> bool {
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .map(|symbol| symbol.declared_type = declared_type)
            .is_some()
    }
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, depth: usize) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind: SymbolKind::Variable,
            declared_type: Type::Int,
            mutable: false,
            depth,
        }
    }

    #[test]
    fn shadowing_across_scopes_is_allowed() {
        let mut resolver = SymbolResolver::new();
        resolver.define(var("x", 0)).unwrap();
        let handle = resolver.enter_scope();
        assert!(resolver.define(var("x", 1)).is_ok());
        assert_eq!(resolver.resolve("x").unwrap().depth, 1);
        resolver.exit_scope(handle);
        assert_eq!(resolver.resolve("x").unwrap().depth, 0);
    }

    #[test]
    fn redeclaration_in_the_same_scope_fails() {
        let mut resolver = SymbolResolver::new();
        resolver.define(var("x", 0)).unwrap();
        assert!(resolver.define(var("x", 0)).is_err());
    }

    #[test]
    fn resolve_walks_parent_scopes() {
        let mut resolver = SymbolResolver::new();
        resolver.define(var("outer", 0)).unwrap();
        let handle = resolver.enter_scope();
        assert!(resolver.resolve("outer").is_some());
        resolver.exit_scope(handle);
    }
}
