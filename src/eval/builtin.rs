use crate::eval::value::Value;

/// Extension seam for the domain-specific standard-library modules
/// (math/strings/hashmap/array) that this core deliberately leaves out: the
/// evaluator only needs to know how to look one up by name, not what any of
/// them contain.
pub trait BuiltinModuleRegistry {
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// The default registry: no built-in modules at all. A frontend embedding
/// this core supplies its own `BuiltinModuleRegistry` once stdlib modules
/// exist.
pub struct EmptyModuleRegistry;

impl BuiltinModuleRegistry for EmptyModuleRegistry {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_resolves_nothing() {
        assert!(EmptyModuleRegistry.lookup("math").is_none());
    }
}
