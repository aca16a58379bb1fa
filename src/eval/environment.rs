use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::eval::value::Value;

struct Binding {
    value: Value,
    mutable: bool,
}

struct Scope {
    bindings: HashMap<String, Binding>,
    parent: Option<Environment>,
}

/// A lexically nested environment: a linked list of scopes, each a handle
/// onto shared, mutable storage so closures that captured an outer scope
/// still observe later mutations to it.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    pub fn new() -> Self {
        Environment(Rc::new(RefCell::new(Scope { bindings: HashMap::new(), parent: None })))
    }

    pub fn child(&self) -> Self {
        Environment(Rc::new(RefCell::new(Scope { bindings: HashMap::new(), parent: Some(self.clone()) })))
    }

    pub fn define(&self, name: impl Into<String>, value: Value, mutable: bool) {
        self.0.borrow_mut().bindings.insert(name.into(), Binding { value, mutable });
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.borrow();
        match scope.bindings.get(name) {
            Some(binding) => Some(binding.value.clone()),
            None => {
                let parent = scope.parent.clone();
                drop(scope);
                parent.and_then(|p| p.get(name))
            }
        }
    }

    /// Reassigns `name` in whichever scope it was originally defined in,
    /// failing if it isn't declared anywhere in the chain or is immutable.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), String> {
        let parent = {
            let mut scope = self.0.borrow_mut();
            match scope.bindings.get_mut(name) {
                Some(binding) => {
                    if !binding.mutable {
                        return Err(format!("'{name}' can't be mutated, defined as const"));
                    }
                    binding.value = value;
                    return Ok(());
                }
                None => scope.parent.clone(),
            }
        };
        match parent {
            Some(parent) => parent.assign(name, value),
            None => Err(format!("'{name}' is not declared")),
        }
    }

    /// The current scope's own bindings whose name doesn't start with `_`,
    /// used to build a user module's exported attribute bag.
    pub fn exported_bindings(&self) -> HashMap<String, Value> {
        self.0
            .borrow()
            .bindings
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, binding)| (name.clone(), binding.value.clone()))
            .collect()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_scopes_see_parent_bindings() {
        let root = Environment::new();
        root.define("x", Value::Int(1), false);
        let child = root.child();
        assert!(matches!(child.get("x"), Some(Value::Int(1))));
    }

    #[test]
    fn assigning_an_immutable_binding_fails() {
        let env = Environment::new();
        env.define("x", Value::Int(1), false);
        assert!(env.assign("x", Value::Int(2)).is_err());
    }

    #[test]
    fn assigning_through_a_child_scope_updates_the_parent_binding() {
        let root = Environment::new();
        root.define("x", Value::Int(1), true);
        let child = root.child();
        child.assign("x", Value::Int(2)).unwrap();
        assert!(matches!(root.get("x"), Some(Value::Int(2))));
    }

    #[test]
    fn exported_bindings_skip_underscore_prefixed_names() {
        let env = Environment::new();
        env.define("visible", Value::Int(1), false);
        env.define("_hidden", Value::Int(2), false);
        let exported = env.exported_bindings();
        assert!(exported.contains_key("visible"));
        assert!(!exported.contains_key("_hidden"));
    }
}
