//! Variables capability - the shared variable store.
//!
//! The store is keyed by externally-assigned variable identifiers, not
//! user-facing names; name resolution happens at the embedding boundary
//! (see `Runtime::get_variable` / `set_variable`). Values live for the
//! duration of one running program and are cleared on reset.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rhai::{Dynamic, Engine};

use super::Capability;

pub struct VariablesCapability {
    store: Rc<RefCell<HashMap<String, Dynamic>>>,
}

impl VariablesCapability {
    pub fn new() -> Self {
        Self {
            store: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Read a variable by its store identifier.
    pub fn get(&self, id: &str) -> Option<Dynamic> {
        self.store.borrow().get(id).cloned()
    }

    /// Write a variable by its store identifier.
    pub fn set(&self, id: &str, value: Dynamic) {
        self.store.borrow_mut().insert(id.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }
}

impl Default for VariablesCapability {
    fn default() -> Self {
        Self::new()
    }
}

impl Capability for VariablesCapability {
    fn name(&self) -> &'static str {
        "variables"
    }

    fn install(&self, engine: &mut Engine) {
        let store = Rc::clone(&self.store);
        engine.register_fn("variables_get", move |id: &str| -> Dynamic {
            store.borrow().get(id).cloned().unwrap_or(Dynamic::UNIT)
        });

        let store = Rc::clone(&self.store);
        engine.register_fn("variables_set", move |id: &str, value: Dynamic| {
            store.borrow_mut().insert(id.to_string(), value);
        });
    }

    fn namespace(&self) -> String {
        r#"#{
    get: |id| variables_get(id),
    set: |id, value| variables_set(id, value)
}"#
        .to_string()
    }

    fn reset(&self) {
        self.store.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_by_id() {
        let variables = VariablesCapability::new();
        assert!(variables.get("v1").is_none());

        variables.set("v1", Dynamic::from(42_i64));
        assert_eq!(variables.get("v1").unwrap().as_int().unwrap(), 42);
    }

    #[test]
    fn test_reset_empties_store() {
        let variables = VariablesCapability::new();
        variables.set("v1", Dynamic::from("hello"));
        variables.set("v2", Dynamic::from(1.5_f64));
        assert_eq!(variables.len(), 2);

        variables.reset();
        assert!(variables.is_empty());

        variables.reset(); // idempotent
        assert!(variables.is_empty());
    }
}
