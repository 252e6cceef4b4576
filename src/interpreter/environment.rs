use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::{builtins::Builtins, object::Object};

/// One link in the chain of binding scopes the evaluator walks. The root
/// environment carries the builtin functions; enclosed environments only
/// carry their own bindings and defer the rest to `outer`.
#[derive(Debug, PartialEq, Clone)]
pub struct Environment {
    store: HashMap<String, Object>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        let mut store = HashMap::new();
        for (name, function) in Builtins::get() {
            store.insert(name.to_string(), Object::BuiltInFunction(function));
        }
        Environment { store, outer: None }
    }

    pub fn new_enclosed(outer: Rc<RefCell<Environment>>) -> Self {
        Environment {
            store: HashMap::new(),
            outer: Some(outer),
        }
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        match self.store.get(name) {
            Some(value) => Some(value.clone()),
            None => match &self.outer {
                Some(outer) => outer.borrow().get(name),
                None => None,
            },
        }
    }

    pub fn set(&mut self, name: &str, value: Object) {
        self.store.insert(name.to_string(), value);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
