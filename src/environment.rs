//! Symbol-to-value bindings.
//!
//! An [`Environment`] is a cheap handle to a frame. Frames chain to a parent, so
//! a procedure call can shadow names without touching the global frame, and a
//! closure keeps its defining frame alive by holding a handle to it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::Value;

struct Frame {
    bindings: RefCell<HashMap<Rc<str>, Value>>,
    parent: Option<Environment>,
}

/// Environment for variable bindings
#[derive(Clone)]
pub struct Environment(Rc<Frame>);

impl Environment {
    pub fn new() -> Self {
        Environment(Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    /// A new empty frame whose lookups fall back to `parent`.
    pub fn with_parent(parent: &Environment) -> Self {
        Environment(Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
        }))
    }

    /// Bind `name` in this frame, replacing any existing binding here.
    pub fn define(&self, name: impl Into<Rc<str>>, value: Value) {
        self.0.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Look `name` up in this frame, then in each parent in turn.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut frame = Some(self);
        while let Some(env) = frame {
            if let Some(value) = env.0.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            frame = env.0.parent.as_ref();
        }
        None
    }

    /// Replace the innermost existing binding of `name`.
    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        let mut frame = Some(self);
        while let Some(env) = frame {
            if let Some(slot) = env.0.bindings.borrow_mut().get_mut(name) {
                *slot = value;
                return Ok(());
            }
            frame = env.0.parent.as_ref();
        }
        Err(Error::UnboundVariable(name.to_owned()))
    }

    /// Get all bindings visible from this environment.
    /// Returns a Vec of (name, value) pairs sorted by name; inner frames win.
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        // Start with parent bindings (so they can be overridden by local bindings)
        if let Some(parent) = &self.0.parent {
            for (name, value) in parent.get_all_bindings() {
                bindings.insert(name, value);
            }
        }

        for (name, value) in self.0.bindings.borrow().iter() {
            bindings.insert(name.to_string(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bindings may hold closures over this very frame, so never recurse into values
        let mut depth = 0;
        let mut parent = self.0.parent.as_ref();
        while let Some(env) = parent {
            depth += 1;
            parent = env.0.parent.as_ref();
        }
        f.debug_struct("Environment")
            .field("bindings", &self.0.bindings.borrow().len())
            .field("depth", &depth)
            .finish()
    }
}
