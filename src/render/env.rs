//! Lexical environment of a single render

use std::collections::HashMap;
use std::sync::Arc;

use crate::render::tree::Routine;
use crate::render::value::Value;
use crate::template::Signature;

#[derive(Debug, Default)]
struct Scope {
    vars: HashMap<String, Value>,
    routines: HashMap<String, (Arc<Routine>, Arc<Signature>)>,
    parent: Option<usize>,
}

/// Stack of scopes linked by their defining parent
///
/// A routine call pushes a scope whose parent is the scope the routine was
/// defined in, so lookups follow the template's nesting rather than the
/// call chain.
#[derive(Debug)]
pub struct Env {
    scopes: Vec<Scope>,
    current: usize,
}

/// A local routine together with the scope it was defined in
#[derive(Debug, Clone)]
pub struct Closure {
    pub routine: Arc<Routine>,
    /// Parameters with defaults evaluated at definition time
    pub signature: Arc<Signature>,
    pub scope: usize,
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

impl Env {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            current: 0,
        }
    }

    /// Bind a variable in the current scope
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.scopes[self.current].vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.chain().find_map(|scope| scope.vars.get(name))
    }

    /// Declare a routine in the current scope
    pub fn define(&mut self, routine: Arc<Routine>, signature: Signature) {
        self.scopes[self.current]
            .routines
            .insert(routine.name.clone(), (routine, Arc::new(signature)));
    }

    pub fn routine(&self, name: &str) -> Option<Closure> {
        let mut index = Some(self.current);
        while let Some(i) = index {
            let scope = &self.scopes[i];
            if let Some((routine, signature)) = scope.routines.get(name) {
                return Some(Closure {
                    routine: Arc::clone(routine),
                    signature: Arc::clone(signature),
                    scope: i,
                });
            }
            index = scope.parent;
        }
        None
    }

    /// Open a call scope under `parent`; returns the scope to restore
    pub fn enter(&mut self, parent: usize) -> usize {
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        std::mem::replace(&mut self.current, self.scopes.len() - 1)
    }

    /// Drop the innermost call scope
    pub fn leave(&mut self, previous: usize) {
        self.scopes.pop();
        self.current = previous;
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn chain(&self) -> impl Iterator<Item = &Scope> {
        let mut index = Some(self.current);
        std::iter::from_fn(move || {
            let scope = &self.scopes[index?];
            index = scope.parent;
            Some(scope)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tree::Located;

    fn routine(name: &str) -> Arc<Routine> {
        Arc::new(Routine {
            header: Located {
                line: 1,
                code: format!("def {}()", name),
                item: (),
            },
            name: name.to_string(),
            params: Vec::new(),
            body: Vec::new(),
        })
    }

    #[test]
    fn test_lookup_walks_parents() {
        let mut env = Env::new();
        env.set("n", Value::Int(1));
        let previous = env.enter(0);
        assert_eq!(env.get("n"), Some(&Value::Int(1)));
        env.set("n", Value::Int(2));
        assert_eq!(env.get("n"), Some(&Value::Int(2)));
        env.leave(previous);
        assert_eq!(env.get("n"), Some(&Value::Int(1)));
        assert_eq!(env.depth(), 1);
    }

    #[test]
    fn test_lookup_is_lexical() {
        let mut env = Env::new();
        let outer = env.enter(0);
        env.set("local", Value::Int(1));
        // A second call defined at top level does not see the first one's locals
        let inner = env.enter(0);
        assert_eq!(env.get("local"), None);
        env.leave(inner);
        env.leave(outer);
    }

    #[test]
    fn test_routines_remember_their_scope() {
        let mut env = Env::new();
        env.define(routine("top"), Signature::new());
        let previous = env.enter(0);
        env.define(routine("helper"), Signature::new());
        let closure = env.routine("helper").expect("helper is visible");
        assert_eq!(closure.scope, 1);
        assert_eq!(env.routine("top").map(|c| c.scope), Some(0));
        env.leave(previous);
        assert!(env.routine("helper").is_none());
    }
}
