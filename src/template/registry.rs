//! Registry of named templates and host functions
//!
//! Templates in a registry can call each other by name, including
//! recursively; the caller owns the registry and passes it to
//! [`Template::render_in`](crate::Template::render_in).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::{EvalError, RenderError};
use crate::render::Value;
use crate::template::{Arguments, Template};

/// Errors that can occur during registry operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Nothing registered under this name
    #[error("template not found: {name}")]
    NotFound { name: String },

    /// The name is already taken by a template or function
    #[error("duplicate definition: {name}")]
    Duplicate { name: String },
}

/// A function provided by the host program, callable from templates
pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Caller-owned namespace of compiled templates and host functions
#[derive(Clone, Default)]
pub struct Registry {
    templates: HashMap<String, Template>,
    functions: HashMap<String, HostFn>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under its own name
    pub fn register(&mut self, template: Template) -> Result<(), RegistryError> {
        let name = template.name().to_string();
        self.check_free(&name)?;
        log::debug!("registered template '{}'", name);
        self.templates.insert(name, template);
        Ok(())
    }

    /// Register a host function
    pub fn register_function<F>(
        &mut self,
        name: impl Into<String>,
        f: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.check_free(&name)?;
        log::debug!("registered function '{}'", name);
        self.functions.insert(name, Arc::new(f));
        Ok(())
    }

    fn check_free(&self, name: &str) -> Result<(), RegistryError> {
        if self.contains(name) {
            return Err(RegistryError::Duplicate {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Get a template by name
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    /// Get a host function by name
    pub fn function(&self, name: &str) -> Option<&HostFn> {
        self.functions.get(name)
    }

    /// Check if a template or function exists
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name) || self.functions.contains_key(name)
    }

    /// Get all template names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Render the template registered as `name`
    pub fn render(&self, name: &str, args: impl Into<Arguments>) -> Result<Value, RenderError> {
        let template = self.get(name).ok_or_else(|| RegistryError::NotFound {
            name: name.to_string(),
        })?;
        template.render_in(self, args)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<&str> = self.functions.keys().map(|s| s.as_str()).collect();
        functions.sort_unstable();
        f.debug_struct("Registry")
            .field("templates", &self.names())
            .field("functions", &functions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{compile_with_options, CompileOptions, Signature};

    fn template(name: &str, source: &str) -> Template {
        compile_with_options(
            source,
            Signature::new(),
            CompileOptions::new().with_name(name),
        )
        .expect("Should compile")
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = Registry::new();
        registry
            .register(template("box", "= [ ]"))
            .expect("Should register");
        assert!(registry.contains("box"));
        assert!(registry.get("box").is_some());
        assert_eq!(registry.names(), vec!["box"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_duplicate_error() {
        let mut registry = Registry::new();
        registry
            .register(template("box", "= a"))
            .expect("First register should succeed");
        let result = registry.register(template("box", "= b"));
        assert!(matches!(result, Err(RegistryError::Duplicate { .. })));

        let result = registry.register_function("box", |_| Ok(Value::None));
        assert!(matches!(result, Err(RegistryError::Duplicate { .. })));
    }

    #[test]
    fn test_render_by_name() {
        let mut registry = Registry::new();
        registry
            .register(template("hello", "= hello"))
            .expect("Should register");
        assert_eq!(
            registry.render("hello", Arguments::new()),
            Ok(Value::from("hello"))
        );
        assert!(matches!(
            registry.render("missing", Arguments::new()),
            Err(RenderError::Registry(RegistryError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_host_function() {
        let mut registry = Registry::new();
        registry
            .register_function("double", |args| match args {
                [Value::Int(n)] => Ok(Value::Int(n * 2)),
                _ => Err(EvalError::Host("double() takes one integer".to_string())),
            })
            .expect("Should register");
        let f = registry.function("double").expect("Should exist");
        assert_eq!(f(&[Value::Int(21)]), Ok(Value::Int(42)));
        assert!(registry.is_empty());
    }
}
