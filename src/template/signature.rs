//! Parameter lists of templates and local routines

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::code::{parse_params, Expr, ParamDecl, SyntaxError};
use crate::error::EvalError;
use crate::render::{evaluate_constant, Value};
use crate::template::Arguments;

/// Errors in a parameter list
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SignatureError {
    #[error("invalid parameter list: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("duplicate parameter '{0}'")]
    Duplicate(String),

    #[error("parameter '{0}' without a default follows a parameter with one")]
    MissingDefault(String),

    #[error("variadic parameter '*{0}' must come last")]
    VariadicNotLast(String),

    #[error("variadic parameter '*{0}' cannot have a default")]
    VariadicDefault(String),

    #[error("default value of parameter '{name}': {source}")]
    Default {
        name: String,
        #[source]
        source: EvalError,
    },
}

/// A named parameter with an optional default
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Value>,
}

/// The declared parameter list of a template
///
/// Positional parameters come first, defaulted ones after them, and an
/// optional `*name` parameter collects the remaining positional arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<Param>,
    variadic: Option<String>,
}

impl Signature {
    /// An empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a parameter list such as `n, sep=', ', *rest`
    ///
    /// Defaults are evaluated once, here, without any variables in scope.
    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        let decls = parse_params(text)?;
        Self::from_decls(&decls, evaluate_constant)
    }

    /// Build a signature from parsed declarations, evaluating defaults with
    /// `eval`
    pub fn from_decls(
        decls: &[ParamDecl],
        mut eval: impl FnMut(&Expr) -> Result<Value, EvalError>,
    ) -> Result<Self, SignatureError> {
        Self::validate(decls)?;
        let mut signature = Signature::new();
        for decl in decls {
            if decl.variadic {
                signature.variadic = Some(decl.name.clone());
                continue;
            }
            let default = match &decl.default {
                Some(expr) => Some(eval(expr).map_err(|source| SignatureError::Default {
                    name: decl.name.clone(),
                    source,
                })?),
                None => None,
            };
            signature.params.push(Param {
                name: decl.name.clone(),
                default,
            });
        }
        Ok(signature)
    }

    /// Check the shape of a declaration list without evaluating defaults
    pub fn validate(decls: &[ParamDecl]) -> Result<(), SignatureError> {
        let mut seen = HashSet::new();
        let mut defaulted = false;
        for (index, decl) in decls.iter().enumerate() {
            if !seen.insert(decl.name.as_str()) {
                return Err(SignatureError::Duplicate(decl.name.clone()));
            }
            if decl.variadic {
                if decl.default.is_some() {
                    return Err(SignatureError::VariadicDefault(decl.name.clone()));
                }
                if index + 1 != decls.len() {
                    return Err(SignatureError::VariadicNotLast(decl.name.clone()));
                }
            } else if decl.default.is_some() {
                defaulted = true;
            } else if defaulted {
                return Err(SignatureError::MissingDefault(decl.name.clone()));
            }
        }
        Ok(())
    }

    /// Add a required parameter
    pub fn with_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Add a parameter with a default value
    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(value.into()),
        });
        self
    }

    /// Set the parameter collecting extra positional arguments
    pub fn with_variadic(mut self, name: impl Into<String>) -> Self {
        self.variadic = Some(name.into());
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn variadic(&self) -> Option<&str> {
        self.variadic.as_deref()
    }

    /// All parameter names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.params
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.variadic.as_deref())
            .collect()
    }

    /// Bind call arguments to parameter names
    pub fn bind(&self, args: Arguments) -> Result<Vec<(String, Value)>, EvalError> {
        let Arguments {
            positional,
            keywords,
        } = args;

        let mut slots: Vec<Option<Value>> = vec![None; self.params.len()];
        let mut extra = Vec::new();
        for (index, value) in positional.into_iter().enumerate() {
            match slots.get_mut(index) {
                Some(slot) => *slot = Some(value),
                None => extra.push(value),
            }
        }
        if !extra.is_empty() && self.variadic.is_none() {
            return Err(EvalError::arguments(format!(
                "takes {} positional arguments but {} were given",
                self.params.len(),
                self.params.len() + extra.len()
            )));
        }

        for (name, value) in keywords {
            let index = self
                .params
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| {
                    EvalError::arguments(format!("got an unexpected keyword argument '{}'", name))
                })?;
            if slots[index].is_some() {
                return Err(EvalError::arguments(format!(
                    "got multiple values for argument '{}'",
                    name
                )));
            }
            slots[index] = Some(value);
        }

        let mut bound = Vec::with_capacity(self.params.len() + 1);
        for (param, slot) in self.params.iter().zip(slots) {
            let value = slot.or_else(|| param.default.clone()).ok_or_else(|| {
                EvalError::arguments(format!("missing required argument '{}'", param.name))
            })?;
            bound.push((param.name.clone(), value));
        }
        if let Some(name) = &self.variadic {
            bound.push((name.clone(), Value::List(extra)));
        }
        Ok(bound)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .params
            .iter()
            .map(|p| match &p.default {
                Some(value) => format!("{}={}", p.name, value.repr()),
                None => p.name.clone(),
            })
            .collect();
        if let Some(name) = &self.variadic {
            parts.push(format!("*{}", name));
        }
        write!(f, "{}", parts.join(", "))
    }
}
