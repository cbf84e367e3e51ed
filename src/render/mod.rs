//! Render executor
//!
//! Walks the lowered tree of a template with a fresh output buffer and a
//! fresh environment per call. Nothing in the compiled template is mutated
//! while rendering.

pub mod builtins;
pub mod env;
pub mod tree;
pub mod value;

pub use tree::{lower, Node};
pub use value::Value;

use std::cmp::Ordering;

use crate::code::{Argument, BinaryOp, Expr, Literal, UnaryOp};
use crate::error::{EvalError, RenderError};
use crate::escape::{Strategy, PLAIN};
use crate::render::builtins::{builtin, call_method};
use crate::render::env::{Closure, Env};
use crate::render::tree::Located;
use crate::template::{Arguments, Registry, Signature, Template};

/// Maximum nesting of routine and template calls
pub const MAX_CALL_DEPTH: usize = 1000;

/// A call that starts with less stack than this left runs on a new segment
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each stack segment allocated for deep calls
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Evaluation failure before and after it was attributed to a line
enum Failure {
    Eval(EvalError),
    Located(RenderError),
}

impl From<EvalError> for Failure {
    fn from(err: EvalError) -> Self {
        Failure::Eval(err)
    }
}

struct Executor<'t> {
    name: &'t str,
    /// The template being rendered, callable by its own name
    template: Option<&'t Template>,
    registry: &'t Registry,
    strategy: Strategy,
    env: Env,
    out: String,
    depth: usize,
}

/// Render `template` with `args`, resolving calls through `registry`
pub(crate) fn render(
    template: &Template,
    registry: &Registry,
    args: Arguments,
) -> Result<Value, RenderError> {
    render_at(template, registry, args, 0)
}

fn render_at(
    template: &Template,
    registry: &Registry,
    args: Arguments,
    depth: usize,
) -> Result<Value, RenderError> {
    log::trace!("rendering '{}' at call depth {}", template.name(), depth);
    let bound = template
        .signature()
        .bind(args)
        .map_err(|source| RenderError::Arguments {
            template: template.name().to_string(),
            source,
        })?;

    let mut executor = Executor {
        name: template.name(),
        template: Some(template),
        registry,
        strategy: template.strategy(),
        env: Env::new(),
        out: String::new(),
        depth,
    };
    for (name, value) in bound {
        executor.env.set(name, value);
    }
    match executor.run(template.tree()) {
        Ok(()) => Ok((executor.strategy.wrap_result)(executor.out)),
        Err(Failure::Located(err)) => Err(err),
        // Every evaluation runs through `locate`; keep the template name anyway
        Err(Failure::Eval(source)) => Err(RenderError::Evaluation {
            template: template.name().to_string(),
            line: 0,
            code: String::new(),
            source,
        }),
    }
}

/// Evaluate an expression with no variables and no registry
pub fn evaluate_constant(expr: &Expr) -> Result<Value, EvalError> {
    let registry = Registry::new();
    let mut executor = Executor {
        name: "<constant>",
        template: None,
        registry: &registry,
        strategy: PLAIN,
        env: Env::new(),
        out: String::new(),
        depth: 0,
    };
    match executor.eval(expr) {
        Ok(value) => Ok(value),
        Err(Failure::Eval(err)) => Err(err),
        Err(Failure::Located(err)) => Err(EvalError::Host(err.to_string())),
    }
}

fn literal(lit: &Literal) -> Value {
    match lit {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(x) => Value::Float(*x),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => lhs.add(&rhs),
        BinaryOp::Sub => lhs.sub(&rhs),
        BinaryOp::Mul => lhs.mul(&rhs),
        BinaryOp::Div => lhs.div(&rhs),
        BinaryOp::FloorDiv => lhs.floor_div(&rhs),
        BinaryOp::Mod => lhs.rem(&rhs),
        BinaryOp::Pow => lhs.pow(&rhs),
        BinaryOp::Eq => Ok(Value::Bool(lhs.equals(&rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!lhs.equals(&rhs))),
        BinaryOp::Less => Ok(Value::Bool(lhs.compare(&rhs)? == Ordering::Less)),
        BinaryOp::LessEq => Ok(Value::Bool(lhs.compare(&rhs)? != Ordering::Greater)),
        BinaryOp::Greater => Ok(Value::Bool(lhs.compare(&rhs)? == Ordering::Greater)),
        BinaryOp::GreaterEq => Ok(Value::Bool(lhs.compare(&rhs)? != Ordering::Less)),
        BinaryOp::In => Ok(Value::Bool(rhs.contains(&lhs)?)),
        BinaryOp::NotIn => Ok(Value::Bool(!rhs.contains(&lhs)?)),
        BinaryOp::And => Ok(if lhs.is_truthy() { rhs } else { lhs }),
        BinaryOp::Or => Ok(if lhs.is_truthy() { lhs } else { rhs }),
    }
}

fn no_keywords(name: &str, args: &Arguments) -> Result<(), EvalError> {
    if args.keywords.is_empty() {
        Ok(())
    } else {
        Err(EvalError::arguments(format!(
            "{}() takes no keyword arguments",
            name
        )))
    }
}

impl<'t> Executor<'t> {
    fn run(&mut self, nodes: &[Node]) -> Result<(), Failure> {
        for node in nodes {
            self.exec(node)?;
        }
        Ok(())
    }

    fn exec(&mut self, node: &Node) -> Result<(), Failure> {
        match node {
            Node::Literal(text) => self.out.push_str(text),
            Node::Expression(expr) => {
                let value = self.eval_at(expr)?;
                if !value.is_none() {
                    let wrapped = (self.strategy.wrap_expression)(value);
                    self.write(&wrapped);
                }
            }
            Node::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    if self.eval_at(&branch.cond)?.is_truthy() {
                        return self.run(&branch.body);
                    }
                }
                if let Some(body) = otherwise {
                    self.run(body)?;
                }
            }
            Node::For {
                header,
                targets,
                iter,
                body,
            } => {
                let items = self
                    .eval(iter)
                    .and_then(|value| value.iter_items().map_err(Failure::Eval));
                let items = self.locate(items, header)?;
                for item in items {
                    let bound = self.bind_targets(targets, item).map_err(Failure::Eval);
                    self.locate(bound, header)?;
                    self.run(body)?;
                }
            }
            Node::Def(routine) => {
                let mut signature = Signature::new();
                for decl in &routine.params {
                    signature = if decl.variadic {
                        signature.with_variadic(decl.name.as_str())
                    } else if let Some(expr) = &decl.default {
                        let value = self.eval(expr);
                        let value = self.locate(value, &routine.header)?;
                        signature.with_default(decl.name.as_str(), value)
                    } else {
                        signature.with_param(decl.name.as_str())
                    };
                }
                log::trace!("defined routine '{}'", routine.name);
                self.env.define(routine.clone(), signature);
            }
        }
        Ok(())
    }

    fn write(&mut self, value: &Value) {
        match value.as_str() {
            Some(text) => self.out.push_str(text),
            None => self.out.push_str(&value.to_string()),
        }
    }

    /// Attribute an unlocated failure to a template line
    fn locate<T, I>(&self, result: Result<T, Failure>, at: &Located<I>) -> Result<T, Failure> {
        result.map_err(|failure| match failure {
            Failure::Eval(source) => Failure::Located(RenderError::Evaluation {
                template: self.name.to_string(),
                line: at.line,
                code: at.code.clone(),
                source,
            }),
            located => located,
        })
    }

    fn eval_at(&mut self, expr: &Located<Expr>) -> Result<Value, Failure> {
        let result = self.eval(&expr.item);
        self.locate(result, expr)
    }

    fn bind_targets(&mut self, targets: &[String], item: Value) -> Result<(), EvalError> {
        if let [single] = targets {
            self.env.set(single.clone(), item);
            return Ok(());
        }
        match item {
            Value::List(values) if values.len() == targets.len() => {
                for (target, value) in targets.iter().zip(values) {
                    self.env.set(target.clone(), value);
                }
                Ok(())
            }
            other => Err(EvalError::type_mismatch(format!(
                "cannot unpack {} into {} names",
                other.repr(),
                targets.len()
            ))),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, Failure> {
        match expr {
            Expr::Literal(lit) => Ok(literal(lit)),
            Expr::Name(name) => Ok(self.lookup(name)?),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Dict(pairs) => {
                let mut map = std::collections::BTreeMap::new();
                for (key, value) in pairs {
                    let key = self.eval(key)?;
                    let key = key.as_str().map(str::to_string).ok_or_else(|| {
                        EvalError::type_mismatch(format!(
                            "dict keys must be strings, not '{}'",
                            key.type_name()
                        ))
                    })?;
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Neg => value.neg()?,
                    UnaryOp::Pos => value.pos()?,
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                })
            }
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.is_truthy() {
                    self.eval(rhs)
                } else {
                    Ok(lhs)
                }
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.is_truthy() {
                    Ok(lhs)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                Ok(binary(*op, lhs, rhs)?)
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                Ok(target.index(&index)?)
            }
            Expr::Attribute(target, name) => Ok(self.eval(target)?.attribute(name)?),
            Expr::Call { callee, args } => self.call(callee, args),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.env.get(name) {
            return Ok(value.clone());
        }
        if self.is_callable(name) {
            return Err(EvalError::type_mismatch(format!(
                "'{}' is a function and must be called",
                name
            )));
        }
        Err(EvalError::UndefinedName(name.to_string()))
    }

    fn is_callable(&self, name: &str) -> bool {
        self.env.routine(name).is_some()
            || self.template.map_or(false, |t| t.name() == name)
            || self.registry.contains(name)
            || self.strategy.prelude_fn(name).is_some()
            || builtin(name).is_some()
    }

    fn arguments(&mut self, args: &[Argument]) -> Result<Arguments, Failure> {
        let mut arguments = Arguments::new();
        for arg in args {
            match arg {
                Argument::Positional(expr) => arguments.positional.push(self.eval(expr)?),
                Argument::Keyword(name, expr) => {
                    let value = self.eval(expr)?;
                    arguments.keywords.push((name.clone(), value));
                }
            }
        }
        Ok(arguments)
    }

    fn call(&mut self, callee: &Expr, args: &[Argument]) -> Result<Value, Failure> {
        match callee {
            Expr::Name(name) => {
                let arguments = self.arguments(args)?;
                self.call_name(name, arguments)
            }
            Expr::Attribute(receiver, method) => {
                let receiver = self.eval(receiver)?;
                let arguments = self.arguments(args)?;
                no_keywords(method, &arguments)?;
                Ok(call_method(&receiver, method, &arguments.positional)?)
            }
            other => {
                let value = self.eval(other)?;
                Err(EvalError::NotCallable(value.type_name().to_string()).into())
            }
        }
    }

    /// Resolve a call by name: local routines, registry templates, the
    /// template itself, host functions, the strategy prelude, builtins
    fn call_name(&mut self, name: &str, arguments: Arguments) -> Result<Value, Failure> {
        if let Some(closure) = self.env.routine(name) {
            return self.call_local(closure, arguments);
        }

        let registry = self.registry;
        let own = self.template.filter(|t| t.name() == name);
        if let Some(template) = registry.get(name).or(own) {
            self.check_depth()?;
            let depth = self.depth + 1;
            return stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
                render_at(template, registry, arguments, depth)
            })
            .map_err(Failure::Located);
        }

        if let Some(f) = registry.function(name) {
            no_keywords(name, &arguments)?;
            return Ok(f(&arguments.positional)?);
        }

        if let Some(f) = self.strategy.prelude_fn(name).or_else(|| builtin(name)) {
            no_keywords(name, &arguments)?;
            return Ok(f(&arguments.positional)?);
        }

        if self.env.get(name).is_some() {
            return Err(EvalError::NotCallable(name.to_string()).into());
        }
        Err(EvalError::UndefinedName(name.to_string()).into())
    }

    /// Run a local routine; its output goes straight into this render
    fn call_local(&mut self, closure: Closure, arguments: Arguments) -> Result<Value, Failure> {
        self.check_depth()?;
        let bound = closure.signature.bind(arguments)?;
        let previous = self.env.enter(closure.scope);
        for (name, value) in bound {
            self.env.set(name, value);
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            self.run(&closure.routine.body)
        });
        self.depth -= 1;
        self.env.leave(previous);
        result.map(|()| Value::None)
    }

    fn check_depth(&self) -> Result<(), EvalError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::RecursionLimit(MAX_CALL_DEPTH));
        }
        Ok(())
    }
}
