//! Compiled templates
//!
//! A [`Template`] is the result of compiling a template source against a
//! parameter list. It is immutable and cheap to clone; every render gets a
//! fresh output buffer and fresh bindings, so one template can be rendered
//! from many threads at once.
//!
//! # Example
//!
//! ```rust
//! use sablon::{compile, Arguments, Signature};
//!
//! let template = compile("= {n} + 1 = {n + 1}", Signature::parse("n").unwrap()).unwrap();
//! let output = template.render(Arguments::new().arg(1)).unwrap();
//! assert_eq!(output.to_string(), "1 + 1 = 2");
//! ```

mod registry;
mod signature;

pub use registry::{HostFn, Registry, RegistryError};
pub use signature::{Param, Signature, SignatureError};

use std::sync::Arc;

use crate::compiler::{compile_program, Program};
use crate::error::{CompileError, RenderError};
use crate::escape::{Strategy, HTML, PLAIN};
use crate::render::{self, Node, Value};

/// Options for compiling a template
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Name used in error messages and for registry lookups
    pub name: String,
    /// Nesting depth the template body starts at
    pub base_depth: usize,
    /// Escaping applied to expression values and to the result
    pub strategy: Strategy,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            name: "template".to_string(),
            base_depth: 1,
            strategy: PLAIN,
        }
    }
}

impl CompileOptions {
    /// Create new options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the template name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the starting nesting depth
    pub fn with_base_depth(mut self, depth: usize) -> Self {
        self.base_depth = depth;
        self
    }

    /// Set the escaping strategy
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// The arguments of a template call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Arguments {
    /// No arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }
}

impl From<()> for Arguments {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

/// A compiled, renderable template
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    signature: Signature,
    strategy: Strategy,
    program: Arc<Program>,
    tree: Arc<[Node]>,
}

impl Template {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The depth-annotated instruction program
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub(crate) fn tree(&self) -> &[Node] {
        &self.tree
    }

    /// Human-readable listing of the compiled routine
    pub fn listing(&self) -> String {
        let body = if self.program.is_empty() {
            format!("{}pass", "    ".repeat(self.program.base_depth().max(1)))
        } else {
            self.program.to_string()
        };
        format!("def {}({}):\n{}", self.name, self.signature, body)
    }

    /// Render with the given arguments and no registry
    pub fn render(&self, args: impl Into<Arguments>) -> Result<Value, RenderError> {
        self.render_in(&Registry::new(), args)
    }

    /// Render with access to the templates and functions of `registry`
    pub fn render_in(
        &self,
        registry: &Registry,
        args: impl Into<Arguments>,
    ) -> Result<Value, RenderError> {
        render::render(self, registry, args.into())
    }
}

/// Compile a template with the plain strategy
pub fn compile(source: &str, signature: Signature) -> Result<Template, CompileError> {
    compile_with_options(source, signature, CompileOptions::default())
}

/// Compile a template with HTML escaping
pub fn compile_html(source: &str, signature: Signature) -> Result<Template, CompileError> {
    compile_with_options(
        source,
        signature,
        CompileOptions::default().with_strategy(HTML),
    )
}

/// Compile a template with custom options
pub fn compile_with_options(
    source: &str,
    signature: Signature,
    options: CompileOptions,
) -> Result<Template, CompileError> {
    let program = compile_program(source, options.base_depth)?;
    let tree = render::lower(&program)?;
    log::debug!(
        "compiled template '{}' ({} instructions, {} escaping)",
        options.name,
        program.len(),
        options.strategy.name
    );
    Ok(Template {
        name: options.name,
        signature,
        strategy: options.strategy,
        program: Arc::new(program),
        tree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_options_builder() {
        let options = CompileOptions::new()
            .with_name("row")
            .with_base_depth(0)
            .with_strategy(HTML);
        assert_eq!(options.name, "row");
        assert_eq!(options.base_depth, 0);
        assert_eq!(options.strategy, HTML);
    }

    #[test]
    fn test_listing() {
        let template = compile(
            "= {if n:}\n# {n}\n= {:}",
            Signature::parse("n=0").expect("Should parse"),
        )
        .expect("Should compile");
        insta::assert_snapshot!(template.listing(), @r###"
        def template(n=0):
            # {if n:}
            if n:
                output("\n")
                # {n}
                output_value(n)
                # {:}
        "###);
    }

    #[test]
    fn test_empty_listing() {
        let template = compile("", Signature::new()).expect("Should compile");
        assert_eq!(template.listing(), "def template():\n    pass");
        assert_eq!(template.render(()), Ok(Value::from("")));
    }

    #[test]
    fn test_template_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Template>();
        assert_send_sync::<Registry>();
        assert_send_sync::<Value>();
    }

    #[test]
    fn test_arguments_builder() {
        let args = Arguments::new().arg(1).kwarg("sep", ", ");
        assert_eq!(args.positional, vec![Value::Int(1)]);
        assert_eq!(args.keywords, vec![("sep".to_string(), Value::from(", "))]);
        assert!(!args.is_empty());
        assert!(Arguments::from(()).is_empty());
    }
}
