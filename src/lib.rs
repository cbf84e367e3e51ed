//! Sablon - text interleaved with code
//!
//! This library compiles templates written as lines of text with embedded
//! `{expressions}` and `{block:}...{:}` regions into immutable programs that
//! render strings from parameters.
//!
//! Each template line starts with a marker:
//!
//! - `# text` starts a new output line,
//! - `= text` continues the current one,
//! - any other line is a comment.
//!
//! # Example
//!
//! ```rust
//! use sablon::{compile_with_options, Arguments, CompileOptions, Signature};
//!
//! // A template can call itself by name
//! let template = compile_with_options(
//!     "= {if n // 2:}{binary(n // 2)}{:}{n % 2}",
//!     Signature::parse("n").unwrap(),
//!     CompileOptions::new().with_name("binary"),
//! )
//! .unwrap();
//! let binary = template.render(Arguments::new().arg(13)).unwrap();
//! assert_eq!(binary.to_string(), "1101");
//! ```

pub mod code;
pub mod compiler;
pub mod error;
pub mod escape;
pub mod manifest;
pub mod render;
pub mod template;

pub use compiler::{compile_program, Instruction, Program};
pub use error::{CompileError, EvalError, RenderError};
pub use escape::{Strategy, HTML, PLAIN};
pub use manifest::{Manifest, ManifestError};
pub use render::Value;
pub use template::{
    compile, compile_html, compile_with_options, Arguments, CompileOptions, Registry,
    RegistryError, Signature, SignatureError, Template,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_render() {
        let template =
            compile("= {n} + 1 = {n + 1}", Signature::parse("n").unwrap()).unwrap();
        assert_eq!(
            template.render(Arguments::new().arg(1)).unwrap(),
            Value::from("1 + 1 = 2")
        );
    }

    #[test]
    fn test_compile_html_marks_result_safe() {
        let template = compile_html("= <b>{x}</b>", Signature::parse("x").unwrap()).unwrap();
        assert_eq!(
            template.render(Arguments::new().arg("&")).unwrap(),
            Value::safe("<b>&amp;</b>")
        );
    }

    #[test]
    fn test_compile_error() {
        let result = compile("#nope", Signature::new());
        assert!(matches!(result, Err(CompileError::MalformedLine { line: 1, .. })));
    }
}
