//! Output escaping strategies
//!
//! A strategy decides how expression results enter the output and what the
//! finished output is. [`HTML`] escapes everything that is not already
//! [`Value::Safe`] and marks its own result safe, so the output of one HTML
//! template embedded in another is never escaped twice.

use std::fmt;

use crate::error::EvalError;
use crate::render::builtins::NativeFn;
use crate::render::value::Value;

/// Pluggable escaping policy
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    /// Functions available to templates using this strategy
    pub prelude: &'static [(&'static str, NativeFn)],
    /// Applied to every expression value before it is output
    pub wrap_expression: fn(Value) -> Value,
    /// Applied to the joined output of a render
    pub wrap_result: fn(String) -> Value,
}

impl Strategy {
    /// Look up a strategy by its configuration name
    pub fn by_name(name: &str) -> Option<Strategy> {
        match name {
            "plain" => Some(PLAIN),
            "html" => Some(HTML),
            _ => None,
        }
    }

    pub fn prelude_fn(&self, name: &str) -> Option<NativeFn> {
        self.prelude
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }
}

impl Default for Strategy {
    fn default() -> Self {
        PLAIN
    }
}

impl PartialEq for Strategy {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name).finish()
    }
}

/// No escaping; values are output as text
pub const PLAIN: Strategy = Strategy {
    name: "plain",
    prelude: &[],
    wrap_expression: plain_expression,
    wrap_result: Value::Str,
};

/// HTML escaping with safe-string pass-through
pub const HTML: Strategy = Strategy {
    name: "html",
    prelude: &[("safe", safe as NativeFn), ("escape", escape as NativeFn)],
    wrap_expression: html_expression,
    wrap_result: Value::Safe,
};

fn plain_expression(value: Value) -> Value {
    match value {
        Value::Str(_) => value,
        other => Value::Str(other.to_string()),
    }
}

fn html_expression(value: Value) -> Value {
    match value {
        Value::Safe(_) => value,
        other => Value::Safe(escape_html(&other.to_string())),
    }
}

/// Replace the five HTML special characters with entities
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '>' => out.push_str("&gt;"),
            '<' => out.push_str("&lt;"),
            c => out.push(c),
        }
    }
    out
}

/// `safe(x)`: mark text as already escaped
fn safe(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [value] => Ok(Value::Safe(value.to_string())),
        _ => Err(EvalError::arguments(format!(
            "safe() takes 1 argument ({} given)",
            args.len()
        ))),
    }
}

/// `escape(x)`: escape unless already safe
fn escape(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [value] => Ok(html_expression(value.clone())),
        _ => Err(EvalError::arguments(format!(
            "escape() takes 1 argument ({} given)",
            args.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'Tom' & Jerry</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&apos;Tom&apos; &amp; Jerry&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_html_wraps_once() {
        let once = (HTML.wrap_expression)(Value::from("a < b"));
        assert_eq!(once, Value::safe("a &lt; b"));
        let twice = (HTML.wrap_expression)(once.clone());
        assert_eq!(twice, once);
        assert_eq!((HTML.wrap_expression)(Value::Int(3)), Value::safe("3"));
    }

    #[test]
    fn test_plain_outputs_text() {
        assert_eq!((PLAIN.wrap_expression)(Value::Int(3)), Value::from("3"));
        assert_eq!((PLAIN.wrap_result)("x".to_string()), Value::from("x"));
        assert_eq!((HTML.wrap_result)("x".to_string()), Value::safe("x"));
    }

    #[test]
    fn test_prelude() {
        assert!(PLAIN.prelude_fn("safe").is_none());
        let safe = HTML.prelude_fn("safe").expect("html has safe()");
        assert_eq!(safe(&[Value::from("<b>")]), Ok(Value::safe("<b>")));
        let escape = HTML.prelude_fn("escape").expect("html has escape()");
        assert_eq!(escape(&[Value::from("<b>")]), Ok(Value::safe("&lt;b&gt;")));
        assert_eq!(escape(&[Value::safe("<b>")]), Ok(Value::safe("<b>")));
    }

    #[test]
    fn test_by_name() {
        assert_eq!(Strategy::by_name("html"), Some(HTML));
        assert_eq!(Strategy::by_name("plain"), Some(PLAIN));
        assert_eq!(Strategy::by_name("latex"), None);
    }
}
