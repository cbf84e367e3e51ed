//! Integration tests for the HTML escaping strategy

use pretty_assertions::assert_eq;
use sablon::{
    compile_html, compile_with_options, Arguments, CompileOptions, EvalError, Registry, Signature,
    Value, HTML,
};

const TABLE: &str = "\
<table>
  <tr>
    <td>Lorem</td>
    <td>ipsum</td>
    <td>dolor</td>
  </tr>
  <tr>
    <td>sit</td>
    <td>amet,</td>
    <td>quote-&lt;</td>
  </tr>
</table>";

fn rows() -> Value {
    let row = |text: &str| Value::from(text.split(' ').map(Value::from).collect::<Vec<_>>());
    Value::from(vec![row("Lorem ipsum dolor"), row("sit amet, quote-<")])
}

/// Indent every line by two spaces; the result is already markup
fn indent(args: &[Value]) -> Result<Value, EvalError> {
    let text = match args {
        [value] => value.to_string(),
        _ => return Err(EvalError::arguments("indent() takes exactly one argument")),
    };
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    Ok(Value::safe(format!("  {}", lines.join("  "))))
}

fn html_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_function("indent", indent)
        .expect("Should register");
    for (name, params, body) in [
        ("cell", "value", "= <td>{value}</td>"),
        (
            "html_row",
            "values",
            r#"
            = <tr>
            = {for value in values:}
            # {indent(cell(value))}
            = {:}
            # </tr>
            "#,
        ),
        (
            "html_table",
            "rows",
            r#"
            = <table>
            = {for row in rows:}
            # {indent(html_row(row))}
            = {:}
            # </table>
            "#,
        ),
    ] {
        let template = compile_with_options(
            body,
            Signature::parse(params).expect("Should parse"),
            CompileOptions::new().with_name(name).with_strategy(HTML),
        )
        .expect("Should compile");
        registry.register(template).expect("Should register");
    }
    registry
}

#[test]
fn test_table_from_registry_templates() {
    let registry = html_registry();
    let output = registry
        .render("html_table", Arguments::new().arg(rows()))
        .expect("Should render");
    assert!(output.is_safe());
    assert_eq!(output.to_string(), TABLE);
}

#[test]
fn test_table_with_local_routines() {
    let template = compile_html(
        r#"
        = {def cell(value):}
        =     <td>{value}</td>
        = {:}

        = {def html_row(values):}
        =   <tr>
        = {for value in values:}
        # {cell(value)}
        = {:}
        #   </tr>
        = {:}

        = <table>
        = {for row in rows:}
        # {html_row(row)}
        = {:}
        # </table>
        "#,
        Signature::parse("rows").expect("Should parse"),
    )
    .expect("Should compile");
    let output = template
        .render(Arguments::new().arg(rows()))
        .expect("Should render");
    assert_eq!(output, Value::safe(TABLE));
}

#[test]
fn test_special_characters_are_escaped_once() {
    let template = compile_html(
        "= <p title=\"{title}\">{body}</p>",
        Signature::parse("title, body").expect("Should parse"),
    )
    .expect("Should compile");
    let output = template
        .render(Arguments::new().arg("\"quoted\" & 'single'").arg("a < b > c"))
        .expect("Should render");
    assert_eq!(
        output.to_string(),
        "<p title=\"&quot;quoted&quot; &amp; &apos;single&apos;\">a &lt; b &gt; c</p>"
    );
}

#[test]
fn test_nested_render_is_not_escaped_twice() {
    let registry = html_registry();
    let cell = registry
        .render("cell", Arguments::new().arg("&"))
        .expect("Should render");
    assert_eq!(cell, Value::safe("<td>&amp;</td>"));

    // A safe value passed back in is output as is
    let outer = compile_html(
        "= {inner}|{plain}",
        Signature::parse("inner, plain").expect("Should parse"),
    )
    .expect("Should compile");
    let output = outer
        .render(Arguments::new().arg(cell.clone()).arg(cell.to_string()))
        .expect("Should render");
    assert_eq!(
        output.to_string(),
        "<td>&amp;</td>|&lt;td&gt;&amp;amp;&lt;/td&gt;"
    );
}

#[test]
fn test_prelude_functions() {
    let template = compile_html(
        "= {safe('<br>')}{escape(x)}{escape(safe('<i>'))}",
        Signature::parse("x").expect("Should parse"),
    )
    .expect("Should compile");
    let output = template
        .render(Arguments::new().arg("<b>"))
        .expect("Should render");
    assert_eq!(output.to_string(), "<br>&lt;b&gt;<i>");
}

#[test]
fn test_plain_template_called_from_html_is_escaped() {
    let mut registry = Registry::new();
    let raw = compile_with_options(
        "= <{tag}>",
        Signature::parse("tag").expect("Should parse"),
        CompileOptions::new().with_name("raw"),
    )
    .expect("Should compile");
    registry.register(raw).expect("Should register");

    let page = compile_html("= {raw('b')}", Signature::new()).expect("Should compile");
    let output = page.render_in(&registry, ()).expect("Should render");
    assert_eq!(output, Value::safe("&lt;b&gt;"));
}
