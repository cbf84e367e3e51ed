//! Integration tests for template manifests

use std::path::Path;

use pretty_assertions::assert_eq;
use sablon::{Arguments, Manifest, ManifestError, RegistryError, RenderError, Value, HTML, PLAIN};

fn fixture(name: &str) -> Manifest {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    Manifest::from_file(&path).expect("Should load manifest")
}

fn rows() -> Value {
    Value::from(vec![
        vec![Value::from("a & b"), Value::from(1)],
        vec![Value::from("<c>"), Value::from(2.5)],
    ])
}

#[test]
fn test_load_fixture() {
    let manifest = fixture("table.toml");
    let names: Vec<&str> = manifest.templates.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["cell", "row", "table", "title"]);
    assert_eq!(manifest.strategy, HTML);
    assert_eq!(manifest.template("table").map(|t| t.strategy), Some(HTML));
    assert_eq!(manifest.template("title").map(|t| t.strategy), Some(PLAIN));
}

#[test]
fn test_render_table() {
    let registry = fixture("table.toml")
        .into_registry()
        .expect("Should compile");
    let output = registry
        .render(
            "table",
            Arguments::new().arg(rows()).kwarg("caption", "Scores"),
        )
        .expect("Should render");
    assert!(output.is_safe());
    insta::assert_snapshot!(output.to_string(), @r###"
    <table>
      <caption>Scores</caption>
    <tr>
      <td>a &amp; b</td>
      <td>1</td>
    </tr>
    <tr>
      <td>&lt;c&gt;</td>
      <td>2.5</td>
    </tr>
    </table>
    "###);
}

#[test]
fn test_default_parameter() {
    let registry = fixture("table.toml")
        .into_registry()
        .expect("Should compile");
    let output = registry
        .render("table", Arguments::new().arg(Vec::<Value>::new()))
        .expect("Should render");
    assert_eq!(output, Value::safe("<table>\n</table>"));
}

#[test]
fn test_plain_template_in_html_manifest() {
    let registry = fixture("table.toml")
        .into_registry()
        .expect("Should compile");
    let output = registry
        .render("title", Arguments::new().arg("a<b"))
        .expect("Should render");
    assert_eq!(output, Value::from("== A<B =="));
}

#[test]
fn test_unknown_template() {
    let registry = fixture("table.toml")
        .into_registry()
        .expect("Should compile");
    assert_eq!(
        registry.render("missing", ()),
        Err(RenderError::Registry(RegistryError::NotFound {
            name: "missing".to_string()
        }))
    );
}

#[test]
fn test_invalid_signature() {
    let manifest = Manifest::from_str(
        r#"
[templates.bad]
params = "a=1, b"
body = "= {a}{b}"
"#,
    )
    .expect("Should parse");
    match manifest.into_registry() {
        Err(ManifestError::Signature { name, .. }) => assert_eq!(name, "bad"),
        other => panic!("Expected signature error, got {:?}", other),
    }
}

#[test]
fn test_missing_file() {
    let result = Manifest::from_file(Path::new("does/not/exist.toml"));
    assert!(matches!(result, Err(ManifestError::Io(_))));
}
