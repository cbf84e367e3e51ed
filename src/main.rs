//! Sablon CLI
//!
//! Usage:
//!   sablon [OPTIONS] [FILE]
//!
//! Options:
//!   -p, --params <SIG>   Parameter list of the template, e.g. "n, sep=', '"
//!   -a, --args <FILE>    Keyword arguments for the call (TOML table)
//!   --html               Escape expression values for HTML
//!   -m, --manifest       FILE is a manifest of named templates (TOML)
//!   -c, --call <NAME>    Template of the manifest to render
//!   -l, --listing        Print the compiled program instead of rendering
//!   -h, --help           Print help

use std::fmt::Display;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;

use sablon::{
    compile_with_options, Arguments, CompileOptions, Manifest, ManifestError, Registry,
    Signature, Template, Value, HTML, PLAIN,
};

#[derive(Parser)]
#[command(name = "sablon")]
#[command(about = "Compile and render text-interleaved-with-code templates")]
struct Cli {
    /// Input file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Parameter list of the template
    #[arg(short, long, default_value = "")]
    params: String,

    /// TOML file with keyword arguments for the call
    #[arg(short, long)]
    args: Option<PathBuf>,

    /// Escape expression values for HTML
    #[arg(long)]
    html: bool,

    /// The input is a manifest of named templates
    #[arg(short, long)]
    manifest: bool,

    /// Template of the manifest to render
    #[arg(short, long)]
    call: Option<String>,

    /// Print the compiled program instead of rendering
    #[arg(short, long)]
    listing: bool,
}

fn fail(message: impl Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    // Read input
    let source = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => fail(format!("reading file '{}': {}", path.display(), e)),
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => buffer,
                Err(e) => fail(format!("reading from stdin: {}", e)),
            }
        }
    };

    let arguments = match &cli.args {
        Some(path) => load_arguments(path),
        None => Arguments::new(),
    };

    let (template, registry) = if cli.manifest {
        load_manifest(&cli, &source)
    } else {
        (compile_input(&cli, &source), Registry::new())
    };

    if cli.listing {
        println!("{}", template.listing());
        return;
    }

    match template.render_in(&registry, arguments) {
        Ok(output) => println!("{}", output),
        Err(e) => fail(e),
    }
}

fn input_name(cli: &Cli) -> String {
    cli.input
        .as_ref()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template".to_string())
}

fn compile_input(cli: &Cli, source: &str) -> Template {
    let signature = match Signature::parse(&cli.params) {
        Ok(signature) => signature,
        Err(e) => fail(format!("--params: {}", e)),
    };
    let name = input_name(cli);
    let options = CompileOptions::new()
        .with_name(name.as_str())
        .with_strategy(if cli.html { HTML } else { PLAIN });
    match compile_with_options(source, signature, options) {
        Ok(template) => template,
        Err(e) => {
            eprint!("{}", e.format(source, &name));
            std::process::exit(1);
        }
    }
}

fn load_manifest(cli: &Cli, source: &str) -> (Template, Registry) {
    let manifest = match Manifest::from_str(source) {
        Ok(manifest) => manifest,
        Err(e) => fail(e),
    };
    let registry = match manifest.into_registry() {
        Ok(registry) => registry,
        Err(ManifestError::Compile { name, source: err }) => {
            let body = manifest
                .template(&name)
                .map(|t| t.body.as_str())
                .unwrap_or_default();
            eprint!("{}", err.format(body, &name));
            std::process::exit(1);
        }
        Err(e) => fail(e),
    };

    let name = match (&cli.call, registry.names().as_slice()) {
        (Some(name), _) => name.clone(),
        (None, [only]) => only.to_string(),
        (None, names) => fail(format!(
            "--call is required to pick one of: {}",
            names.join(", ")
        )),
    };
    let template = registry.get(&name).cloned();
    match template {
        Some(template) => (template, registry),
        None => fail(format!("template not found: {}", name)),
    }
}

fn load_arguments(path: &Path) -> Arguments {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => fail(format!("reading arguments '{}': {}", path.display(), e)),
    };
    let table: toml::Table = match toml::from_str(&content) {
        Ok(table) => table,
        Err(e) => fail(format!("parsing arguments '{}': {}", path.display(), e)),
    };
    table
        .into_iter()
        .fold(Arguments::new(), |args, (name, value)| {
            args.kwarg(name, Value::from(value))
        })
}
