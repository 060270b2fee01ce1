//! Stepvars CLI Entry Point
//!
//! Resolves templates against a saved execution snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Resolve one template string
//! stepvars snapshot.yaml --template "Hello {{user.name|capitalize}}"
//!
//! # Resolve every string in a step configuration file
//! stepvars snapshot.yaml --template-file http_step.yaml
//!
//! # Show which references resolve
//! stepvars snapshot.yaml --template "{{a}} {{b}}" --preview
//!
//! # List the variables a workflow declares
//! stepvars --schema workflow.yaml
//! ```

use std::env;
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info, warn};
use serde_json::Value as JsonValue;

use stepvars::catalog::{load_schema, load_snapshot, VariableCatalog};
use stepvars::loader::load_document;
use stepvars::resolve::{EngineOptions, PreviewReport, ResolutionEngine, UnresolvedPolicy};
use stepvars::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    snapshot_path: Option<String>,
    template: Option<String>,
    template_file: Option<String>,
    schema_path: Option<String>,
    config_path: Option<String>,
    on_unresolved: Option<UnresolvedPolicy>,
    preview: bool,
    strict: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Variable Reference Resolution");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: stepvars [OPTIONS] [SNAPSHOT_FILE]");
    println!();
    println!("Arguments:");
    println!("  [SNAPSHOT_FILE]         Execution snapshot (YAML/JSON) to resolve against");
    println!();
    println!("Options:");
    println!("  --template TEXT         Resolve a template string");
    println!("  --template-file PATH    Resolve every string in a YAML/JSON document");
    println!("  --schema PATH           List the variables a workflow schema declares");
    println!("  --config PATH           Load engine options from a YAML/JSON file");
    println!("  --on-unresolved POLICY  literal, empty or keep (default: literal)");
    println!("  --preview               Show each reference and whether it resolved");
    println!("  --strict                Fail if any reference is unresolved");
    println!("  --verbose               Enable debug logging");
    println!("  --help                  Show this help message");
    println!("  --version               Show version information");
    println!();
    println!("Examples:");
    println!("  stepvars snapshot.yaml --template \"Hi {{{{user.name}}}}\"");
    println!("  stepvars snapshot.yaml --template-file step.yaml --on-unresolved keep");
    println!("  stepvars --schema workflow.yaml --template \"{{{{form.email}}}}\"");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--preview" => {
                config.preview = true;
            }
            "--strict" => {
                config.strict = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--template" | "--template-file" | "--schema" | "--config" | "--on-unresolved" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    return Err(format!("{} requires an argument", arg));
                };
                match arg.as_str() {
                    "--template" => config.template = Some(value.clone()),
                    "--template-file" => config.template_file = Some(value.clone()),
                    "--schema" => config.schema_path = Some(value.clone()),
                    "--config" => config.config_path = Some(value.clone()),
                    _ => config.on_unresolved = Some(value.parse()?),
                }
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.snapshot_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.snapshot_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    if config.template.is_some() && config.template_file.is_some() {
        return Err("--template and --template-file are mutually exclusive".to_string());
    }
    if config.template.is_none() && config.template_file.is_none() && config.schema_path.is_none() {
        return Err("Nothing to do: give --template, --template-file or --schema".to_string());
    }

    Ok(config)
}

/// Builds engine options from the config file and command-line overrides.
fn load_options(config: &Config) -> Result<EngineOptions, Box<dyn std::error::Error>> {
    let mut options = match &config.config_path {
        Some(path) => EngineOptions::load(path)?,
        None => EngineOptions::default(),
    };
    if let Some(policy) = config.on_unresolved {
        options.on_unresolved = policy;
    }
    info!("Unresolved references: {}", options.on_unresolved);
    Ok(options)
}

/// Prints every reference of a preview, colored by outcome.
fn print_preview(report: &PreviewReport) {
    println!("{}", report.resolved);
    println!();
    for variable in &report.variables {
        let value = variable.value.to_display_string();
        if variable.resolved {
            println!("  {} {} = {}", "✓".green(), variable.raw, value.green());
        } else {
            println!("  {} {} = {}", "✗".red(), variable.raw, value.red());
        }
        for diagnostic in &variable.diagnostics {
            println!("      {}", diagnostic.to_string().yellow());
        }
    }
    let unresolved = report.unresolved().count();
    if unresolved > 0 {
        println!();
        println!("{} unresolved reference(s)", unresolved.to_string().red().bold());
    }
}

/// Prints the declared variables of a schema, grouped by category.
fn print_catalog(catalog: &VariableCatalog) {
    for group in catalog.groups_by_category() {
        let title = group
            .category
            .map(|category| format!("{:?}", category))
            .unwrap_or_else(|| "Other".to_string());
        println!("{}", title.bold());
        for variable in group.variables {
            println!("  {{{{{}}}}}  {} ({:?})", variable.path, variable.name, variable.var_type);
        }
    }
    println!();
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    if config.preview || config.schema_path.is_some() {
        print_banner();
    }

    let engine = ResolutionEngine::default().with_options(load_options(&config)?);

    // Load the live context
    let mut runtime = VariableCatalog::new();
    if let Some(path) = &config.snapshot_path {
        let snapshot = load_snapshot(path).map_err(|e| {
            error!("Failed to load snapshot: {}", e);
            e
        })?;
        runtime.initialize_from_execution_context(&snapshot);
    }

    if let Some(path) = &config.schema_path {
        let mut declared = VariableCatalog::new();
        declared.initialize_from_workflow_schema(&load_schema(path)?);
        print_catalog(&declared);

        if let Some(template) = &config.template {
            for path in declared.unknown_paths(template) {
                warn!("'{}' is not declared by the workflow", path);
            }
        }
    }

    let context = runtime.context();

    if let Some(template) = &config.template {
        if config.preview {
            print_preview(&engine.preview(template, context));
        } else if config.strict {
            println!("{}", engine.try_resolve_in_string(template, context)?);
        } else {
            println!("{}", engine.resolve_in_string(template, context));
        }
    }

    if let Some(path) = &config.template_file {
        let document: JsonValue = load_document(path)?;
        if config.strict {
            let unresolved = unresolved_strings(&engine, &document, context);
            if !unresolved.is_empty() {
                return Err(format!("unresolved variables: {}", unresolved.join(", ")).into());
            }
        }
        let resolved = engine.resolve_deep(&document, context);
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    }

    Ok(())
}

/// Unresolved paths across every string in a document, deduplicated.
fn unresolved_strings(
    engine: &ResolutionEngine,
    document: &JsonValue,
    context: &stepvars::ResolutionContext,
) -> Vec<String> {
    let mut paths = Vec::new();
    let mut pending = vec![document];
    while let Some(value) = pending.pop() {
        match value {
            JsonValue::String(text) => {
                for path in engine.unresolved_paths(text, context) {
                    if !paths.contains(&path) {
                        paths.push(path);
                    }
                }
            }
            JsonValue::Array(items) => pending.extend(items.iter().rev()),
            JsonValue::Object(fields) => pending.extend(fields.values().rev()),
            _ => {}
        }
    }
    paths
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("stepvars")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_template_with_snapshot() {
        let config =
            parse_arguments(&args(&["snap.yaml", "--template", "{{a}}", "--preview"])).unwrap();
        assert_eq!(config.snapshot_path.as_deref(), Some("snap.yaml"));
        assert_eq!(config.template.as_deref(), Some("{{a}}"));
        assert!(config.preview);
        assert!(!config.strict);
    }

    #[test]
    fn test_parse_on_unresolved() {
        let config =
            parse_arguments(&args(&["--template", "x", "--on-unresolved", "keep"])).unwrap();
        assert_eq!(config.on_unresolved, Some(UnresolvedPolicy::Keep));

        let err =
            parse_arguments(&args(&["--template", "x", "--on-unresolved", "drop"])).unwrap_err();
        assert!(err.contains("drop"));
    }

    #[test]
    fn test_parse_missing_value() {
        let err = parse_arguments(&args(&["--template"])).unwrap_err();
        assert!(err.contains("--template"));
    }

    #[test]
    fn test_parse_requires_work() {
        assert!(parse_arguments(&args(&["snap.yaml"])).is_err());
        assert!(parse_arguments(&args(&["--schema", "wf.yaml"])).is_ok());
    }

    #[test]
    fn test_parse_rejects_conflicts() {
        assert!(parse_arguments(&args(&["--template", "x", "--template-file", "y"])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "b.yaml", "--template", "x"])).is_err());
        assert!(parse_arguments(&args(&["--template", "x", "--bogus"])).is_err());
    }

    #[test]
    fn test_load_options_override() {
        let config = Config {
            on_unresolved: Some(UnresolvedPolicy::Empty),
            ..Default::default()
        };
        let options = load_options(&config).unwrap();
        assert_eq!(options.on_unresolved, UnresolvedPolicy::Empty);
    }

    #[test]
    fn test_unresolved_strings_walks_document() {
        let engine = ResolutionEngine::default();
        let document = serde_json::json!({
            "url": "https://x/{{host}}",
            "headers": [{"auth": "{{token}}"}, "{{host}}"],
            "retries": 3
        });
        let mut paths = unresolved_strings(&engine, &document, &Default::default());
        paths.sort();
        assert_eq!(paths, vec!["host".to_string(), "token".to_string()]);
    }
}
