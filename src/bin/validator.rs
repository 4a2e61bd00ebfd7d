//! Scheme Validator CLI
//!
//! Validates documents against schema descriptions and inspects schema sets.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use familiar_scheme::config::OutputFormat;
use familiar_scheme::format::{format_for_path, format_named};
use familiar_scheme::{reconstruct, Field, Fingerprint, Format, Phase, Schemas, SchemeConfig};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scheme-validator")]
#[command(about = "Validate documents against schema descriptions")]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a document against a schema
    Validate {
        /// Schema description file
        schema: PathBuf,
        /// Document to validate
        document: PathBuf,
        /// Treat the schema file as a named set and use this schema
        #[arg(short, long)]
        name: Option<String>,
        /// Validate a canonical value on its way out
        #[arg(long)]
        outbound: bool,
        /// Do not require absent top-level keys
        #[arg(long)]
        partial: bool,
    },

    /// Print the normalized description and fingerprint of a schema
    Describe {
        /// Schema description file
        schema: PathBuf,
        /// Treat the schema file as a named set and use this schema
        #[arg(short, long)]
        name: Option<String>,
        /// Include attributes that hold their default values
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show references and recursive groups of a schema set
    Links {
        /// Schema set file
        schemas: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = SchemeConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Validate {
            schema,
            document,
            name,
            outbound,
            partial,
        } => {
            let field = load_schema(&config, &schema, name.as_deref())?;
            let value = read_document(&config, &document)?;
            let phase = if outbound { Phase::Outbound } else { Phase::Inbound };
            let options = config.process_options(phase).partial(partial);

            println!("🔍 Validating {} against {}", document.display(), schema.display());
            match field.process_with(value, &options) {
                Ok(processed) => {
                    println!("✅ Valid");
                    println!("{}", render(&config, &processed)?);
                    Ok(true)
                }
                Err(error) => {
                    let structural = error.into_structural()?;
                    let failures = structural.flatten();
                    println!("❌ {} error(s):", failures.len());
                    for (path, entry) in failures {
                        let path = if path.is_empty() { "(root)".to_string() } else { path };
                        let message = entry.message.as_deref().or(entry.token.as_deref()).unwrap_or("error");
                        println!("   └─ {}: {}", path, message);
                    }
                    Ok(false)
                }
            }
        }

        Commands::Describe { schema, name, verbose } => {
            let field = load_schema(&config, &schema, name.as_deref())?;
            let description = field.describe(None, verbose || config.describe.verbose)?;
            println!("{}", render(&config, &description)?);
            println!("🔒 {}", Fingerprint::of_field(&field)?);
            Ok(true)
        }

        Commands::Links { schemas } => {
            let schemas = load_schemas(&config, &schemas)?;
            println!("📦 {} schema(s)", schemas.len());
            for name in schemas.names() {
                let dependencies = schemas.dependencies(name);
                if dependencies.is_empty() {
                    println!("  {}", name);
                } else {
                    println!("  {} -> {}", name, dependencies.join(", "));
                }
            }

            let groups = schemas.recursive_groups();
            if groups.is_empty() {
                println!("✅ No recursive schemas");
            } else {
                println!("🔁 {} recursive group(s):", groups.len());
                for group in groups {
                    println!("   └─ {}", group.join(", "));
                }
            }
            Ok(true)
        }
    }
}

fn format_of(config: &SchemeConfig, path: &Path) -> anyhow::Result<&'static dyn Format> {
    match format_for_path(path) {
        Ok(format) => Ok(format),
        Err(_) => format_named(&config.format.default)
            .with_context(|| format!("no format for {}", path.display())),
    }
}

fn read_document(config: &SchemeConfig, path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value = format_of(config, path)?
        .unserialize(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn load_schemas(config: &SchemeConfig, path: &Path) -> anyhow::Result<Schemas> {
    let descriptions = read_document(config, path)?;
    Schemas::reconstruct(&descriptions).with_context(|| format!("linking schemas in {}", path.display()))
}

fn load_schema(config: &SchemeConfig, path: &Path, name: Option<&str>) -> anyhow::Result<Field> {
    match name {
        Some(name) => {
            let schemas = load_schemas(config, path)?;
            schemas
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow!("no schema named '{}' in {}", name, path.display()))
        }
        None => {
            let description = read_document(config, path)?;
            reconstruct(description).with_context(|| format!("reconstructing {}", path.display()))
        }
    }
}

fn render(config: &SchemeConfig, value: &Value) -> anyhow::Result<String> {
    Ok(match config.format.output {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Compact => serde_json::to_string(value)?,
    })
}
