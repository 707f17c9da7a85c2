//! Canister CLI - dependency injection container generator
//!
//! Usage: canister <COMMAND>
//!
//! Commands:
//!   generate  Generate container source from a definition
//!   catalog   Inspect a module catalog

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use canister::{
    emit, load_catalog, parse_definition, resolve, GofmtFormatter, ModuleCatalog,
    PassthroughFormatter, SourceFormatter,
};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            definition,
            catalog,
            output,
            no_format,
        } => cmd_generate(&definition, &catalog, output.as_deref(), no_format),
        Commands::Catalog { catalog, module } => cmd_catalog(&catalog, module.as_deref()),
    }
}

/// RUST_LOG wins; otherwise `-v` flags pick the level
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn cmd_generate(
    definition: &Path,
    catalog: &Path,
    output: Option<&Path>,
    no_format: bool,
) -> Result<()> {
    let source = fs::read_to_string(definition)
        .with_context(|| format!("could not read definition {}", definition.display()))?;
    let def = parse_definition(&source)
        .with_context(|| format!("invalid definition {}", definition.display()))?;

    let catalog = load_catalog(catalog)
        .with_context(|| format!("could not load catalog {}", catalog.display()))?;

    let container = resolve(&def, &catalog)?;

    let formatter: &dyn SourceFormatter = if no_format {
        &PassthroughFormatter
    } else {
        &GofmtFormatter
    };
    let rendered = emit(&container, formatter)?;

    match output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("could not write {}", path.display()))?;
            info!(path = %path.display(), bytes = rendered.len(), "wrote container");
        }
        None => print!("{rendered}"),
    }

    Ok(())
}

fn cmd_catalog(path: &Path, module: Option<&str>) -> Result<()> {
    let catalog = load_catalog(path)
        .with_context(|| format!("could not load catalog {}", path.display()))?;

    match module {
        Some(module) => print!("{}", catalog.lookup(module)?.describe()),
        None => {
            for module in catalog.modules() {
                print!("{}", module.describe());
            }
        }
    }

    Ok(())
}
