use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Canister - build-time dependency injection container generator
#[derive(Parser, Debug)]
#[command(name = "canister")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate container source from a definition
    Generate {
        /// Path to the YAML container definition
        #[arg(short, long, default_value = "container.yml")]
        definition: PathBuf,

        /// Path to the JSON module catalog
        #[arg(short, long, default_value = "catalog.json")]
        catalog: PathBuf,

        /// Write the generated source here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the gofmt pass (emit raw rendered source)
        #[arg(long)]
        no_format: bool,
    },

    /// Inspect a module catalog (debugging)
    Catalog {
        /// Path to the JSON module catalog
        #[arg(short, long, default_value = "catalog.json")]
        catalog: PathBuf,

        /// List a single module instead of all of them
        #[arg(short, long)]
        module: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_generate_defaults() {
        let cli = Cli::try_parse_from(["canister", "generate"]).unwrap();
        if let Commands::Generate {
            definition,
            catalog,
            output,
            no_format,
        } = cli.command
        {
            assert_eq!(definition, PathBuf::from("container.yml"));
            assert_eq!(catalog, PathBuf::from("catalog.json"));
            assert_eq!(output, None);
            assert!(!no_format);
        } else {
            panic!("Expected Generate command");
        }
    }

    #[test]
    fn test_cli_parse_generate_with_args() {
        let cli = Cli::try_parse_from([
            "canister",
            "generate",
            "--definition",
            "services.yml",
            "--catalog",
            "modules.json",
            "--output",
            "container.go",
            "--no-format",
        ])
        .unwrap();

        if let Commands::Generate {
            definition,
            catalog,
            output,
            no_format,
        } = cli.command
        {
            assert_eq!(definition, PathBuf::from("services.yml"));
            assert_eq!(catalog, PathBuf::from("modules.json"));
            assert_eq!(output, Some(PathBuf::from("container.go")));
            assert!(no_format);
        } else {
            panic!("Expected Generate command");
        }
    }

    #[test]
    fn test_cli_parse_catalog() {
        let cli = Cli::try_parse_from([
            "canister",
            "catalog",
            "--module",
            "github.com/acme/example",
        ])
        .unwrap();

        if let Commands::Catalog { catalog, module } = cli.command {
            assert_eq!(catalog, PathBuf::from("catalog.json"));
            assert_eq!(module.as_deref(), Some("github.com/acme/example"));
        } else {
            panic!("Expected Catalog command");
        }
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["canister", "-vv", "generate"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_verbose_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["canister", "generate", "-v"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["canister"]).is_err());
    }
}
