//! Sightline CLI
//!
//! Command-line interface for the Sightline query core.
//!
//! # Usage
//!
//! ```bash
//! sightline --help
//! sightline translate "in:logs severity_text:error time:last_24h limit:20"
//! sightline translate --limit 50 "in:metrics bucket:5m agg:avg series:service_name"
//! ```

#![deny(unsafe_code)]

use clap::{Parser, Subcommand};
use shared::srql::{translate, Direction, Limits, SchemaCatalog};

/// Sightline CLI - SRQL translation and API utilities
#[derive(Parser)]
#[command(name = "sightline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API server URL
    #[arg(
        short,
        long,
        env = "SIGHTLINE_API_URL",
        default_value = "http://localhost:8080"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an SRQL query offline and print the SQL and parameters
    Translate {
        /// The SRQL query string
        query: String,

        /// Page size override
        #[arg(short, long)]
        limit: Option<i64>,

        /// Opaque cursor from a previous page
        #[arg(short, long)]
        cursor: Option<String>,

        /// Walk direction (next or prev)
        #[arg(short, long)]
        direction: Option<String>,
    },
    /// Check API server health
    Health,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Translate {
            query,
            limit,
            cursor,
            direction,
        }) => {
            let direction = direction
                .as_deref()
                .map(str::parse::<Direction>)
                .transpose()
                .map_err(anyhow::Error::msg)?;

            let compiled = translate(
                &query,
                cursor.as_deref(),
                direction,
                limit,
                &SchemaCatalog::with_defaults(),
                &Limits::default(),
            )?;

            println!("{}", compiled.sql);
            println!("{}", serde_json::to_string_pretty(&compiled.params)?);
        }
        Some(Commands::Health) => {
            println!("Checking health of Sightline API at {}...", cli.api_url);
            println!("Health check not yet implemented");
        }
        None => {
            println!("Sightline CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        // Verify CLI can parse without arguments
        let cli = Cli::try_parse_from(["sightline"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_translate_command() {
        let cli = Cli::try_parse_from(["sightline", "translate", "in:logs limit:5"]);
        assert!(cli.is_ok());
        let cli = cli.unwrap();
        assert!(matches!(cli.command, Some(Commands::Translate { .. })));
    }

    #[test]
    fn test_cli_translate_with_options() {
        let cli = Cli::try_parse_from([
            "sightline",
            "translate",
            "--limit",
            "10",
            "--direction",
            "next",
            "in:logs",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Translate {
                limit, direction, ..
            }) => {
                assert_eq!(limit, Some(10));
                assert_eq!(direction.as_deref(), Some("next"));
            }
            _ => panic!("expected translate command"),
        }
    }
}
