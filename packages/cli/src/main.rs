#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for case-geo.
//!
//! ```text
//! case_geo enrich --input confirmed.csv --input probable.csv [--output-dir out]
//! case_geo lookup "Capital and Coast"
//! case_geo lookup Australia --international
//! case_geo cache list|stats|path
//! case_geo aliases
//! ```
//!
//! Running `case_geo` with no subcommand enters interactive mode.
//!
//! Uses `indicatif-log-bridge` (via [`case_geo_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;
mod records;
mod run;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use case_geo_location::LocationError;
use case_geo_location_models::RegionContext;
use clap::{Parser, Subcommand};

use crate::records::{ColumnNames, DEFAULT_HOME_COLUMN, DEFAULT_PRIOR_COLUMN};
use crate::run::EnrichOptions;
use crate::settings::{GlobalArgs, Settings};

/// Exit code for a place name the geocoder cannot match.
const EXIT_UNRESOLVABLE: u8 = 2;

#[derive(Parser)]
#[command(
    name = "case_geo",
    about = "Attach coordinates to case records by resolving place names"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich one or more case sheets with coordinates
    Enrich {
        /// Input CSV file (repeatable; all inputs share one cache)
        #[arg(long = "input", short, required = true)]
        inputs: Vec<PathBuf>,
        /// Directory for `<stem>_enriched.csv` (defaults to each input's directory)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Home-region column header
        #[arg(long, default_value = DEFAULT_HOME_COLUMN)]
        home_column: String,
        /// Prior-country column header
        #[arg(long, default_value = DEFAULT_PRIOR_COLUMN)]
        prior_column: String,
        /// Title rows to skip before the header row
        #[arg(long, default_value = "0")]
        skip_rows: usize,
        /// Save locations learned before a failure instead of discarding them
        #[arg(long)]
        save_partial: bool,
    },
    /// Resolve a single place name through the cache
    Lookup {
        /// Place name as it appears in a case sheet
        name: String,
        /// Treat the name as a country rather than a home region
        #[arg(long)]
        international: bool,
    },
    /// Inspect the location cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// List the effective alias rules
    Aliases,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List every cached location
    List,
    /// Show the cache path and entry count
    Stats,
    /// Print the cache path
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let multi = case_geo_cli_utils::init_logger();
    let cli = Cli::parse();

    match dispatch(cli, &multi).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (code, report) = failure_report(e.as_ref());
            log::error!("{e}");
            eprintln!("{report}");
            ExitCode::from(code)
        }
    }
}

/// Exit code and stderr text for a failed run. Printed even when logging
/// is filtered out.
fn failure_report(e: &(dyn std::error::Error + 'static)) -> (u8, String) {
    match e.downcast_ref::<LocationError>() {
        Some(LocationError::Unresolvable { .. }) => (
            EXIT_UNRESOLVABLE,
            format!(
                "error: {e}\nAdd an [[alias]] entry to a TOML file and pass it with --aliases \
                 (or set {})",
                case_geo_location::paths::ALIASES_ENV
            ),
        ),
        _ => (1, format!("error: {e}")),
    }
}

async fn dispatch(
    cli: Cli,
    multi: &case_geo_cli_utils::MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::resolve(&cli.global)?;

    let Some(command) = cli.command else {
        return interactive::run(&settings, multi).await;
    };

    match command {
        Commands::Enrich {
            inputs,
            output_dir,
            home_column,
            prior_column,
            skip_rows,
            save_partial,
        } => {
            let options = EnrichOptions {
                inputs,
                output_dir,
                columns: ColumnNames {
                    home: home_column,
                    prior: prior_column,
                },
                skip_rows,
                save_partial,
            };
            run::enrich(&settings, &options, Some(multi)).await?;
        }
        Commands::Lookup {
            name,
            international,
        } => {
            let context = if international {
                RegionContext::International
            } else {
                RegionContext::Domestic
            };
            run::lookup(&settings, &name, context).await?;
        }
        Commands::Cache { command } => match command {
            CacheCommands::List => run::list_cache(&settings)?,
            CacheCommands::Stats => run::cache_stats(&settings)?,
            CacheCommands::Path => println!("{}", settings.cache_path.display()),
        },
        Commands::Aliases => run::list_aliases(&settings)?,
    }

    Ok(())
}
