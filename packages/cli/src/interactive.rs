#![allow(clippy::module_name_repetitions)]

//! Interactive menu for running case-geo commands without memorizing
//! flags.

use std::path::PathBuf;

use case_geo_cli_utils::MultiProgress;
use case_geo_location_models::RegionContext;
use dialoguer::{Confirm, Input, Select};

use crate::records::ColumnNames;
use crate::run::{self, EnrichOptions};
use crate::settings::Settings;

/// Top-level actions available in the interactive menu.
enum Action {
    Enrich,
    Lookup,
    ListCache,
    CacheStats,
    ListAliases,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Enrich,
        Self::Lookup,
        Self::ListCache,
        Self::CacheStats,
        Self::ListAliases,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Enrich => "Enrich case sheets",
            Self::Lookup => "Look up a single location",
            Self::ListCache => "List cached locations",
            Self::CacheStats => "Show cache stats",
            Self::ListAliases => "List alias rules",
        }
    }
}

/// Prompts for an action and runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected command fails.
pub async fn run(settings: &Settings, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Case Geo");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Enrich => enrich_interactive(settings, multi).await?,
        Action::Lookup => lookup_interactive(settings).await?,
        Action::ListCache => run::list_cache(settings)?,
        Action::CacheStats => run::cache_stats(settings)?,
        Action::ListAliases => run::list_aliases(settings)?,
    }

    Ok(())
}

async fn enrich_interactive(
    settings: &Settings,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let raw: String = Input::new()
        .with_prompt("Input CSV file(s), comma-separated")
        .interact_text()?;

    let inputs: Vec<PathBuf> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect();

    if inputs.is_empty() {
        println!("No input files given.");
        return Ok(());
    }

    let output_dir = prompt_optional_path("Output directory (empty for next to each input)")?;

    let defaults = ColumnNames::default();
    let home: String = Input::new()
        .with_prompt("Home-region column")
        .default(defaults.home)
        .interact_text()?;
    let prior: String = Input::new()
        .with_prompt("Prior-country column")
        .default(defaults.prior)
        .interact_text()?;
    let skip_rows: usize = Input::new()
        .with_prompt("Title rows before the header")
        .default(0)
        .interact_text()?;
    let save_partial = Confirm::new()
        .with_prompt("Keep locations learned before a failure?")
        .default(false)
        .interact()?;

    let options = EnrichOptions {
        inputs,
        output_dir,
        columns: ColumnNames { home, prior },
        skip_rows,
        save_partial,
    };

    let summary = run::enrich(settings, &options, Some(multi)).await?;
    println!(
        "\n{} record(s) enriched, {} with travel history",
        summary.records, summary.records_with_travel
    );

    Ok(())
}

async fn lookup_interactive(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let name: String = Input::new().with_prompt("Place name").interact_text()?;

    let contexts = [RegionContext::Domestic, RegionContext::International];
    let labels: Vec<&str> = contexts.iter().copied().map(RegionContext::as_str).collect();
    let idx = Select::new()
        .with_prompt("Resolve as")
        .items(&labels)
        .default(0)
        .interact()?;

    run::lookup(settings, &name, contexts[idx]).await
}

fn prompt_optional_path(prompt: &str) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(PathBuf::from(trimmed)))
    }
}
