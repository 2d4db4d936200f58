//! Command implementations shared by the flag-driven and interactive
//! front ends.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use case_geo_cli_utils::{IndicatifProgress, MultiProgress};
use case_geo_geocoder::nominatim::NominatimGeocoder;
use case_geo_location::progress::{NullProgress, ProgressCallback};
use case_geo_location::{LocationCache, LocationResolver, cache};
use case_geo_location_models::{EnrichmentSummary, RegionContext};

use crate::records::{CaseTable, ColumnNames};
use crate::settings::Settings;

/// Options for an `enrich` run.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Case sheets to enrich. All share one cache.
    pub inputs: Vec<PathBuf>,
    /// Where to write `<stem>_enriched.csv`. Defaults to each input's
    /// directory.
    pub output_dir: Option<PathBuf>,
    /// Column names holding the place names.
    pub columns: ColumnNames,
    /// Title rows to skip before the header.
    pub skip_rows: usize,
    /// Persist entries learned before a failure.
    pub save_partial: bool,
}

/// Enriches every input sheet, saves the cache once, then writes the
/// output sheets.
///
/// All inputs are read and validated before the first geocoder call,
/// including a check that no two inputs map to the same output file. If
/// any record fails to resolve, no output is written and the cache file is
/// left as it was (unless `save_partial` is set).
///
/// # Errors
///
/// Returns an error if reading, resolving, saving, or writing fails.
pub async fn enrich(
    settings: &Settings,
    options: &EnrichOptions,
    multi: Option<&MultiProgress>,
) -> Result<EnrichmentSummary, Box<dyn std::error::Error>> {
    let start = Instant::now();

    let aliases = settings.alias_table()?;
    let geocoder = NominatimGeocoder::new(&settings.nominatim)?;
    let resolver = LocationResolver::new(&geocoder, &aliases).with_options(settings.resolver.clone());

    let mut claimed: BTreeMap<PathBuf, &Path> = BTreeMap::new();
    for input in &options.inputs {
        let path = output_path(input, options.output_dir.as_deref());
        if let Some(previous) = claimed.insert(path.clone(), input) {
            return Err(format!(
                "{} and {} would both be written to {}; enrich them into separate output directories",
                previous.display(),
                input.display(),
                path.display()
            )
            .into());
        }
    }

    let mut batches = Vec::with_capacity(options.inputs.len());
    for input in &options.inputs {
        let table = CaseTable::read(input, options.skip_rows)
            .map_err(|e| format!("{}: {e}", input.display()))?;
        let records = table
            .case_records(&options.columns)
            .map_err(|e| format!("{}: {e}", input.display()))?;
        log::info!("{}: {} record(s)", input.display(), records.len());
        batches.push((input, table, records));
    }

    let mut cache = cache::load(&settings.cache_path)?;
    let mut total = EnrichmentSummary::default();
    let mut outputs = Vec::with_capacity(batches.len());

    for (input, table, records) in &batches {
        let label = input
            .file_name()
            .map_or_else(|| input.display().to_string(), |n| n.to_string_lossy().into_owned());
        let progress: Box<dyn ProgressCallback> = match multi {
            Some(multi) => Box::new(IndicatifProgress::records_bar(multi, &label)),
            None => Box::new(NullProgress),
        };

        match resolver.resolve_all(records, &mut cache, progress.as_ref()).await {
            Ok((enriched, summary)) => {
                total.absorb(&summary);
                outputs.push((output_path(input, options.output_dir.as_deref()), table, enriched));
            }
            Err(e) => {
                log::error!("{}: enrichment failed: {e}", input.display());
                persist_partial(&mut cache, &settings.cache_path, options.save_partial);
                return Err(e.into());
            }
        }
    }

    if cache.is_dirty() {
        cache::save(&mut cache, &settings.cache_path)?;
    } else {
        log::info!("No new locations learned, cache file unchanged");
    }

    for (path, table, enriched) in &outputs {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            case_geo_location::paths::ensure_dir(parent)?;
        }
        table.write_enriched_file(enriched, path)?;
        log::info!("Wrote {}", path.display());
    }

    log::info!(
        "Enrichment complete: {} record(s) in {:.1}s ({} cache hit(s), {} external lookup(s), {} new cache entries)",
        total.records,
        start.elapsed().as_secs_f64(),
        total.cache_hits,
        total.external_lookups,
        total.entries_learned
    );

    Ok(total)
}

fn persist_partial(cache: &mut LocationCache, path: &Path, save_partial: bool) {
    if !cache.is_dirty() {
        return;
    }
    if !save_partial {
        log::warn!(
            "Discarding {} location(s) learned before the failure (use --save-partial to keep them)",
            cache.learned_count()
        );
        return;
    }
    if let Err(e) = cache::save(cache, path) {
        log::error!("Failed to save partial cache: {e}");
    }
}

/// Returns `<output_dir or input dir>/<stem>_enriched.csv`.
#[must_use]
pub fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "cases".into(), |s| s.to_string_lossy().into_owned());
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{stem}_enriched.csv"))
}

/// Resolves a single name through the cache, saving the cache if the
/// geocoder had to be asked.
///
/// # Errors
///
/// Returns an error if loading, resolving, or saving fails.
pub async fn lookup(
    settings: &Settings,
    name: &str,
    context: RegionContext,
) -> Result<(), Box<dyn std::error::Error>> {
    let aliases = settings.alias_table()?;
    let geocoder = NominatimGeocoder::new(&settings.nominatim)?;
    let resolver = LocationResolver::new(&geocoder, &aliases).with_options(settings.resolver.clone());

    let mut cache = cache::load(&settings.cache_path)?;
    let resolution = resolver.resolve_one(&mut cache, name, context).await?;

    if cache.is_dirty() {
        cache::save(&mut cache, &settings.cache_path)?;
    }

    println!(
        "{} -> {} ({}, {}) [{}]",
        name,
        resolution.name,
        resolution.entry.lat,
        resolution.entry.long,
        if resolution.from_cache { "cached" } else { "geocoded" }
    );

    Ok(())
}

/// Prints every cached location.
///
/// # Errors
///
/// Returns an error if the cache cannot be loaded.
pub fn list_cache(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let cache = cache::load(&settings.cache_path)?;
    println!("{:<32} {:>14} {:>14}", "NAME", "LAT", "LONG");
    println!("{}", "-".repeat(62));
    for (name, entry) in cache.iter() {
        println!("{name:<32} {:>14} {:>14}", entry.lat, entry.long);
    }
    Ok(())
}

/// Prints where the cache lives and how many entries it holds.
///
/// # Errors
///
/// Returns an error if the cache cannot be loaded.
pub fn cache_stats(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let exists = settings.cache_path.exists();
    let cache = cache::load(&settings.cache_path)?;
    println!("Path:    {}", settings.cache_path.display());
    println!("Exists:  {exists}");
    println!("Entries: {}", cache.len());
    Ok(())
}

/// Prints the effective alias table.
///
/// # Errors
///
/// Returns an error if an alias table cannot be loaded.
pub fn list_aliases(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let aliases = settings.alias_table()?;
    println!("{:<28} {:<28} SCOPE", "RAW", "NORMALIZED");
    println!("{}", "-".repeat(70));
    for rule in aliases.rules() {
        println!(
            "{:<28} {:<28} {}",
            rule.raw,
            rule.normalized,
            rule.context.map_or("any", RegionContext::as_str)
        );
    }
    Ok(())
}
