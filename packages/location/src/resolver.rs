//! Resolution orchestrator.
//!
//! Walks the records strictly in input order and awaits every geocoder
//! call before moving on, inserting each new result into the cache
//! immediately. That ordering is what guarantees at most one external call
//! per normalized name: the second occurrence of a name always finds the
//! entry the first occurrence inserted.

use case_geo_geocoder::Geocoder;
use case_geo_location_models::{
    CaseRecord, CoordinateEntry, EnrichedRecord, EnrichmentSummary, RegionContext,
};

use crate::cache::LocationCache;
use crate::normalize::AliasTable;
use crate::progress::ProgressCallback;
use crate::LocationError;

/// Country whose name in the prior-country field means "did not travel".
pub const DEFAULT_HOME_COUNTRY: &str = "New Zealand";

/// Qualifier appended to domestic queries.
pub const DEFAULT_COUNTRY_QUALIFIER: &str = "NZ";

/// Home-country settings for a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Literal prior-country value treated as "no travel".
    pub home_country: String,
    /// Appended to domestic names as `"{name}, {qualifier}"`.
    pub country_qualifier: String,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            home_country: DEFAULT_HOME_COUNTRY.to_string(),
            country_qualifier: DEFAULT_COUNTRY_QUALIFIER.to_string(),
        }
    }
}

/// Outcome of resolving a single name.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The normalized name (the cache key).
    pub name: String,
    /// Resolved coordinates.
    pub entry: CoordinateEntry,
    /// `true` if the cache answered, `false` if the geocoder was called.
    pub from_cache: bool,
    /// `true` if this call added a new cache entry.
    pub learned: bool,
}

/// Resolves place names through the alias table, cache, and geocoder.
pub struct LocationResolver<'a> {
    geocoder: &'a dyn Geocoder,
    aliases: &'a AliasTable,
    options: ResolverOptions,
}

impl<'a> LocationResolver<'a> {
    /// Creates a resolver with the default home-country settings.
    #[must_use]
    pub fn new(geocoder: &'a dyn Geocoder, aliases: &'a AliasTable) -> Self {
        Self {
            geocoder,
            aliases,
            options: ResolverOptions::default(),
        }
    }

    /// Replaces the home-country settings.
    #[must_use]
    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the geocoder query for a normalized name.
    #[must_use]
    pub fn build_query(&self, name: &str, context: RegionContext) -> String {
        match context {
            RegionContext::Domestic => format!("{name}, {}", self.options.country_qualifier),
            RegionContext::International => name.to_string(),
        }
    }

    /// Returns the prior country to resolve, or `None` if the record shows
    /// no international travel (absent, blank, or the home country).
    #[must_use]
    pub fn prior_country<'r>(&self, record: &'r CaseRecord) -> Option<&'r str> {
        record
            .prior_country
            .as_deref()
            .filter(|country| !country.trim().is_empty() && *country != self.options.home_country)
    }

    /// Asks the geocoder for a normalized name. Does not touch the cache.
    ///
    /// # Errors
    ///
    /// * [`LocationError::Unresolvable`] if the geocoder found nothing.
    /// * [`LocationError::Geocode`] if the geocoder failed.
    pub async fn resolve_external(
        &self,
        name: &str,
        context: RegionContext,
    ) -> Result<CoordinateEntry, LocationError> {
        let query = self.build_query(name, context);

        let result = self
            .geocoder
            .geocode(&query)
            .await
            .map_err(|source| LocationError::Geocode {
                query: query.clone(),
                source,
            })?;

        let Some(found) = result else {
            log::error!(
                "{}: no match for {context} location {name:?} (query {query:?})",
                self.geocoder.name()
            );
            return Err(LocationError::Unresolvable {
                name: name.to_string(),
                query,
                context,
            });
        };

        let entry = CoordinateEntry::new(found.latitude, found.longitude);
        if !entry.is_finite() {
            return Err(LocationError::Geocode {
                query,
                source: case_geo_geocoder::GeocodeError::Parse {
                    message: format!("non-finite coordinates {entry:?}"),
                },
            });
        }

        log::info!(
            "{}: resolved {name:?} -> ({}, {}){}",
            self.geocoder.name(),
            entry.lat,
            entry.long,
            found
                .display_name
                .map(|d| format!(" [{d}]"))
                .unwrap_or_default()
        );

        Ok(entry)
    }

    /// Normalizes `raw`, answers from the cache if possible, and otherwise
    /// resolves externally and inserts the result.
    ///
    /// # Errors
    ///
    /// * [`LocationError::BlankName`] if `raw` is empty after trimming.
    /// * Anything [`Self::resolve_external`] returns.
    pub async fn resolve_one(
        &self,
        cache: &mut LocationCache,
        raw: &str,
        context: RegionContext,
    ) -> Result<Resolution, LocationError> {
        if raw.trim().is_empty() {
            return Err(LocationError::BlankName { context });
        }

        let name = self.aliases.normalize(raw, context);
        if name != raw {
            log::debug!("Normalized {raw:?} to {name:?}");
        }

        if let Some(entry) = cache.get(&name) {
            return Ok(Resolution {
                name,
                entry,
                from_cache: true,
                learned: false,
            });
        }

        let entry = self.resolve_external(&name, context).await?;
        let learned = cache.insert(&name, entry);

        Ok(Resolution {
            name,
            entry,
            from_cache: false,
            learned,
        })
    }

    async fn resolve_counted(
        &self,
        cache: &mut LocationCache,
        raw: &str,
        context: RegionContext,
        summary: &mut EnrichmentSummary,
    ) -> Result<CoordinateEntry, LocationError> {
        let resolution = self.resolve_one(cache, raw, context).await?;
        if resolution.from_cache {
            summary.cache_hits += 1;
        } else {
            summary.external_lookups += 1;
        }
        if resolution.learned {
            summary.entries_learned += 1;
        }
        Ok(resolution.entry)
    }

    /// Enriches one record.
    ///
    /// # Errors
    ///
    /// * [`LocationError::MissingHomeRegion`] if the home region is blank.
    /// * Anything [`Self::resolve_one`] returns.
    pub async fn resolve_record(
        &self,
        cache: &mut LocationCache,
        index: usize,
        record: &CaseRecord,
        summary: &mut EnrichmentSummary,
    ) -> Result<EnrichedRecord, LocationError> {
        if record.home_region.trim().is_empty() {
            return Err(LocationError::MissingHomeRegion { index });
        }

        let home = self
            .resolve_counted(cache, &record.home_region, RegionContext::Domestic, summary)
            .await?;

        let prior = match self.prior_country(record) {
            Some(country) => {
                summary.records_with_travel += 1;
                Some(
                    self.resolve_counted(cache, country, RegionContext::International, summary)
                        .await?,
                )
            }
            None => None,
        };

        summary.records += 1;
        Ok(EnrichedRecord::new(record.clone(), home, prior))
    }

    /// Enriches every record in input order.
    ///
    /// The cache is updated in place. Nothing is persisted; call
    /// [`crate::cache::save`] once the whole run has succeeded.
    ///
    /// # Errors
    ///
    /// Stops at the first record that fails and returns its error. Entries
    /// learned before the failure stay in `cache`.
    pub async fn resolve_all(
        &self,
        records: &[CaseRecord],
        cache: &mut LocationCache,
        progress: &dyn ProgressCallback,
    ) -> Result<(Vec<EnrichedRecord>, EnrichmentSummary), LocationError> {
        let mut summary = EnrichmentSummary::default();
        let mut enriched = Vec::with_capacity(records.len());

        progress.set_total(records.len() as u64);

        for (index, record) in records.iter().enumerate() {
            progress.set_message(record.home_region.clone());
            enriched.push(
                self.resolve_record(cache, index, record, &mut summary)
                    .await?,
            );
            progress.inc(1);
        }

        log::info!(
            "Enriched {} record(s): {} cache hit(s), {} external lookup(s), {} learned, {} with travel",
            summary.records,
            summary.cache_hits,
            summary.external_lookups,
            summary.entries_learned,
            summary.records_with_travel
        );
        progress.finish(format!("{} records enriched", summary.records));

        Ok((enriched, summary))
    }
}
