//! Run settings assembled from CLI flags, environment variables, and the
//! embedded defaults, in that order of precedence.

use std::path::PathBuf;

use case_geo_geocoder::config::NominatimConfig;
use case_geo_location::{AliasTable, LocationError, ResolverOptions, paths};

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct GlobalArgs {
    /// Location cache file (overrides `CASE_GEO_CACHE_PATH`)
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,
    /// Extra alias rules in TOML (overrides `CASE_GEO_ALIASES`)
    #[arg(long, global = true)]
    pub aliases: Option<PathBuf>,
    /// Prior-country value meaning "did not travel"
    #[arg(long, global = true)]
    pub home_country: Option<String>,
    /// Qualifier appended to home-region queries (e.g. "NZ")
    #[arg(long, global = true)]
    pub country_qualifier: Option<String>,
    /// Nominatim search endpoint (overrides `CASE_GEO_NOMINATIM_URL`)
    #[arg(long, global = true)]
    pub nominatim_url: Option<String>,
}

/// Everything a run needs to know before it starts.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Location cache file.
    pub cache_path: PathBuf,
    /// Alias override file, if any.
    pub aliases_path: Option<PathBuf>,
    /// Home-country settings for the resolver.
    pub resolver: ResolverOptions,
    /// Geocoder settings.
    pub nominatim: NominatimConfig,
}

impl Settings {
    /// Resolves settings from `args`, the environment, and the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the geocoder configuration is invalid.
    pub fn resolve(args: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let mut nominatim = NominatimConfig::from_env()?;
        if let Some(url) = &args.nominatim_url {
            nominatim.base_url.clone_from(url);
        }

        let defaults = ResolverOptions::default();

        Ok(Self {
            cache_path: args.cache.clone().unwrap_or_else(paths::location_cache_path),
            aliases_path: args.aliases.clone().or_else(paths::aliases_path),
            resolver: ResolverOptions {
                home_country: args.home_country.clone().unwrap_or(defaults.home_country),
                country_qualifier: args
                    .country_qualifier
                    .clone()
                    .unwrap_or(defaults.country_qualifier),
            },
            nominatim,
        })
    }

    /// Loads the built-in alias table plus the override file, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::AliasConfig`] if a table cannot be loaded.
    pub fn alias_table(&self) -> Result<AliasTable, LocationError> {
        self.aliases_path.as_deref().map_or_else(
            AliasTable::builtin,
            AliasTable::builtin_with_file,
        )
    }
}
