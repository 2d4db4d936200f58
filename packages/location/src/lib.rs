#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location enrichment for case records.
//!
//! Resolves the home-region and prior-country names on each
//! [`CaseRecord`](case_geo_location_models::CaseRecord) to coordinates:
//!
//! 1. [`normalize`] rewrites known-problematic names through the alias
//!    table.
//! 2. [`cache`] answers names that were resolved before, in this run or
//!    any earlier one.
//! 3. On a miss, [`resolver`] asks the geocoder once and caches the result.
//!
//! Each unique normalized name reaches the geocoder at most once for as
//! long as the cache file survives. A name the geocoder cannot place stops
//! the run with [`LocationError::Unresolvable`]; the fix is a new alias.

pub mod cache;
pub mod normalize;
pub mod paths;
pub mod progress;
pub mod resolver;

use std::path::PathBuf;

use case_geo_geocoder::GeocodeError;
use case_geo_location_models::RegionContext;

pub use cache::LocationCache;
pub use normalize::{AliasRule, AliasTable};
pub use resolver::{LocationResolver, Resolution, ResolverOptions};

/// Errors that can occur while enriching records.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    /// The geocoder answered but found no match.
    #[error(
        "Could not find coordinates for {context} location {name:?} (query {query:?}). \
         Add an alias mapping it to a name the geocoder recognises and re-run."
    )]
    Unresolvable {
        /// Normalized place name.
        name: String,
        /// Query string sent to the geocoder.
        query: String,
        /// Vocabulary the name was resolved in.
        context: RegionContext,
    },

    /// A place name is empty after trimming.
    #[error("Cannot resolve a blank {context} location name")]
    BlankName {
        /// Vocabulary the name was to be resolved in.
        context: RegionContext,
    },

    /// A record has no home region to resolve.
    #[error("Record {index} has a blank home region")]
    MissingHomeRegion {
        /// Zero-based position of the record in its batch.
        index: usize,
    },

    /// The geocoder could not be reached or returned garbage.
    #[error("Geocoding {query:?} failed: {source}")]
    Geocode {
        /// Query string sent to the geocoder.
        query: String,
        /// Underlying provider error.
        #[source]
        source: GeocodeError,
    },

    /// The cache file exists but cannot be parsed.
    #[error("Location cache {} is corrupt: {message}", .path.display())]
    CacheCorrupt {
        /// Cache file path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// An alias file could not be read or parsed.
    #[error("Invalid alias table {origin}: {message}")]
    AliasConfig {
        /// File path or other description of where the rules came from.
        origin: String,
        /// Description of what went wrong.
        message: String,
    },

    /// I/O error (cache file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
