//! Place-name alias table.
//!
//! The published case data uses a few names the geocoder cannot place (an
//! administrative district name, an informal sub-region, a placeholder for
//! "not yet assigned"). The alias table rewrites those names before any
//! cache lookup or external call, so the rewritten name is also the cache
//! key.
//!
//! Matching is literal string equality. Names not in the table pass
//! through unchanged. A rule scoped to a [`RegionContext`] takes precedence
//! over an unscoped rule for the same raw name.
//!
//! The built-in table is embedded from `aliases/default.toml`. Operators
//! extend it with their own TOML file in the same format:
//!
//! ```toml
//! [[alias]]
//! raw = "Hutt Valley"
//! normalized = "Lower Hutt"
//! context = "domestic"   # optional
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use case_geo_location_models::RegionContext;
use serde::Deserialize;

use crate::LocationError;

const DEFAULT_ALIASES_TOML: &str = include_str!("../aliases/default.toml");

/// A single alias rule as written in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AliasRule {
    /// Name as it appears in the source data.
    pub raw: String,
    /// Name to use instead.
    pub normalized: String,
    /// Restricts the rule to one vocabulary. `None` applies to both.
    #[serde(default)]
    pub context: Option<RegionContext>,
}

#[derive(Debug, Deserialize)]
struct AliasFile {
    #[serde(default)]
    alias: Vec<AliasRule>,
}

/// Literal-equality substitution table applied before cache lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    rules: BTreeMap<(Option<RegionContext>, String), String>,
}

impl AliasTable {
    /// Returns an empty table (every name is its own normalized form).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the built-in table.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::AliasConfig`] if the embedded table is
    /// malformed.
    pub fn builtin() -> Result<Self, LocationError> {
        let mut table = Self::empty();
        table.extend_from_toml(DEFAULT_ALIASES_TOML, "<built-in aliases>")?;
        Ok(table)
    }

    /// Returns the built-in table extended with the rules in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::AliasConfig`] if the file cannot be read or
    /// parsed.
    pub fn builtin_with_file(path: &Path) -> Result<Self, LocationError> {
        let mut table = Self::builtin()?;
        let contents = std::fs::read_to_string(path).map_err(|e| LocationError::AliasConfig {
            origin: path.display().to_string(),
            message: e.to_string(),
        })?;
        table.extend_from_toml(&contents, &path.display().to_string())?;
        log::info!("Loaded alias overrides from {}", path.display());
        Ok(table)
    }

    /// Parses `contents` as an alias file and adds its rules. Later rules
    /// replace earlier ones with the same raw name and scope.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::AliasConfig`] if the TOML is malformed or a
    /// rule has an empty name.
    pub fn extend_from_toml(&mut self, contents: &str, origin: &str) -> Result<(), LocationError> {
        let file: AliasFile =
            toml::de::from_str(contents).map_err(|e| LocationError::AliasConfig {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;

        for rule in file.alias {
            if rule.raw.is_empty() || rule.normalized.trim().is_empty() {
                return Err(LocationError::AliasConfig {
                    origin: origin.to_string(),
                    message: format!("alias {:?} -> {:?} has an empty name", rule.raw, rule.normalized),
                });
            }
            self.insert(rule);
        }

        Ok(())
    }

    /// Adds or replaces a rule.
    pub fn insert(&mut self, rule: AliasRule) {
        if let Some(previous) = self
            .rules
            .insert((rule.context, rule.raw.clone()), rule.normalized.clone())
            && previous != rule.normalized
        {
            log::debug!(
                "Alias {:?} now maps to {:?} (was {previous:?})",
                rule.raw,
                rule.normalized
            );
        }
    }

    /// Returns the normalized form of `raw` in `context`.
    #[must_use]
    pub fn normalize(&self, raw: &str, context: RegionContext) -> String {
        self.lookup(raw, context).unwrap_or(raw).to_string()
    }

    fn lookup(&self, raw: &str, context: RegionContext) -> Option<&str> {
        self.rules
            .get(&(Some(context), raw.to_string()))
            .or_else(|| self.rules.get(&(None, raw.to_string())))
            .map(String::as_str)
    }

    /// Iterates the rules in the table.
    pub fn rules(&self) -> impl Iterator<Item = AliasRule> + '_ {
        self.rules
            .iter()
            .map(|((context, raw), normalized)| AliasRule {
                raw: raw.clone(),
                normalized: normalized.clone(),
                context: *context,
            })
    }

    /// Number of rules in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
