//! Durable place-name → coordinate cache.
//!
//! Stored as a pretty-printed JSON object keyed by normalized place name:
//!
//! ```json
//! {
//!   "Wellington": {
//!     "lat": -41.2887953,
//!     "long": 174.7772114
//!   }
//! }
//! ```
//!
//! Keys are written in sorted order so the file diffs cleanly. A missing
//! file, an empty file, and `{}` all load as an empty cache. A file that
//! exists but does not parse is reported as [`LocationError::CacheCorrupt`]
//! and is never overwritten.
//!
//! Entries are only ever added. [`LocationCache::insert`] refuses to
//! replace an existing key, and [`save`] merges whatever is already on disk
//! underneath the in-memory entries before writing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use case_geo_location_models::CoordinateEntry;

use crate::LocationError;

/// In-memory location cache for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationCache {
    entries: BTreeMap<String, CoordinateEntry>,
    learned: BTreeSet<String>,
}

impl LocationCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache from existing entries. None of them count as learned.
    #[must_use]
    pub fn from_entries(entries: BTreeMap<String, CoordinateEntry>) -> Self {
        Self {
            entries,
            learned: BTreeSet::new(),
        }
    }

    /// Looks up a normalized place name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<CoordinateEntry> {
        self.entries.get(name).copied()
    }

    /// Returns `true` if `name` is cached.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Adds a newly resolved entry and records it as learned in this run.
    ///
    /// Returns `false` without changing anything if `name` is already
    /// cached or `entry` is not finite.
    pub fn insert(&mut self, name: &str, entry: CoordinateEntry) -> bool {
        if !entry.is_finite() {
            log::warn!("Refusing to cache non-finite coordinates for {name:?}: {entry:?}");
            return false;
        }

        if let Some(existing) = self.entries.get(name) {
            if *existing != entry {
                log::warn!(
                    "Keeping cached coordinates for {name:?} ({existing:?}), ignoring {entry:?}"
                );
            }
            return false;
        }

        self.entries.insert(name.to_string(), entry);
        self.learned.insert(name.to_string());
        true
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, CoordinateEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Names inserted since the cache was loaded (or last saved).
    pub fn learned(&self) -> impl Iterator<Item = &str> {
        self.learned.iter().map(String::as_str)
    }

    /// Number of names inserted since the cache was loaded (or last saved).
    #[must_use]
    pub fn learned_count(&self) -> usize {
        self.learned.len()
    }

    /// Returns `true` if there is anything new to persist.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.learned.is_empty()
    }

    /// Borrows the underlying map.
    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<String, CoordinateEntry> {
        &self.entries
    }
}

/// Loads the cache stored at `path`.
///
/// # Errors
///
/// * [`LocationError::Io`] if the file exists but cannot be read.
/// * [`LocationError::CacheCorrupt`] if the file does not parse.
pub fn load(path: &Path) -> Result<LocationCache, LocationError> {
    let Some(entries) = read_entries(path)? else {
        log::info!(
            "No location cache at {}, starting with an empty cache",
            path.display()
        );
        return Ok(LocationCache::new());
    };

    log::info!(
        "Loaded {} cached location(s) from {}",
        entries.len(),
        path.display()
    );
    Ok(LocationCache::from_entries(entries))
}

/// Writes the full cache to `path`, creating the parent directory if
/// needed. Entries already on disk but missing from `cache` are kept.
///
/// The file is written to a temporary sibling and renamed into place, so
/// an interrupted save leaves the previous file intact. The learned set is
/// cleared on success.
///
/// Returns the number of entries written.
///
/// # Errors
///
/// * [`LocationError::Io`] if the directory, temp file, or rename fails.
/// * [`LocationError::CacheCorrupt`] if the existing file does not parse.
pub fn save(cache: &mut LocationCache, path: &Path) -> Result<usize, LocationError> {
    let mut merged = read_entries(path)?.unwrap_or_default();
    let on_disk = merged.len();

    for (name, entry) in &cache.entries {
        merged.entry(name.clone()).or_insert(*entry);
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        crate::paths::ensure_dir(parent)?;
    }

    let mut json = serde_json::to_string_pretty(&merged).map_err(std::io::Error::other)?;
    json.push('\n');

    let tmp = temp_path(path);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;

    log::info!(
        "Saved {} location(s) to {} ({} new this run, {} already on disk)",
        merged.len(),
        path.display(),
        cache.learned_count(),
        on_disk
    );

    for (name, entry) in &merged {
        cache.entries.entry(name.clone()).or_insert(*entry);
    }
    cache.learned.clear();

    Ok(merged.len())
}

fn read_entries(path: &Path) -> Result<Option<BTreeMap<String, CoordinateEntry>>, LocationError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LocationError::Io(e)),
    };

    if contents.trim().is_empty() {
        return Ok(Some(BTreeMap::new()));
    }

    let entries: BTreeMap<String, CoordinateEntry> =
        serde_json::from_str(&contents).map_err(|e| LocationError::CacheCorrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if let Some((name, _)) = entries.iter().find(|(_, entry)| !entry.is_finite()) {
        return Err(LocationError::CacheCorrupt {
            path: path.to_path_buf(),
            message: format!("entry {name:?} has non-finite coordinates"),
        });
    }

    Ok(Some(entries))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wellington() -> CoordinateEntry {
        CoordinateEntry::new(-41.288_795_3, 174.777_211_4)
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = load(&dir.path().join("absent.json")).unwrap();
        assert!(cache.is_empty());
        assert!(!cache.is_dirty());
    }

    #[test]
    fn empty_object_and_empty_file_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let object = dir.path().join("object.json");
        let blank = dir.path().join("blank.json");
        std::fs::write(&object, "{}").unwrap();
        std::fs::write(&blank, "\n").unwrap();

        assert!(load(&object).unwrap().is_empty());
        assert!(load(&blank).unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_reported_and_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{\"Wellington\": {\"lat\": -41.2}").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, LocationError::CacheCorrupt { .. }));

        let mut cache = LocationCache::new();
        cache.insert("Auckland", CoordinateEntry::new(-36.85, 174.76));
        assert!(matches!(
            save(&mut cache, &path),
            Err(LocationError::CacheCorrupt { .. })
        ));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"Wellington\": {\"lat\": -41.2}"
        );
    }

    #[test]
    fn entry_missing_long_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"Wellington": {"lat": -41.2}}"#).unwrap();
        assert!(matches!(
            load(&path),
            Err(LocationError::CacheCorrupt { .. })
        ));
    }

    #[test]
    fn insert_never_overwrites() {
        let mut cache = LocationCache::new();
        assert!(cache.insert("Wellington", wellington()));
        assert!(!cache.insert("Wellington", CoordinateEntry::new(0.0, 0.0)));
        assert_eq!(cache.get("Wellington"), Some(wellington()));
        assert_eq!(cache.learned_count(), 1);
    }

    #[test]
    fn insert_rejects_non_finite() {
        let mut cache = LocationCache::new();
        assert!(!cache.insert("Nowhere", CoordinateEntry::new(f64::NAN, 0.0)));
        assert!(cache.is_empty());
    }

    #[test]
    fn save_then_load_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let mut cache = LocationCache::new();
        cache.insert("Wellington", wellington());
        cache.insert("Australia", CoordinateEntry::new(-24.776_109, 134.755));
        cache.insert("Palmerston North", CoordinateEntry::new(-40.352_309_1, 175.608_203_7));
        cache.insert("Tiny", CoordinateEntry::new(0.1 + 0.2, -1e-300));

        let written = save(&mut cache, &path).unwrap();
        assert_eq!(written, 4);
        assert!(!cache.is_dirty());

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.entries(), cache.entries());
        assert!(!dir.path().join("nested").join("cache.json.tmp").exists());
    }

    #[test]
    fn saved_file_is_sorted_lat_long_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = LocationCache::new();
        cache.insert("Wellington", CoordinateEntry::new(-41.5, 174.5));
        cache.insert("Auckland", CoordinateEntry::new(-36.5, 174.5));
        save(&mut cache, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let auckland = text.find("Auckland").unwrap();
        let wellington = text.find("Wellington").unwrap();
        assert!(auckland < wellington);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "Auckland": { "lat": -36.5, "long": 174.5 },
                "Wellington": { "lat": -41.5, "long": 174.5 }
            })
        );
    }

    #[test]
    fn save_keeps_entries_already_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"Otago": {"lat": -45.0, "long": 170.0}, "Wellington": {"lat": -41.5, "long": 174.5}}"#,
        )
        .unwrap();

        let mut cache = LocationCache::new();
        cache.insert("Wellington", CoordinateEntry::new(1.0, 1.0));
        cache.insert("Waikato", CoordinateEntry::new(-37.6, 175.1));
        save(&mut cache, &path).unwrap();

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.get("Otago"), Some(CoordinateEntry::new(-45.0, 170.0)));
        assert_eq!(
            reloaded.get("Wellington"),
            Some(CoordinateEntry::new(-41.5, 174.5)),
            "on-disk value is never overwritten"
        );
        assert_eq!(cache.get("Otago"), Some(CoordinateEntry::new(-45.0, 170.0)));
    }
}
