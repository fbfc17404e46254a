//! The report config store.
//!
//! Built-in defaults are embedded at compile time. An external definitions
//! file is merged on top by `report_id`: entries in the file replace the
//! default with the same id, defaults the file does not mention survive.
//!
//! Loading is lenient per entry: a structurally invalid entry is logged and
//! skipped, it never prevents the valid entries around it from loading.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{ConfigError, ReportConfig};

/// Report definitions shipped with the binary.
pub const DEFAULT_REPORTS: &str = include_str!("../defaults/reports.json");

/// An entry that was rejected during a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Position in the source array.
    pub index: usize,
    /// The entry's `report_id`, when it had a readable one.
    pub report_id: Option<String>,
    pub reason: String,
}

/// What a single load or merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedEntry>,
}

/// Decoded entries of one source, before merging.
#[derive(Debug, Default)]
pub struct ParsedEntries {
    pub valid: Vec<ReportConfig>,
    pub skipped: Vec<SkippedEntry>,
}

/// Report definitions keyed by `report_id`.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    reports: BTreeMap<String, ReportConfig>,
}

impl ConfigStore {
    /// A store with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A store holding only the built-in defaults.
    ///
    /// # Errors
    /// Only if the embedded defaults are not valid JSON.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        let mut store = Self::empty();
        store.merge_str(DEFAULT_REPORTS)?;
        Ok(store)
    }

    /// Defaults, overridden by the file at `path` when one is given.
    ///
    /// # Errors
    /// [`ConfigError::Io`] / [`ConfigError::Parse`] when the file cannot be
    /// read or is not JSON at all. Invalid entries are not errors; they are
    /// listed in the returned [`LoadReport`].
    pub fn load(path: Option<&Path>) -> Result<(Self, LoadReport), ConfigError> {
        let mut store = Self::with_defaults()?;
        let report = match path {
            Some(path) => store.merge_file(path)?,
            None => LoadReport {
                loaded: store.reports.keys().cloned().collect(),
                skipped: Vec::new(),
            },
        };
        info!(
            "report config loaded: {} reports ({} active), {} entries skipped",
            store.len(),
            store.active().count(),
            report.skipped.len()
        );
        Ok((store, report))
    }

    /// Merge the definitions file at `path` into this store.
    pub fn merge_file(&mut self, path: &Path) -> Result<LoadReport, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("merging report configs from {}", path.display());
        self.merge_value(source)
    }

    /// Merge definitions given as a JSON string.
    pub fn merge_str(&mut self, source: &str) -> Result<LoadReport, ConfigError> {
        let source: Value = serde_json::from_str(source)?;
        self.merge_value(source)
    }

    fn merge_value(&mut self, source: Value) -> Result<LoadReport, ConfigError> {
        let parsed = Self::parse_entries(source)?;
        let mut report = LoadReport {
            loaded: Vec::with_capacity(parsed.valid.len()),
            skipped: parsed.skipped,
        };
        for config in parsed.valid {
            report.loaded.push(config.report_id.clone());
            if let Some(previous) = self.reports.insert(config.report_id.clone(), config) {
                debug!("report '{}' overridden", previous.report_id);
            }
        }
        Ok(report)
    }

    /// Decode and validate every entry of a definitions document without
    /// touching any store.
    ///
    /// # Errors
    /// [`ConfigError::Layout`] when the document is neither an array nor an
    /// object with a `reports` array.
    pub fn parse_entries(source: Value) -> Result<ParsedEntries, ConfigError> {
        let entries = match source {
            Value::Array(entries) => entries,
            Value::Object(mut map) => match map.remove("reports") {
                Some(Value::Array(entries)) => entries,
                _ => {
                    return Err(ConfigError::Layout(
                        "expected an array or an object with a 'reports' array".into(),
                    ))
                }
            },
            other => {
                return Err(ConfigError::Layout(format!(
                    "expected an array, found {}",
                    json_kind(&other)
                )))
            }
        };

        let mut parsed = ParsedEntries::default();
        let mut positions: BTreeMap<String, usize> = BTreeMap::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let report_id = entry
                .get("report_id")
                .and_then(Value::as_str)
                .map(str::to_owned);

            let decoded = serde_json::from_value::<ReportConfig>(entry)
                .map_err(ConfigError::from)
                .and_then(|config| config.validate().map(|()| config));

            match decoded {
                Ok(config) => {
                    if let Some(&previous) = positions.get(&config.report_id) {
                        warn!(
                            "report '{}' defined more than once; entry {} replaces entry {}",
                            config.report_id, index, previous
                        );
                        parsed.valid.retain(|c| c.report_id != config.report_id);
                    }
                    positions.insert(config.report_id.clone(), index);
                    parsed.valid.push(config);
                }
                Err(e) => {
                    warn!(
                        "skipping report config entry {} ({}): {}",
                        index,
                        report_id.as_deref().unwrap_or("<no report_id>"),
                        e
                    );
                    parsed.skipped.push(SkippedEntry {
                        index,
                        report_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(parsed)
    }

    pub fn get(&self, report_id: &str) -> Option<&ReportConfig> {
        self.reports.get(report_id)
    }

    /// Like [`get`](Self::get) but an unknown id is an error.
    pub fn require(&self, report_id: &str) -> Result<&ReportConfig, ConfigError> {
        self.get(report_id)
            .ok_or_else(|| ConfigError::UnknownReport(report_id.to_owned()))
    }

    /// All reports, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &ReportConfig> {
        self.reports.values()
    }

    /// Active reports, ordered by id.
    pub fn active(&self) -> impl Iterator<Item = &ReportConfig> {
        self.reports.values().filter(|r| r.active)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Insert or replace a definition after validating it. Returns the
    /// definition it replaced.
    pub fn upsert(&mut self, config: ReportConfig) -> Result<Option<ReportConfig>, ConfigError> {
        config.validate()?;
        info!("upserting report '{}'", config.report_id);
        Ok(self.reports.insert(config.report_id.clone(), config))
    }

    /// Mark a report inactive. Reports are never deleted.
    pub fn deactivate(&mut self, report_id: &str) -> Result<(), ConfigError> {
        let config = self
            .reports
            .get_mut(report_id)
            .ok_or_else(|| ConfigError::UnknownReport(report_id.to_owned()))?;
        if config.active {
            info!("deactivating report '{report_id}'");
            config.active = false;
        }
        Ok(())
    }

    /// Write every definition to `path` as a pretty-printed JSON array.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let entries: Vec<&ReportConfig> = self.reports.values().collect();
        let mut json = serde_json::to_string_pretty(&entries)?;
        json.push('\n');
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("saved {} report configs to {}", entries.len(), path.display());
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
