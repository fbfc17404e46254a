//! `configs` sub-command helpers: edits always land in the definitions file,
//! never in the built-in defaults.

use std::path::Path;

use anyhow::{bail, Context, Result};
use reports::store::ParsedEntries;
use reports::{ConfigStore, OrderRecord};
use serde_json::Value;
use tracing::info;

/// Store holding only what the definitions file at `path` contains.
/// A missing file is an empty store.
pub fn file_store(path: &Path) -> Result<ConfigStore> {
    let mut store = ConfigStore::empty();
    if path.exists() {
        store.merge_file(path)?;
    }
    Ok(store)
}

/// Decode the definitions in `path`. A lone object is treated as a
/// one-entry array.
pub fn read_entries(path: &Path) -> Result<ParsedEntries> {
    let value = read_json(path)?;
    let value = match value {
        Value::Object(ref map) if map.contains_key("report_id") => Value::Array(vec![value]),
        other => other,
    };
    Ok(ConfigStore::parse_entries(value)?)
}

/// Validate every entry of `source` and write them into `target`.
/// Any invalid entry aborts the whole upsert.
pub fn upsert(source: &Path, target: &Path) -> Result<Vec<String>> {
    let parsed = read_entries(source)?;
    if let Some(first) = parsed.skipped.first() {
        bail!(
            "{} invalid entr{} in {}; first: entry {}: {}",
            parsed.skipped.len(),
            if parsed.skipped.len() == 1 { "y" } else { "ies" },
            source.display(),
            first.index,
            first.reason
        );
    }
    let mut store = file_store(target)?;
    let mut ids = Vec::with_capacity(parsed.valid.len());
    for config in parsed.valid {
        ids.push(config.report_id.clone());
        if store.upsert(config)?.is_some() {
            info!("replaced existing definition '{}'", ids[ids.len() - 1]);
        }
    }
    store.save(target)?;
    Ok(ids)
}

/// Deactivate `report_id` in `target`. A report that only exists in
/// `merged` (the built-in defaults) is copied into the file first so the
/// override sticks.
pub fn deactivate(report_id: &str, merged: &ConfigStore, target: &Path) -> Result<()> {
    let mut store = file_store(target)?;
    if store.get(report_id).is_none() {
        let config = merged.require(report_id)?.clone();
        store.upsert(config)?;
    }
    store.deactivate(report_id)?;
    store.save(target)?;
    Ok(())
}

/// Records for an offline render: an array of objects, or an object with a
/// `records` (or `data`) array.
pub fn read_records(path: &Path) -> Result<Vec<OrderRecord>> {
    let value = read_json(path)?;
    let rows = match value {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("records").or_else(|| map.remove("data")) {
            Some(Value::Array(rows)) => rows,
            _ => bail!("{}: expected a 'records' array", path.display()),
        },
        _ => bail!("{}: expected an array of records", path.display()),
    };
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            OrderRecord::from_json(row)
                .with_context(|| format!("{}: record {i} is not an object", path.display()))
        })
        .collect()
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}
