//! Unit derivation and per-hour extremal-city rankings.
//!
//! One pass over the whole day dataset produces three tables:
//!
//! - the processed observation table (Fahrenheit and mph columns added)
//! - the warmest city per hour
//! - the driest city per hour
//!
//! All three are full overwrites. They are staged next to their final paths
//! and only renamed into place once every table has been written. If one of
//! the renames fails, the tables already replaced are restored from backups,
//! so a failed run leaves the previous tables untouched.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::Span;
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::helpers::{celsius_to_fahrenheit, compare_metric, ms_to_mph, SortOrder};
use crate::models::{
    HighestTemperatureRecord, LowestHumidityRecord, ObservationRecord, ProcessedObservation,
};
use crate::services::dataset::read_observations;

pub const PROCESSED_TABLE_FILE: &str = "weather_data.csv";
pub const HIGHEST_TEMPERATURE_TABLE_FILE: &str = "highest_temp_cities.csv";
pub const LOWEST_HUMIDITY_TABLE_FILE: &str = "lowest_humidity_cities.csv";

/// How repeated (city, time) rows from several same-day runs are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Every row takes part in processing, duplicates included.
    #[default]
    KeepAll,
    /// Only the last row (in file order) of each (city, time) pair is kept.
    LastWins,
}

/// Locations of the three derived tables.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub processed: PathBuf,
    pub highest_temperature: PathBuf,
    pub lowest_humidity: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            processed: dir.join(PROCESSED_TABLE_FILE),
            highest_temperature: dir.join(HIGHEST_TEMPERATURE_TABLE_FILE),
            lowest_humidity: dir.join(LOWEST_HUMIDITY_TABLE_FILE),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [
            &self.processed,
            &self.highest_temperature,
            &self.lowest_humidity,
        ]
    }
}

/// Counts reported after a successful processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProcessingSummary {
    /// Rows read from the day dataset
    pub rows_read: usize,
    /// Rows left after applying the duplicate policy
    pub rows_kept: usize,
    /// Number of distinct hours (= rows of each ranking table)
    pub distinct_hours: usize,
}

/// The three derived tables, in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTables {
    pub processed: Vec<ProcessedObservation>,
    pub highest_temperature: Vec<HighestTemperatureRecord>,
    pub lowest_humidity: Vec<LowestHumidityRecord>,
}

impl DerivedTables {
    pub fn build(records: &[ObservationRecord]) -> Self {
        Self {
            processed: derive_units(records),
            highest_temperature: rank_highest_temperature(records),
            lowest_humidity: rank_lowest_humidity(records),
        }
    }
}

/// Drop earlier duplicates of each (city, time) pair when the policy asks for it.
pub fn deduplicate(records: Vec<ObservationRecord>, policy: DuplicatePolicy) -> Vec<ObservationRecord> {
    match policy {
        DuplicatePolicy::KeepAll => records,
        DuplicatePolicy::LastWins => {
            let mut seen: HashSet<(String, String)> = HashSet::with_capacity(records.len());
            let mut kept: Vec<ObservationRecord> = records
                .into_iter()
                .rev()
                .filter(|r| seen.insert((r.city.clone(), r.time.clone())))
                .collect();
            kept.reverse();
            kept
        }
    }
}

/// Add Fahrenheit and mph columns and restrict to the processed column set.
pub fn derive_units(records: &[ObservationRecord]) -> Vec<ProcessedObservation> {
    records
        .iter()
        .map(|r| ProcessedObservation {
            city: r.city.clone(),
            temperature_c: r.temperature_c,
            temperature_f: r.temperature_c.map(celsius_to_fahrenheit),
            relative_humidity_pct: r.relative_humidity_pct,
            wind_speed_ms: r.wind_speed_ms,
            wind_speed_mph: r.wind_speed_ms.map(ms_to_mph),
            time: r.time.clone(),
        })
        .collect()
}

/// Group rows by `Time`, groups ordered by first appearance.
fn group_by_time(records: &[ObservationRecord]) -> Vec<(&str, Vec<&ObservationRecord>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&ObservationRecord>)> = Vec::new();
    for record in records {
        let slot = *index.entry(record.time.as_str()).or_insert_with(|| {
            groups.push((record.time.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(record);
    }
    groups
}

/// Stable-sort one hour's rows by `metric` and return the first.
///
/// Ties keep input order, so the earliest row among equals wins.
fn pick_extremum<'a, F>(
    mut rows: Vec<&'a ObservationRecord>,
    metric: F,
    order: SortOrder,
) -> Option<&'a ObservationRecord>
where
    F: Fn(&ObservationRecord) -> Option<f64>,
{
    rows.sort_by(|a, b| compare_metric(metric(a), metric(b), order));
    rows.into_iter().next()
}

/// The warmest city for every distinct hour.
pub fn rank_highest_temperature(records: &[ObservationRecord]) -> Vec<HighestTemperatureRecord> {
    group_by_time(records)
        .into_iter()
        .filter_map(|(hour, rows)| {
            pick_extremum(rows, |r| r.temperature_c, SortOrder::Descending).map(|top| {
                HighestTemperatureRecord {
                    hour: hour.to_string(),
                    city: top.city.clone(),
                    temperature_c: top.temperature_c,
                }
            })
        })
        .collect()
}

/// The driest city for every distinct hour.
pub fn rank_lowest_humidity(records: &[ObservationRecord]) -> Vec<LowestHumidityRecord> {
    group_by_time(records)
        .into_iter()
        .filter_map(|(hour, rows)| {
            pick_extremum(rows, |r| r.relative_humidity_pct, SortOrder::Ascending).map(|top| {
                LowestHumidityRecord {
                    hour: hour.to_string(),
                    city: top.city.clone(),
                    relative_humidity_pct: top.relative_humidity_pct,
                }
            })
        })
        .collect()
}

/// Builds and writes the derived tables from a day dataset.
#[derive(Debug, Clone)]
pub struct Processor {
    outputs: OutputPaths,
    policy: DuplicatePolicy,
    span: Span,
}

impl Processor {
    pub fn new(outputs: OutputPaths, policy: DuplicatePolicy, parent: &Span) -> Self {
        Self {
            outputs,
            policy,
            span: tracing::info_span!(parent: parent, "processor"),
        }
    }

    pub fn outputs(&self) -> &OutputPaths {
        &self.outputs
    }

    /// Process the day dataset at `dataset` and overwrite the three tables.
    pub fn run(&self, dataset: &Path) -> Result<ProcessingSummary, AppError> {
        let _entered = self.span.enter();

        let records = read_observations(dataset).inspect_err(|e| {
            tracing::error!("Cannot process {}: {}", dataset.display(), e);
        })?;
        let rows_read = records.len();
        let records = deduplicate(records, self.policy);
        if records.len() != rows_read {
            tracing::info!(
                "Dropped {} duplicate (city, time) rows",
                rows_read - records.len()
            );
        }

        let tables = DerivedTables::build(&records);
        self.write_tables(&tables)?;

        let summary = ProcessingSummary {
            rows_read,
            rows_kept: records.len(),
            distinct_hours: tables.highest_temperature.len(),
        };
        tracing::info!(
            "Processed {} rows into {} hourly rankings",
            summary.rows_kept,
            summary.distinct_hours
        );
        Ok(summary)
    }

    /// Stage every table, then move them into place together.
    fn write_tables(&self, tables: &DerivedTables) -> Result<(), AppError> {
        self.stage_tables(tables).inspect_err(|e| {
            tracing::error!("Failed to write derived tables: {}", e);
            self.discard_staged();
        })?;

        self.commit_staged().inspect_err(|e| {
            tracing::error!("Failed to replace derived tables: {}", e);
            self.discard_staged();
        })
    }

    fn stage_tables(&self, tables: &DerivedTables) -> Result<(), AppError> {
        write_csv(&self.outputs.processed, &tables.processed)?;
        write_csv(&self.outputs.highest_temperature, &tables.highest_temperature)?;
        write_csv(&self.outputs.lowest_humidity, &tables.lowest_humidity)?;
        Ok(())
    }

    /// Rename the staged tables over their targets.
    ///
    /// Each existing target is copied to `<name>.bak` first. When a rename
    /// fails, the tables already replaced are put back from their backups.
    fn commit_staged(&self) -> Result<(), AppError> {
        let mut replaced: Vec<(PathBuf, Option<PathBuf>)> = Vec::with_capacity(3);
        for target in self.outputs.all() {
            if let Err(e) = replace_table(target, &mut replaced) {
                restore_tables(&replaced);
                return Err(e);
            }
        }
        for backup in replaced.iter().filter_map(|(_, backup)| backup.as_ref()) {
            let _ = std::fs::remove_file(backup);
        }
        Ok(())
    }

    fn discard_staged(&self) {
        for path in self.outputs.all() {
            let _ = std::fs::remove_file(staging_path(path));
        }
    }
}

fn replace_table(
    target: &Path,
    replaced: &mut Vec<(PathBuf, Option<PathBuf>)>,
) -> Result<(), AppError> {
    let backup = if target.is_file() {
        let backup = backup_path(target);
        std::fs::copy(target, &backup)?;
        Some(backup)
    } else {
        None
    };

    match std::fs::rename(staging_path(target), target) {
        Ok(()) => {
            replaced.push((target.to_path_buf(), backup));
            Ok(())
        }
        Err(e) => {
            if let Some(backup) = backup {
                let _ = std::fs::remove_file(backup);
            }
            Err(e.into())
        }
    }
}

/// Undo `replace_table`, most recent first.
fn restore_tables(replaced: &[(PathBuf, Option<PathBuf>)]) {
    for (target, backup) in replaced.iter().rev() {
        let restored = match backup {
            Some(backup) => std::fs::rename(backup, target),
            None => std::fs::remove_file(target),
        };
        if let Err(e) = restored {
            tracing::warn!("Failed to restore {}: {}", target.display(), e);
        }
    }
}

fn staging_path(target: &Path) -> PathBuf {
    with_suffix(target, ".tmp")
}

fn backup_path(target: &Path) -> PathBuf {
    with_suffix(target, ".bak")
}

fn with_suffix(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `rows` with a header to the staging file for `target`.
fn write_csv<T: Serialize>(target: &Path, rows: &[T]) -> Result<(), AppError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = staging_path(target);
    let mut writer = csv::Writer::from_path(&tmp)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a derived table back.
pub fn read_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, AppError> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader.deserialize().collect::<Result<Vec<T>, csv::Error>>()?)
}
