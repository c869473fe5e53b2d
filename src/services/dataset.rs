//! Day dataset accumulator.
//!
//! Every fetched city is appended to one CSV per calendar day. The file is
//! created with the header on first write and is never rewritten afterwards,
//! so several runs on the same day accumulate (possibly overlapping) rows.

use chrono::NaiveDate;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::Span;

use crate::errors::AppError;
use crate::helpers::date_key;
use crate::models::{HourlySeries, ObservationRecord, DATASET_HEADER};

/// File name of the day dataset for `date`.
pub fn dataset_file_name(date: NaiveDate) -> String {
    format!("weather_{}.csv", date_key(date))
}

/// The append-only dataset for one calendar day.
#[derive(Debug, Clone)]
pub struct DayDataset {
    path: PathBuf,
    span: Span,
}

impl DayDataset {
    pub fn for_date(dir: &Path, date: NaiveDate, parent: &Span) -> Self {
        Self {
            path: dir.join(dataset_file_name(date)),
            span: tracing::info_span!(parent: parent, "accumulator", date = %date_key(date)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row per hour of `series` for `city`.
    ///
    /// The header is written first when the file does not exist yet (or is
    /// empty). Rows are encoded in memory and written with a single call, so
    /// an encoding error never leaves part of a city in the file.
    pub fn append(&self, city: &str, series: &HourlySeries) -> Result<usize, AppError> {
        let _entered = self.span.enter();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if needs_header {
            tracing::info!("Creating day dataset {}", self.path.display());
            writer.write_record(DATASET_HEADER)?;
        }
        for reading in &series.hours {
            writer.serialize(ObservationRecord::from_reading(city, series, reading))?;
        }
        let rows = writer.into_inner().map_err(|e| AppError::Io(e.into_error()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&rows)?;
        file.flush()?;

        tracing::info!(
            "Appended {} rows for {} to {}",
            series.hours.len(),
            city,
            self.path.display()
        );
        Ok(series.hours.len())
    }
}

/// Load every row of a day dataset in file order.
///
/// A missing file, an empty file or a file holding only the header is
/// reported as `NoInputData`.
pub fn read_observations(path: &Path) -> Result<Vec<ObservationRecord>, AppError> {
    let is_empty = match std::fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => return Err(e.into()),
    };
    if is_empty {
        return Err(AppError::NoInputData(path.to_path_buf()));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize()
        .collect::<Result<Vec<ObservationRecord>, csv::Error>>()?;

    if records.is_empty() {
        return Err(AppError::NoInputData(path.to_path_buf()));
    }
    Ok(records)
}
