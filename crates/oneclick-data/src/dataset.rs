//! The [`Dataset`] wrapper: a polars frame plus the header as it was written.
//!
//! Polars deduplicates repeated CSV headers on read (`a`, `a_duplicated_0`),
//! which would hide exactly the problem validation must report. The loader
//! therefore reads the header row separately and keeps it alongside the frame.

use crate::error::{DataError, Result, ResultExt};
use crate::utils::{DtypeCategory, series_dtype_category};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A loaded table and its original column names.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    source_columns: Vec<String>,
}

impl Dataset {
    /// Wrap an in-memory frame. Its column names are taken as the source header.
    pub fn new(frame: DataFrame) -> Self {
        let source_columns = frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        Self {
            frame,
            source_columns,
        }
    }

    /// Wrap a frame whose header was read separately.
    pub fn with_source_columns(frame: DataFrame, source_columns: Vec<String>) -> Self {
        Self {
            frame,
            source_columns,
        }
    }

    /// Load a CSV file, rejecting other extensions.
    ///
    /// A file with no content at all yields an empty dataset rather than an
    /// error, so validation can report it like any other empty table.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnsupportedFileType`] for non-CSV paths and
    /// IO/Polars errors for unreadable files.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        ensure_csv_extension(path)?;

        if std::fs::metadata(path)
            .context(format!("Reading {}", path.display()))?
            .len()
            == 0
        {
            debug!(path = %path.display(), "empty csv file");
            return Ok(Self::new(DataFrame::empty()));
        }

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
            .finish()
            .context(format!("Parsing {}", path.display()))?;

        let source_columns = read_header(path)?;
        debug!(
            path = %path.display(),
            rows = frame.height(),
            columns = frame.width(),
            "loaded csv"
        );
        Ok(Self::with_source_columns(frame, source_columns))
    }

    /// Write the frame as CSV with a header row.
    pub fn write_csv(&mut self, path: impl AsRef<Path>) -> Result<()> {
        write_csv(&mut self.frame, path.as_ref())
    }

    /// The underlying frame.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Consume the wrapper and return the frame.
    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Number of columns in the original header.
    pub fn width(&self) -> usize {
        self.source_columns.len()
    }

    /// Column names exactly as they appeared in the source, duplicates included.
    pub fn column_names(&self) -> &[String] {
        &self.source_columns
    }

    /// Whether `name` is a column of the dataset.
    pub fn has_column(&self, name: &str) -> bool {
        self.source_columns.iter().any(|c| c == name)
    }

    /// Look up a column by name.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::ColumnNotFound`] if the column is absent.
    pub fn series(&self, name: &str) -> Result<&Series> {
        self.frame
            .column(name)
            .map(|c| c.as_materialized_series())
            .map_err(|_| DataError::ColumnNotFound(name.to_string()))
    }

    /// Dtype category of every column, in frame order.
    pub fn column_kinds(&self) -> Vec<(String, DtypeCategory)> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| {
                let series = c.as_materialized_series();
                (series.name().to_string(), series_dtype_category(series))
            })
            .collect()
    }

    /// Names of numeric columns, in frame order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.column_kinds()
            .into_iter()
            .filter(|(_, kind)| *kind == DtypeCategory::Numeric)
            .map(|(name, _)| name)
            .collect()
    }
}

impl From<DataFrame> for Dataset {
    fn from(frame: DataFrame) -> Self {
        Self::new(frame)
    }
}

/// Reject anything that is not a `.csv` file.
pub fn ensure_csv_extension(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(()),
        Some(ext) => Err(DataError::UnsupportedFileType(ext.to_string())),
        None => Err(DataError::UnsupportedFileType(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        )),
    }
}

/// Write a frame as CSV with a header row.
pub fn write_csv(frame: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).context(format!("Creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(frame)
        .context(format!("Writing {}", path.display()))?;
    Ok(())
}

/// Read only the header row, without polars' duplicate renaming.
fn read_header(path: &Path) -> Result<Vec<String>> {
    let header = CsvReadOptions::default()
        .with_has_header(false)
        .with_n_rows(Some(1))
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .context("Reading csv header")?;

    let mut names = Vec::with_capacity(header.width());
    for column in header.get_columns() {
        let value = column.as_materialized_series().get(0)?;
        names.push(match value {
            AnyValue::String(s) => s.to_string(),
            AnyValue::StringOwned(s) => s.to_string(),
            AnyValue::Null => String::new(),
            other => other.to_string(),
        });
    }
    Ok(names)
}
