//! Reading source columns from CSV files.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use fieldmap_model::{FieldDataType, SourceField};
use tracing::{debug, trace};

use crate::logging::redact_value;

/// Rows sampled per file by default.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Reads the header row and up to `sample_rows` data rows of `path`.
///
/// Each header becomes a [`SourceField`]; non-blank cells from the sampled
/// rows become its samples. Short rows are tolerated.
pub fn read_source_fields(path: &Path, sample_rows: usize) -> Result<Vec<SourceField>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("read header row of {}", path.display()))?
        .clone();
    if headers.is_empty() {
        bail!("{} has no header row", path.display());
    }

    let mut samples: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row, record) in reader.records().take(sample_rows).enumerate() {
        let record = record.with_context(|| format!("read row {} of {}", row + 2, path.display()))?;
        for (column, value) in record.iter().enumerate().take(headers.len()) {
            if !value.is_empty() {
                samples[column].push(value.to_string());
            }
        }
    }

    let fields: Vec<SourceField> = headers
        .iter()
        .zip(samples)
        .map(|(name, values)| {
            for value in &values {
                trace!(column = name, value = redact_value(value), "sample value");
            }
            SourceField::new(name).with_samples(values)
        })
        .collect();
    debug!(path = %path.display(), columns = fields.len(), "read source columns");
    Ok(fields)
}

/// Parses a `COLUMN=TYPE` column-type hint.
pub fn parse_hint(raw: &str) -> Result<(String, FieldDataType)> {
    let Some((column, data_type)) = raw.rsplit_once('=') else {
        bail!("expected COLUMN=TYPE, got {raw:?}");
    };
    let column = column.trim();
    if column.is_empty() {
        bail!("hint {raw:?} has an empty column name");
    }
    let data_type = FieldDataType::from_str(data_type).with_context(|| format!("hint {raw:?}"))?;
    Ok((column.to_string(), data_type))
}
