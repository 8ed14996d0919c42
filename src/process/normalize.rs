// src/process/normalize.rs
use csv::{Terminator, WriterBuilder};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::process::{date_parser, read_sheet, RawSheet};

/// 0-based position of the report date in every export. Positional on
/// purpose: header names in the exports are localised and not stable.
pub const DATE_COLUMN: usize = 13;
pub const MIN_COLUMNS: usize = DATE_COLUMN + 1;

/// Staging file dialect. `staging::LoadStatement` hard-codes the same bytes.
pub const FIELD_DELIMITER: u8 = b';';
pub const LINE_TERMINATOR: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeReport {
    pub rows: usize,
    pub columns: usize,
}

/// Rewrite the date column of every row from `dd-mm-yyyy` to `yyyy-mm-dd`.
///
/// All rows are checked before any is changed, so on error `sheet` is left
/// exactly as it was.
pub fn normalize_dates(sheet: &mut RawSheet, source: &Path) -> Result<()> {
    let format_err = |reason: String| PipelineError::Format {
        path: source.to_path_buf(),
        reason,
    };

    if sheet.width() < MIN_COLUMNS {
        return Err(format_err(format!(
            "expected at least {} columns, found {}",
            MIN_COLUMNS,
            sheet.width()
        )));
    }

    let mut converted = Vec::with_capacity(sheet.rows.len());
    for (idx, row) in sheet.rows.iter().enumerate() {
        // row numbers are reported as a spreadsheet user sees them (header = 1)
        let line = idx + 2;
        let raw = row
            .get(DATE_COLUMN)
            .ok_or_else(|| format_err(format!("row {line} has only {} columns", row.len())))?;
        let iso = date_parser::to_staging_date(raw).ok_or_else(|| {
            format_err(format!(
                "row {line}, column {DATE_COLUMN}: {raw:?} is not a dd-mm-yyyy date"
            ))
        })?;
        converted.push(iso);
    }

    for (row, iso) in sheet.rows.iter_mut().zip(converted) {
        row[DATE_COLUMN] = iso;
    }
    Ok(())
}

/// Serialize `sheet` as a staging file at `target`, replacing whatever is there.
///
/// The file is written next to `target` and renamed into place, so readers
/// never see a half-written staging file.
pub fn write_staging_file(sheet: &RawSheet, target: &Path) -> Result<()> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let io_err = |what: &str, e| PipelineError::io(format!("{what} {}", target.display()), e);

    let tmp = NamedTempFile::new_in(dir).map_err(|e| io_err("staging temp file for", e))?;
    write_staging_bytes(sheet, tmp.as_file()).map_err(|e| io_err("writing", e.into()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| io_err("syncing", e))?;
    tmp.persist(target)
        .map_err(|e| io_err("replacing", e.error))?;
    Ok(())
}

/// Spreadsheet at `input` → staging file at `target`.
#[tracing::instrument(level = "info", skip(input, target), fields(input = %input.as_ref().display()))]
pub fn normalize_file<P: AsRef<Path>, Q: AsRef<Path>>(input: P, target: Q) -> Result<NormalizeReport> {
    let input = input.as_ref();
    let target: PathBuf = target.as_ref().to_path_buf();

    let mut sheet = read_sheet(input)?;
    normalize_dates(&mut sheet, input)?;
    debug!(date_column = DATE_COLUMN, "dates rewritten to yyyy-mm-dd");

    write_staging_file(&sheet, &target)?;
    let report = NormalizeReport {
        rows: sheet.rows.len(),
        columns: sheet.width(),
    };
    info!(
        rows = report.rows,
        columns = report.columns,
        target = %target.display(),
        "staging file written"
    );
    Ok(report)
}

/// Staging dialect writer over any sink.
///
/// Fields holding `;` or `"` come out quoted, but the bulk load has no
/// `ENCLOSED BY`, so such a field is loaded with its quotes and split on the
/// inner `;`. Exports are expected not to contain either character.
pub fn write_staging_bytes<W: Write>(sheet: &RawSheet, out: W) -> csv::Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(FIELD_DELIMITER)
        .terminator(Terminator::Any(LINE_TERMINATOR))
        .from_writer(out);
    wtr.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}
