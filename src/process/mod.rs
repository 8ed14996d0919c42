// src/process/mod.rs
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

pub mod date_parser;
pub mod normalize;
pub mod utils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSheet {
    /// Column names from the first row of the sheet.
    pub headers: Vec<String>,
    /// Every following row, one String per column, already rendered to text.
    pub rows: Vec<Vec<String>>,
}

impl RawSheet {
    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

/// Load the first worksheet of `path` into memory.
///
/// Workbooks (xlsx, xlsm, xlsb, xls, ods) go through calamine. Plain `.csv`
/// and `.txt` exports are read directly; their delimiter is `;` when the
/// header line contains one, `,` otherwise.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_sheet<P: AsRef<Path>>(path: P) -> Result<RawSheet> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let sheet = match ext.as_deref() {
        Some("csv") | Some("txt") => read_delimited(path)?,
        _ => read_workbook(path)?,
    };
    info!(
        columns = sheet.width(),
        rows = sheet.rows.len(),
        "loaded spreadsheet"
    );
    Ok(sheet)
}

fn read_workbook(path: &Path) -> Result<RawSheet> {
    let sheet_err = |source| PipelineError::Sheet {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(sheet_err)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::Format {
            path: path.to_path_buf(),
            reason: "workbook has no worksheets".into(),
        })?
        .map_err(sheet_err)?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(utils::cell_to_string).collect(),
        None => Vec::new(),
    };
    let mut body: Vec<Vec<String>> = rows
        .map(|cells| cells.iter().map(utils::cell_to_string).collect())
        .collect();

    // the used range can extend past the data when cells were formatted but
    // left blank; only trailing blanks are dropped
    while body
        .last()
        .is_some_and(|r: &Vec<String>| r.iter().all(|c| c.is_empty()))
    {
        body.pop();
    }
    debug!(sheet_rows = range.height(), kept = body.len(), "workbook range read");

    Ok(RawSheet {
        headers,
        rows: body,
    })
}

fn read_delimited(path: &Path) -> Result<RawSheet> {
    let open = || {
        File::open(path).map_err(|e| PipelineError::io(format!("opening {}", path.display()), e))
    };

    let mut first_line = String::new();
    BufReader::new(open()?)
        .read_line(&mut first_line)
        .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;
    let delimiter = if first_line.contains(';') { b';' } else { b',' };

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(open()?);

    let csv_err = |e: csv::Error| PipelineError::io(format!("parsing {}", path.display()), e.into());
    let headers = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(RawSheet { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_semicolon_export() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("report.csv");
        fs::write(&path, "a;b;c\n1;2;3\n4;5;6\n")?;

        let sheet = read_sheet(&path)?;
        assert_eq!(sheet.headers, vec!["a", "b", "c"]);
        assert_eq!(sheet.rows, vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]);
        Ok(())
    }

    #[test]
    fn test_read_comma_export_with_quoted_fields() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("report.CSV");
        fs::write(&path, "name,cost\n\"Kampania, A\",1.5\n")?;

        let sheet = read_sheet(&path)?;
        assert_eq!(sheet.width(), 2);
        assert_eq!(sheet.rows[0][0], "Kampania, A");
        Ok(())
    }

    #[test]
    fn test_ragged_export_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "a;b;c\n1;2\n")?;
        assert!(matches!(read_sheet(&path), Err(PipelineError::Io { .. })));
        Ok(())
    }

    #[test]
    fn test_missing_workbook() {
        let err = read_sheet("/nonexistent/report.xlsx").unwrap_err();
        assert!(matches!(err, PipelineError::Sheet { .. }));
    }
}
