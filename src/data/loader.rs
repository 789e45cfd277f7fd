use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use regex::Regex;

use super::model::{CellValue, RawTable, SourceTable, KEY_COLUMN};
use crate::error::{CalibrationError, Result};

/// Line that announces the result table.
pub const MARKER: &str = "Result table values";
/// Field separator inside the result table.
pub const DELIMITER: u8 = b';';
/// A line starting with this word (any case) ends the table.
pub const SENTINEL: &str = "time";
/// Older firmware writes the key column under this name.
pub const KEY_SYNONYM: &str = "power_instruction";

// ---------------------------------------------------------------------------
// Table extraction
// ---------------------------------------------------------------------------

/// Read the result table out of one calibration log.
pub fn read_power_table(path: &Path) -> Result<RawTable> {
    let bytes = std::fs::read(path)
        .map_err(|e| CalibrationError::io(format!("reading {}", path.display()), e))?;
    let text = String::from_utf8_lossy(&bytes);
    parse_power_table(&text, path)
}

/// Parse a log already in memory. `path` is only used in error messages.
pub fn parse_power_table(text: &str, path: &Path) -> Result<RawTable> {
    let lines: Vec<&str> = text.lines().collect();

    let marker_idx = lines
        .iter()
        .position(|l| l.contains(MARKER))
        .ok_or_else(|| CalibrationError::MarkerNotFound {
            path: path.to_path_buf(),
            marker: MARKER,
        })?;
    let header_idx = marker_idx + 1;

    // a blank line right after the marker ends the table before any header
    if lines.get(header_idx).is_some_and(|l| l.trim().is_empty()) {
        warn!("{}: blank line after '{MARKER}', no table read", path.display());
        return Ok(RawTable::default());
    }

    let region_end = lines
        .iter()
        .enumerate()
        .skip(header_idx + 1)
        .find(|(_, l)| is_table_end(l))
        .map(|(i, _)| i)
        .unwrap_or(lines.len());

    let region = lines[header_idx..region_end].join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(region.as_bytes());
    let mut records = reader.records();

    let columns: Vec<String> = match records.next() {
        Some(header) => header?.iter().map(str::to_string).collect(),
        // marker on the last line: no header, no rows
        None => return Ok(RawTable::default()),
    };

    let mut rows = Vec::new();
    for (offset, record) in records.enumerate() {
        let record = record?;
        // 1-based line number in the source file
        let line = header_idx + offset + 2;
        if record.len() > columns.len() {
            return Err(CalibrationError::RowWidthMismatch {
                path: path.to_path_buf(),
                line,
                expected: columns.len(),
                found: record.len(),
            });
        }
        if record.len() < columns.len() {
            warn!(
                "{}: line {line} has {} of {} fields, padding with empty cells",
                path.display(),
                record.len(),
                columns.len()
            );
        }
        let mut row: Vec<CellValue> = record.iter().map(CellValue::from_raw).collect();
        row.resize(columns.len(), CellValue::Empty);
        rows.push(row);
    }

    let mut table = RawTable { columns, rows };
    table.rename_column(KEY_SYNONYM, KEY_COLUMN);
    table.coerce_numeric();
    debug!(
        "{}: {} rows x {} columns",
        path.display(),
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

fn is_table_end(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.to_lowercase().starts_with(SENTINEL)
}

// ---------------------------------------------------------------------------
// File discovery and grouping
// ---------------------------------------------------------------------------

/// All files in `dir` with the given extension, sorted by path.
pub fn discover_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/*.{extension}",
        glob::Pattern::escape(&dir.to_string_lossy())
    );

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("skipping unreadable entry: {e}"),
        }
    }
    files.sort();
    Ok(files)
}

/// Label used to prefix a file's columns: everything before the first `_`.
pub fn source_label(file_name: &str) -> &str {
    file_name.split('_').next().unwrap_or(file_name)
}

fn wavelength_pattern(extension: &str) -> Option<Regex> {
    Regex::new(&format!(r"_(\d+)\.{}", regex::escape(extension))).ok()
}

/// Wavelength encoded as `_<digits>.<ext>` in the file name.
///
/// Leading zeros are insignificant, so `_0488` and `_488` name the same
/// group. Digit runs beyond `u32` are rejected with a warning.
pub fn wavelength_from_file_name(file_name: &str, extension: &str) -> Option<u32> {
    let re = wavelength_pattern(extension)?;
    let digits = re.captures(file_name)?.get(1)?.as_str();
    match digits.parse() {
        Ok(wl) => Some(wl),
        Err(e) => {
            warn!("{file_name}: wavelength '{digits}' unusable: {e}");
            None
        }
    }
}

/// Parse one log into a [`SourceTable`] labelled from its file name.
pub fn load_source(path: &Path) -> Result<SourceTable> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let table = read_power_table(path)?;
    Ok(SourceTable {
        label: source_label(&file_name).to_string(),
        file_name,
        table,
    })
}

/// Bucket sources by wavelength, keeping input order inside each bucket.
/// Sources whose file name carries no wavelength are dropped with a warning.
pub fn group_by_wavelength(
    sources: Vec<SourceTable>,
    extension: &str,
) -> BTreeMap<u32, Vec<SourceTable>> {
    let mut grouped: BTreeMap<u32, Vec<SourceTable>> = BTreeMap::new();
    for source in sources {
        match wavelength_from_file_name(&source.file_name, extension) {
            Some(wl) => grouped.entry(wl).or_default().push(source),
            None => warn!(
                "{}: no '_<wavelength>.{extension}' suffix, not grouped",
                source.file_name
            ),
        }
    }
    grouped
}
