use std::cmp::Ordering;
use std::fmt;

/// Column every calibration table is joined on.
pub const KEY_COLUMN: &str = "power_percentage_values";

static EMPTY: CellValue = CellValue::Empty;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a parsed table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell. Columns start out as text and are coerced to
/// numbers when every non-empty cell parses.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Empty,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Empty => Ok(()),
        }
    }
}

impl CellValue {
    /// Numeric view of the cell, if it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Raw cell text as read from the file; blank text becomes `Empty`.
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(raw.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// JoinKey – ordering and equality for the join column
// ---------------------------------------------------------------------------

/// Totally ordered view of a key cell.
///
/// Numbers compare by value regardless of integer/float storage, so `10`
/// from one file joins with `10.0` from another. Numbers sort before text,
/// missing keys sort last.
#[derive(Debug, Clone)]
pub enum JoinKey {
    Number(f64),
    Text(String),
    Missing,
}

impl From<&CellValue> for JoinKey {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Integer(i) => JoinKey::Number(*i as f64),
            // -0.0 and 0.0 are the same key
            CellValue::Float(v) => JoinKey::Number(if *v == 0.0 { 0.0 } else { *v }),
            CellValue::Text(s) => JoinKey::Text(s.clone()),
            CellValue::Empty => JoinKey::Missing,
        }
    }
}

impl PartialEq for JoinKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for JoinKey {}

impl PartialOrd for JoinKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for JoinKey {
    fn cmp(&self, other: &Self) -> Ordering {
        use JoinKey::*;
        fn rank(k: &JoinKey) -> u8 {
            match k {
                Number(_) => 0,
                Text(_) => 1,
                Missing => 2,
            }
        }
        match (self, other) {
            (Number(a), Number(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// RawTable – one extracted result table
// ---------------------------------------------------------------------------

/// The table found under the marker line of one calibration log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    /// Header fields in file order.
    pub columns: Vec<String>,
    /// Data rows, each aligned with `columns`.
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rename every column called `from` to `to`.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        for col in self.columns.iter_mut().filter(|c| c.as_str() == from) {
            *col = to.to_string();
        }
    }

    /// Convert each column to integers or floats when every non-empty cell
    /// parses; columns with any non-numeric cell stay text.
    pub fn coerce_numeric(&mut self) {
        for idx in 0..self.columns.len() {
            let texts: Vec<&str> = self
                .rows
                .iter()
                .filter_map(|row| match row.get(idx) {
                    Some(CellValue::Text(s)) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            if texts.is_empty() {
                continue;
            }

            let convert: fn(&str) -> Option<CellValue> =
                if texts.iter().all(|s| s.parse::<i64>().is_ok()) {
                    |s| s.parse::<i64>().ok().map(CellValue::Integer)
                } else if texts.iter().all(|s| s.parse::<f64>().is_ok()) {
                    |s| s.parse::<f64>().ok().map(CellValue::Float)
                } else {
                    continue;
                };

            for row in &mut self.rows {
                let Some(cell) = row.get_mut(idx) else {
                    continue;
                };
                let converted = match cell {
                    CellValue::Text(s) => convert(s),
                    _ => None,
                };
                if let Some(converted) = converted {
                    *cell = converted;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SourceTable – a RawTable plus where it came from
// ---------------------------------------------------------------------------

/// One parsed log file, ready for grouping.
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// Date-like prefix of the file name, e.g. `07-25`.
    pub label: String,
    pub file_name: String,
    pub table: RawTable,
}

// ---------------------------------------------------------------------------
// MergedTable – outer join of a wavelength group
// ---------------------------------------------------------------------------

/// Which merged columns carry a label's measured value and its error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesColumns {
    pub label: String,
    /// Index into `MergedTable::columns`.
    pub value_column: Option<usize>,
    /// Index into `MergedTable::columns`.
    pub error_column: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub key: CellValue,
    /// Aligned with `MergedTable::columns`.
    pub cells: Vec<CellValue>,
}

/// All sources of one wavelength joined on the key column.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub key_column: String,
    /// Label-prefixed non-key columns, in join order.
    pub columns: Vec<String>,
    /// One row per distinct key, ascending.
    pub rows: Vec<MergedRow>,
    /// Per-label column association, in join order.
    pub series: Vec<SeriesColumns>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header as written to exports: key first, then the renamed columns.
    pub fn header(&self) -> Vec<&str> {
        std::iter::once(self.key_column.as_str())
            .chain(self.columns.iter().map(String::as_str))
            .collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &CellValue> {
        self.rows.iter().map(|r| &r.key)
    }

    /// Cells of one non-key column, top to bottom.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &CellValue> {
        self.rows
            .iter()
            .map(move |r| r.cells.get(idx).unwrap_or(&EMPTY))
    }
}
