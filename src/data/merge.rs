use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::{debug, warn};

use super::model::{
    CellValue, JoinKey, MergedRow, MergedTable, SeriesColumns, SourceTable, KEY_COLUMN,
};
use crate::error::{CalibrationError, Result};

/// Measured-value columns contain this after prefixing, e.g. `07-25_power`.
pub const VALUE_MARKER: &str = "_power";
/// Error columns contain this after prefixing, e.g. `07-25_error`.
pub const ERROR_MARKER: &str = "_error";

// ---------------------------------------------------------------------------
// Group merge
// ---------------------------------------------------------------------------

/// Outer-join every source of one wavelength group on [`KEY_COLUMN`].
///
/// Sources are folded left to right. Non-key columns are prefixed with
/// `<label>_`; the key keeps its name. After the last join, rows sharing a
/// key collapse to the first one and the result is sorted by key.
///
/// An empty group yields `Ok(None)`.
pub fn merge_group(sources: &[SourceTable]) -> Result<Option<MergedTable>> {
    let mut merged: Option<MergedTable> = None;
    let mut used_labels: BTreeSet<String> = BTreeSet::new();

    for source in sources {
        let label = unique_label(&source.label, &used_labels);
        if label != source.label {
            warn!(
                "{}: label '{}' already used in this group, columns prefixed with '{label}'",
                source.file_name, source.label
            );
        }
        used_labels.insert(label.clone());

        let incoming = prefixed(source, &label)?;
        merged = Some(match merged {
            None => incoming,
            Some(acc) => outer_join(acc, incoming),
        });
    }

    Ok(merged.map(|mut table| {
        dedup_and_sort(&mut table);
        debug!(
            "merged {} sources into {} rows x {} columns",
            sources.len(),
            table.len(),
            table.columns.len() + 1
        );
        table
    }))
}

fn unique_label(label: &str, used: &BTreeSet<String>) -> String {
    if !used.contains(label) {
        return label.to_string();
    }
    (2..)
        .map(|n| format!("{label}-{n}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| label.to_string())
}

/// Turn one source into a single-source merged table with prefixed columns.
fn prefixed(source: &SourceTable, label: &str) -> Result<MergedTable> {
    let table = &source.table;
    let key_idx = table
        .column_index(KEY_COLUMN)
        .ok_or_else(|| CalibrationError::MissingKeyColumn {
            file_name: source.file_name.clone(),
            column: KEY_COLUMN.to_string(),
        })?;

    let columns: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != key_idx)
        .map(|(_, c)| format!("{label}_{c}"))
        .collect();

    let rows = table
        .rows
        .iter()
        .map(|row| MergedRow {
            key: row.get(key_idx).cloned().unwrap_or(CellValue::Empty),
            cells: row
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != key_idx)
                .map(|(_, c)| c.clone())
                .collect(),
        })
        .collect();

    let series = vec![discover_series(label, &columns, 0)];

    Ok(MergedTable {
        key_column: KEY_COLUMN.to_string(),
        columns,
        rows,
        series,
    })
}

/// Locate a label's value and error columns among its prefixed columns.
/// `offset` is where those columns start in the merged table.
fn discover_series(label: &str, columns: &[String], offset: usize) -> SeriesColumns {
    let find = |marker: &str| {
        columns
            .iter()
            .position(|c| c.contains(marker))
            .map(|i| i + offset)
    };
    SeriesColumns {
        label: label.to_string(),
        value_column: find(VALUE_MARKER),
        error_column: find(ERROR_MARKER),
    }
}

/// Full outer join of `left` and `right` on the key.
///
/// Output order: left rows in order, each expanded by its matching right
/// rows (right order), then right rows that matched nothing.
fn outer_join(left: MergedTable, right: MergedTable) -> MergedTable {
    let left_width = left.columns.len();
    let right_width = right.columns.len();

    let mut right_index: BTreeMap<JoinKey, Vec<usize>> = BTreeMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        right_index.entry(JoinKey::from(&row.key)).or_default().push(i);
    }

    let mut matched: HashSet<usize> = HashSet::new();
    let mut rows = Vec::with_capacity(left.rows.len() + right.rows.len());

    for lrow in left.rows {
        match right_index.get(&JoinKey::from(&lrow.key)) {
            Some(hits) => {
                for &ri in hits {
                    matched.insert(ri);
                    let mut cells = lrow.cells.clone();
                    cells.extend(right.rows[ri].cells.iter().cloned());
                    rows.push(MergedRow {
                        key: lrow.key.clone(),
                        cells,
                    });
                }
            }
            None => {
                let mut cells = lrow.cells;
                cells.resize(left_width + right_width, CellValue::Empty);
                rows.push(MergedRow {
                    key: lrow.key,
                    cells,
                });
            }
        }
    }

    for (i, rrow) in right.rows.into_iter().enumerate() {
        if matched.contains(&i) {
            continue;
        }
        let mut cells = vec![CellValue::Empty; left_width];
        cells.extend(rrow.cells);
        rows.push(MergedRow {
            key: rrow.key,
            cells,
        });
    }

    let mut columns = left.columns;
    columns.extend(right.columns);

    let mut series = left.series;
    series.extend(right.series.into_iter().map(|s| SeriesColumns {
        label: s.label,
        value_column: s.value_column.map(|i| i + left_width),
        error_column: s.error_column.map(|i| i + left_width),
    }));

    MergedTable {
        key_column: left.key_column,
        columns,
        rows,
        series,
    }
}

/// Keep the first row per key, then sort ascending by key.
fn dedup_and_sort(table: &mut MergedTable) {
    let mut seen: BTreeSet<JoinKey> = BTreeSet::new();
    table.rows.retain(|row| seen.insert(JoinKey::from(&row.key)));
    table.rows.sort_by_key(|row| JoinKey::from(&row.key));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::RawTable;

    fn source(label: &str, rows: &[(i64, f64, f64)]) -> SourceTable {
        SourceTable {
            label: label.to_string(),
            file_name: format!("{label}_scan_488.csv"),
            table: RawTable {
                columns: vec![KEY_COLUMN.into(), "power".into(), "error".into()],
                rows: rows
                    .iter()
                    .map(|&(k, p, e)| {
                        vec![CellValue::Integer(k), CellValue::Float(p), CellValue::Float(e)]
                    })
                    .collect(),
            },
        }
    }

    fn keys(t: &MergedTable) -> Vec<f64> {
        t.keys().filter_map(CellValue::as_f64).collect()
    }

    #[test]
    fn empty_group_is_absent() {
        assert!(merge_group(&[]).unwrap().is_none());
    }

    #[test]
    fn single_source_keeps_key_and_prefixes_the_rest() {
        let t = merge_group(&[source("07-25", &[(20, 2.0, 0.2), (10, 1.0, 0.1)])])
            .unwrap()
            .unwrap();
        assert_eq!(t.header(), vec![KEY_COLUMN, "07-25_power", "07-25_error"]);
        assert_eq!(keys(&t), vec![10.0, 20.0]);
        assert_eq!(t.rows[0].cells, vec![CellValue::Float(1.0), CellValue::Float(0.1)]);
    }

    #[test]
    fn outer_join_keeps_every_key() {
        let g1 = source("07-25", &[(1, 1.0, 0.1), (2, 2.0, 0.1), (3, 3.0, 0.1)]);
        let g2 = source("08-10", &[(2, 2.5, 0.2), (3, 3.5, 0.2), (4, 4.5, 0.2)]);
        let t = merge_group(&[g1, g2]).unwrap().unwrap();

        assert_eq!(keys(&t), vec![1.0, 2.0, 3.0, 4.0]);
        let g2_power = t.column_index("08-10_power").unwrap();
        let g1_power = t.column_index("07-25_power").unwrap();
        assert!(t.rows[0].cells[g2_power].is_empty());
        assert!(t.rows[3].cells[g1_power].is_empty());
        assert_eq!(t.rows[1].cells[g2_power], CellValue::Float(2.5));
    }

    #[test]
    fn rows_end_up_strictly_ascending() {
        let g1 = source("07-25", &[(30, 0.0, 0.0), (10, 0.0, 0.0)]);
        let g2 = source("08-10", &[(25, 0.0, 0.0), (5, 0.0, 0.0)]);
        let t = merge_group(&[g1, g2]).unwrap().unwrap();
        let k = keys(&t);
        assert!(k.windows(2).all(|w| w[0] < w[1]), "{k:?}");
    }

    #[test]
    fn duplicate_keys_keep_first_row() {
        let g1 = source("07-25", &[(10, 1.0, 0.1), (10, 9.0, 0.9)]);
        let t = merge_group(&[g1]).unwrap().unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.rows[0].cells[0], CellValue::Float(1.0));
    }

    #[test]
    fn integer_and_float_keys_join() {
        let g1 = source("07-25", &[(10, 1.0, 0.1)]);
        let mut g2 = source("08-10", &[(0, 2.0, 0.2)]);
        g2.table.rows[0][0] = CellValue::Float(10.0);
        let t = merge_group(&[g1, g2]).unwrap().unwrap();
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn series_columns_track_each_label() {
        let g1 = source("07-25", &[(10, 1.0, 0.1)]);
        let g2 = source("08-10", &[(10, 2.0, 0.2)]);
        let t = merge_group(&[g1, g2]).unwrap().unwrap();
        assert_eq!(
            t.series,
            vec![
                SeriesColumns {
                    label: "07-25".into(),
                    value_column: Some(0),
                    error_column: Some(1)
                },
                SeriesColumns {
                    label: "08-10".into(),
                    value_column: Some(2),
                    error_column: Some(3)
                },
            ]
        );
    }

    #[test]
    fn repeated_labels_are_disambiguated() {
        let t = merge_group(&[
            source("07-25", &[(10, 1.0, 0.1)]),
            source("07-25", &[(10, 2.0, 0.2)]),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(t.columns[2], "07-25-2_power");
        assert_eq!(t.series[1].label, "07-25-2");
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let mut s = source("07-25", &[(10, 1.0, 0.1)]);
        s.table.columns[0] = "setpoint".into();
        let err = merge_group(&[s]).unwrap_err();
        assert!(matches!(err, CalibrationError::MissingKeyColumn { .. }));
    }
}
