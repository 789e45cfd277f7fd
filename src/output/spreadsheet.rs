use std::path::PathBuf;

use log::{info, warn};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use super::{group_name, non_empty, CombinedGroups, OutputStrategy};
use crate::data::model::{CellValue, MergedTable};
use crate::error::{CalibrationError, Result};

/// A single workbook with one `<wavelength>nm` sheet per group.
#[derive(Debug, Clone)]
pub struct SpreadsheetWriter {
    path: PathBuf,
}

impl SpreadsheetWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutputStrategy for SpreadsheetWriter {
    fn describe(&self) -> String {
        format!("workbook {}", self.path.display())
    }

    fn write(&self, groups: &CombinedGroups) -> Result<Vec<PathBuf>> {
        if non_empty(groups).next().is_none() {
            warn!("no data found to export");
            return Ok(Vec::new());
        }

        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        for (wavelength, table) in non_empty(groups) {
            let sheet = workbook.add_worksheet();
            sheet.set_name(group_name(wavelength))?;
            fill_sheet(sheet, table, &header_format)?;
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CalibrationError::io(format!("creating {}", parent.display()), e))?;
        }
        workbook.save(&self.path)?;
        info!("exported all wavelengths to {}", self.path.display());
        Ok(vec![self.path.clone()])
    }
}

impl From<XlsxError> for CalibrationError {
    fn from(value: XlsxError) -> Self {
        CalibrationError::Spreadsheet(value.to_string())
    }
}

fn fill_sheet(sheet: &mut Worksheet, table: &MergedTable, header_format: &Format) -> Result<()> {
    for (col, name) in table.header().into_iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, header_format)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let excel_row = r as u32 + 1;
        for (col, cell) in std::iter::once(&row.key).chain(&row.cells).enumerate() {
            let col = col as u16;
            match cell {
                CellValue::Integer(i) => {
                    sheet.write_number(excel_row, col, *i as f64)?;
                }
                CellValue::Float(v) if v.is_finite() => {
                    sheet.write_number(excel_row, col, *v)?;
                }
                CellValue::Float(_) | CellValue::Empty => {}
                CellValue::Text(s) => {
                    sheet.write_string(excel_row, col, s)?;
                }
            }
        }
    }
    sheet.set_freeze_panes(1, 0)?;
    sheet.autofit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::table;

    #[test]
    fn writes_workbook_with_non_empty_groups() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("outputs").join("combined_power_data.xlsx");
        let writer = SpreadsheetWriter::new(&path);

        let mut groups = CombinedGroups::new();
        groups.insert(640, Some(table(&[10])));
        groups.insert(488, Some(table(&[10, 20])));
        groups.insert(561, Some(table(&[])));

        let written = writer.write(&groups).unwrap();
        assert_eq!(written, vec![path.clone()]);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn skips_workbook_without_data() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("empty.xlsx");
        let mut groups = CombinedGroups::new();
        groups.insert(488, None);
        assert!(SpreadsheetWriter::new(&path).write(&groups).unwrap().is_empty());
        assert!(!path.exists());
    }
}
