use std::path::{Path, PathBuf};

use log::info;

use super::{group_name, non_empty, CombinedGroups, OutputStrategy};
use crate::data::model::MergedTable;
use crate::error::{CalibrationError, Result};

/// One `combined_<wavelength>nm.csv` per group.
#[derive(Debug, Clone)]
pub struct DelimitedFileWriter {
    dir: PathBuf,
}

impl DelimitedFileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_path(&self, wavelength: u32) -> PathBuf {
        self.dir
            .join(format!("combined_{}.csv", group_name(wavelength)))
    }
}

impl OutputStrategy for DelimitedFileWriter {
    fn describe(&self) -> String {
        format!("csv files in {}", self.dir.display())
    }

    fn write(&self, groups: &CombinedGroups) -> Result<Vec<PathBuf>> {
        if non_empty(groups).next().is_none() {
            return Ok(Vec::new());
        }
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CalibrationError::io(format!("creating {}", self.dir.display()), e))?;

        let mut written = Vec::new();
        for (wavelength, table) in non_empty(groups) {
            let path = self.file_path(wavelength);
            write_table(&path, table)?;
            info!("saved {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn write_table(path: &Path, table: &MergedTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.header())?;
    for row in &table.rows {
        writer.write_record(
            std::iter::once(&row.key)
                .chain(row.cells.iter())
                .map(|c| c.to_string()),
        )?;
    }
    writer
        .flush()
        .map_err(|e| CalibrationError::io(format!("writing {}", path.display()), e))?;
    Ok(())
}
