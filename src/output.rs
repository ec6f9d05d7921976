use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::Writer as CsvWriter;
use log::{debug, info};

/// Output directory that hands out CSV writers and remembers what it wrote.
pub struct OutputDir {
    dir: PathBuf,
    written: Vec<(PathBuf, usize)>,
}

impl OutputDir {
    pub fn create(dir: &Path) -> Result<Self> {
        create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn join(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Write one table (header plus rows) to `file_name`, replacing any
    /// previous file of that name.
    pub fn write_table<I>(&mut self, file_name: &str, header: &[&str], rows: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let file_path = self.dir.join(file_name);
        let file = File::create(&file_path)
            .with_context(|| format!("Failed to create CSV file: {}", file_path.display()))?;
        let mut writer = CsvWriter::from_writer(file);

        writer
            .write_record(header)
            .with_context(|| format!("Failed to write CSV header to {}", file_path.display()))?;

        let mut count = 0usize;
        for row in rows {
            writer.write_record(&row).with_context(|| {
                format!("Failed to write CSV record {} to {}", count + 1, file_path.display())
            })?;
            count += 1;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush CSV writer for {}", file_path.display()))?;

        debug!("Wrote {} rows to {}", count, file_path.display());
        info!("Saved: {}", file_path.display());
        self.written.push((file_path.clone(), count));
        Ok(file_path)
    }

    pub fn written(&self) -> &[(PathBuf, usize)] {
        &self.written
    }
}

/// Integer-looking weights print without decimals; fractional credit keeps
/// four places.
pub fn fmt_weight(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.4}", value)
    }
}

/// Count as shown in a cell label: one decimal for fractional credit.
pub fn fmt_count(value: f64, fractional: bool) -> String {
    if fractional {
        format!("{:.1}", value)
    } else {
        format!("{}", value.round() as i64)
    }
}

/// Undefined percentages are written as empty cells.
pub fn fmt_percent(value: Option<f64>) -> String {
    value.map_or_else(String::new, |p| format!("{:.1}", p))
}

/// "12.5% (3)"; just "(3)" when the percentage is undefined.
pub fn cell_label(percent: Option<f64>, count: f64, fractional: bool) -> String {
    match percent {
        Some(p) => format!("{:.1}% ({})", p, fmt_count(count, fractional)),
        None => format!("({})", fmt_count(count, fractional)),
    }
}
