// CSV export of phase difference series
// One row per tick, oldest first; one column per agent that has a series.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::constants::EXPORT_PREFIX;
use crate::diffseries::{DiffSeries, TimeAxis};
use crate::error::{Error, Result};

/// Write the series as CSV. Agents with shorter histories get empty cells in
/// their earliest rows. Returns the number of data rows written.
pub fn write_csv<W: Write>(w: &mut W, axis: &TimeAxis, diffs: &DiffSeries) -> Result<usize> {
    let agent_ids = diffs.agent_ids();
    if agent_ids.is_empty() {
        return Err(Error::NoData);
    }
    let rows = diffs.max_len();

    // Axis is newest first; take the matching prefix and flip it.
    let mut times: Vec<f64> = axis.newest(rows).collect();
    times.reverse();
    let missing_times = rows - times.len();

    write!(w, "time (s)")?;
    for id in &agent_ids {
        write!(w, ",phase_diff_agent_{}", id)?;
    }
    writeln!(w)?;

    for i in 0..rows {
        if i >= missing_times {
            write!(w, "{:?}", times[i - missing_times])?;
        }
        for id in &agent_ids {
            w.write_all(b",")?;
            let Some(series) = diffs.get(*id) else { continue };
            let len = series.len();
            let missing = rows - len;
            if i >= missing {
                // Series is newest first
                if let Some(v) = series.get(len - 1 - (i - missing)) {
                    write!(w, "{:?}", v)?;
                }
            }
        }
        writeln!(w)?;
    }
    w.flush()?;
    Ok(rows)
}

/// Writes timestamped CSV files into an export directory.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    dir: PathBuf,
}

impl CsvExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvExporter { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Export to `<dir>/phase_diff_all_agents_<YYYYmmdd_HHMMSS>.csv`.
    pub fn export(&self, axis: &TimeAxis, diffs: &DiffSeries) -> Result<PathBuf> {
        if diffs.agent_ids().is_empty() {
            return Err(Error::NoData);
        }
        fs::create_dir_all(&self.dir)?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{}_{}.csv", EXPORT_PREFIX, stamp));
        let file = fs::File::create(&path)?;
        let mut writer = BufWriter::new(file);
        let rows = write_csv(&mut writer, axis, diffs)?;
        info!("Exported {} rows to {}", rows, path.display());
        Ok(path)
    }
}
