use std::path::PathBuf;

use clap::Parser;

use crate::constants::{
    PipelineSettings, EXPORT_DIR, MAX_POINTS, N_INTERP, OFFSET_AVG_POINTS, PARAM_ADDR, TELEMETRY_ADDR, TICK_MS,
};
use crate::error::{Error, Result};

/// Phase monitor configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Listen on host:port for agent telemetry. May be given more than once.
    #[arg(long, value_name = "ADDR", default_value = TELEMETRY_ADDR)]
    pub listen: Vec<String>,

    /// Listen on host:port for agent parameter requests.
    #[arg(long, value_name = "ADDR", default_value = PARAM_ADDR)]
    pub param_listen: String,

    /// Do not start the parameter responder.
    #[arg(long, default_value_t = false)]
    pub no_param_server: bool,

    /// JSON file mapping agent id to {"omega", "kappa", "alpha"}; replaces the built-in table.
    #[arg(long, value_name = "FILE")]
    pub param_table: Option<PathBuf>,

    /// Tick period in milliseconds.
    #[arg(long, default_value_t = TICK_MS)]
    pub tick_ms: u64,

    /// Number of most recent samples per agent used for interpolation.
    #[arg(long, default_value_t = N_INTERP)]
    pub interp_points: usize,

    /// Maximum entries kept in every history and series.
    #[arg(long, default_value_t = MAX_POINTS)]
    pub max_points: usize,

    /// Number of most recent clock offsets averaged for timestamp correction.
    #[arg(long, default_value_t = OFFSET_AVG_POINTS)]
    pub offset_avg_points: usize,

    /// Directory for CSV exports (type "e" + Enter to export).
    #[arg(long, value_name = "DIR", default_value = EXPORT_DIR)]
    pub export_dir: PathBuf,

    /// Export the phase differences when shutting down.
    #[arg(long, default_value_t = false)]
    pub export_on_exit: bool,

    /// Status logging interval in seconds, 0 or negative to disable
    #[arg(long, default_value_t = 15, allow_negative_numbers = true)]
    pub status_interval: i64,

    /// Directory for the periodic agents.json state file
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_points == 0 {
            return Err(Error::Config("--max-points must be at least 1".into()));
        }
        if self.offset_avg_points == 0 {
            return Err(Error::Config("--offset-avg-points must be at least 1".into()));
        }
        if self.interp_points < 2 {
            return Err(Error::Config("--interp-points must be at least 2".into()));
        }
        if self.tick_ms == 0 {
            return Err(Error::Config("--tick-ms must be at least 1".into()));
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_points: self.max_points,
            offset_avg_points: self.offset_avg_points,
            interp_points: self.interp_points,
        }
    }
}
