// Shared constants for the phase monitor

/// Maximum entries kept in every bounded series (offsets, history, time axis, diffs).
pub const MAX_POINTS: usize = 100_000;

/// Number of most recent offsets averaged into the clock correction.
/// Must stay below MAX_POINTS.
pub const OFFSET_AVG_POINTS: usize = 500;

/// Number of most recent samples per agent used for interpolation.
pub const N_INTERP: usize = 100;

/// Tick scheduler period (ms).
pub const TICK_MS: u64 = 10;

/// Default telemetry listen address.
pub const TELEMETRY_ADDR: &str = "0.0.0.0:5000";

/// Default parameter responder listen address.
pub const PARAM_ADDR: &str = "0.0.0.0:5001";

/// Receive buffer for one telemetry or parameter datagram.
pub const MAX_DATAGRAM: usize = 1024;

/// Interval between work_dir state file writes (s).
pub const STATE_WRITE_SECS: u64 = 5;

/// Default directory for CSV exports.
pub const EXPORT_DIR: &str = "exported_data";

/// File name prefix for CSV exports.
pub const EXPORT_PREFIX: &str = "phase_diff_all_agents";

/// Tunables consumed by the core pipeline, independent of the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    pub max_points: usize,
    pub offset_avg_points: usize,
    pub interp_points: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            max_points: MAX_POINTS,
            offset_avg_points: OFFSET_AVG_POINTS,
            interp_points: N_INTERP,
        }
    }
}
