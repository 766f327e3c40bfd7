// Coordinator - glue between telemetry ingestion and the tick-driven phase comparison
//
// Two activities share this object: the UDP listeners (write path, one call to
// `handle_sample` per packet) and the tick scheduler (`run`/`tick`, read path).
// Ingestion state sits behind one RwLock and plot state behind another. When
// both are needed, plot is always locked before ingest.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::clocktrack::ClockTracker;
use crate::constants::{PipelineSettings, EXPORT_DIR, STATE_WRITE_SECS, TICK_MS};
use crate::diffseries::{DiffSeries, PlotPoint, ReferenceSelector, TimeAxis};
use crate::error::Result;
use crate::history::{CorrectedSample, HistoryStore};
use crate::output::CsvExporter;
use crate::phase::{evaluate_pair, wrap, PairEvaluation};
use crate::sample::{AgentId, Sample};

/// Current wall-clock time as Unix seconds.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Write-path state, mutated only by ingestion.
#[derive(Debug)]
struct IngestState {
    clock: ClockTracker,
    history: HistoryStore,
    /// Most recent raw sample of each agent
    latest: HashMap<AgentId, Sample>,
    samples_received: usize,
    records_rejected: usize,
}

/// Read/compute-path state, mutated only by the tick scheduler.
#[derive(Debug)]
struct PlotState {
    reference: ReferenceSelector,
    axis: TimeAxis,
    diffs: DiffSeries,
    last_tick: Option<f64>,
    ticks: u64,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// False for the very first tick, which only records the clock
    pub advanced: bool,
    pub reference: Option<AgentId>,
    /// Pairs evaluated this tick, ascending by agent id
    pub evaluations: Vec<(AgentId, PairEvaluation)>,
}

/// Coordinator for the phase monitor
pub struct Coordinator {
    settings: PipelineSettings,
    ingest: RwLock<IngestState>,
    plot: RwLock<PlotState>,
    exporter: CsvExporter,
    tick_period: Duration,
    /// Status log interval in seconds. <= 0 = disabled.
    status_interval_secs: i64,
    /// Directory for agents.json. None = no state file.
    work_dir: Option<PathBuf>,
}

impl Coordinator {
    /// Coordinator with default settings and no periodic side outputs (for tests).
    pub fn new() -> Self {
        Self::with_settings(PipelineSettings::default())
    }

    pub fn with_settings(settings: PipelineSettings) -> Self {
        Self::new_with_options(
            settings,
            Duration::from_millis(TICK_MS),
            -1,
            None,
            CsvExporter::new(EXPORT_DIR),
        )
    }

    pub fn new_with_options(
        settings: PipelineSettings,
        tick_period: Duration,
        status_interval_secs: i64,
        work_dir: Option<PathBuf>,
        exporter: CsvExporter,
    ) -> Self {
        Coordinator {
            settings,
            ingest: RwLock::new(IngestState {
                clock: ClockTracker::new(settings.max_points, settings.offset_avg_points),
                history: HistoryStore::new(settings.max_points),
                latest: HashMap::new(),
                samples_received: 0,
                records_rejected: 0,
            }),
            plot: RwLock::new(PlotState {
                reference: ReferenceSelector::new(),
                axis: TimeAxis::new(settings.max_points),
                diffs: DiffSeries::new(settings.max_points),
                last_tick: None,
                ticks: 0,
            }),
            exporter,
            tick_period,
            status_interval_secs,
            work_dir,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Ingest one decoded sample received at `recv_time` (server clock).
    ///
    /// Offset recording, averaging and the history append happen under one
    /// write lock, so the scheduler never sees a half-applied sample.
    pub async fn handle_sample(&self, sample: Sample, recv_time: f64) -> CorrectedSample {
        let mut ingest = self.ingest.write().await;
        let avg_offset = ingest
            .clock
            .record_offset(sample.agent_id, recv_time, sample.raw_timestamp);
        let corrected = CorrectedSample::from_sample(&sample, avg_offset);
        ingest.history.append(sample.agent_id, corrected);
        if ingest.latest.insert(sample.agent_id, sample).is_none() {
            info!("New agent {} (offset {:.6} s)", sample.agent_id, avg_offset);
        }
        ingest.samples_received += 1;
        corrected
    }

    /// Count a telemetry record that failed to decode.
    pub async fn record_rejected(&self) {
        self.ingest.write().await.records_rejected += 1;
    }

    /// One scheduler step at wall-clock time `now`.
    ///
    /// The first call only records the clock. Later calls advance the time
    /// axis, fix the reference agent if needed and append one phase difference
    /// per agent that has enough data. A reference with fewer than two samples
    /// stalls every pair for this tick.
    pub async fn tick(&self, now: f64) -> TickReport {
        let mut plot = self.plot.write().await;

        let Some(last) = plot.last_tick.replace(now) else {
            return TickReport::default();
        };
        let dt = now - last;
        plot.axis.advance(dt);
        plot.ticks += 1;

        let mut report = TickReport {
            advanced: true,
            ..TickReport::default()
        };

        // Copy the recent windows out; interpolation runs without the ingest lock.
        let n = self.settings.interp_points;
        let (reference, ref_window, windows) = {
            let ingest = self.ingest.read().await;
            let ids = ingest.history.agent_ids();
            let Some(reference) = plot.reference.ensure_reference(&ids) else {
                return report;
            };
            if ingest.history.len_of(reference) < 2 {
                report.reference = Some(reference);
                return report;
            }
            let ref_window = ingest.history.recent_window(reference, n);
            let windows: Vec<(AgentId, Vec<CorrectedSample>)> = ids
                .into_iter()
                .filter(|&id| id != reference && ingest.history.len_of(id) >= 2)
                .map(|id| (id, ingest.history.recent_window(id, n)))
                .collect();
            (reference, ref_window, windows)
        };
        report.reference = Some(reference);

        for (agent_id, window) in windows {
            let Some(eval) = evaluate_pair(&ref_window, &window, now) else {
                continue;
            };
            if !eval.overlapped {
                debug!("No overlap between agents {} and {}, using current time", reference, agent_id);
            }
            plot.diffs.record_diff(agent_id, eval.phase_diff);
            report.evaluations.push((agent_id, eval));
        }
        report
    }

    /// Drive `tick` on the configured period, plus status logs and state file
    /// writes. Runs until the task is dropped.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let status_secs = self.status_interval_secs;
        let mut next_status = if status_secs > 0 {
            Some(tokio::time::Instant::now() + Duration::from_secs(status_secs as u64))
        } else {
            None
        };
        let mut next_write_state = self
            .work_dir
            .as_ref()
            .map(|_| tokio::time::Instant::now() + Duration::from_secs(STATE_WRITE_SECS));

        loop {
            ticker.tick().await;
            self.tick(unix_now()).await;

            if let Some(ref mut next) = next_status {
                if tokio::time::Instant::now() >= *next {
                    *next += Duration::from_secs(status_secs as u64);
                    self.log_status().await;
                }
            }
            if let Some(ref mut next) = next_write_state {
                if tokio::time::Instant::now() >= *next {
                    *next += Duration::from_secs(STATE_WRITE_SECS);
                    if let Err(e) = self.write_state().await {
                        error!("Failed to write state: {}", e);
                    }
                }
            }
        }
    }

    pub async fn reference_agent(&self) -> Option<AgentId> {
        self.plot.read().await.reference.get()
    }

    /// Agents that have sent at least one valid sample, ascending.
    pub async fn agent_ids(&self) -> Vec<AgentId> {
        self.ingest.read().await.history.agent_ids()
    }

    pub async fn history_len(&self, agent_id: AgentId) -> usize {
        self.ingest.read().await.history.len_of(agent_id)
    }

    pub async fn offset_len(&self, agent_id: AgentId) -> usize {
        self.ingest
            .read()
            .await
            .clock
            .get(agent_id)
            .map_or(0, |r| r.len())
    }

    pub async fn avg_offset(&self, agent_id: AgentId) -> Option<f64> {
        self.ingest.read().await.clock.avg_offset(agent_id)
    }

    pub async fn latest_sample(&self, agent_id: AgentId) -> Option<Sample> {
        self.ingest.read().await.latest.get(&agent_id).copied()
    }

    pub async fn samples_received(&self) -> usize {
        self.ingest.read().await.samples_received
    }

    pub async fn records_rejected(&self) -> usize {
        self.ingest.read().await.records_rejected
    }

    pub async fn axis_len(&self) -> usize {
        self.plot.read().await.axis.len()
    }

    pub async fn diff_len(&self, agent_id: AgentId) -> usize {
        self.plot.read().await.diffs.len_of(agent_id)
    }

    /// Newest phase difference of an agent against the reference.
    pub async fn latest_diff(&self, agent_id: AgentId) -> Option<f64> {
        self.plot.read().await.diffs.latest(agent_id)
    }

    /// Display-ready series for one agent, oldest first, with gap markers.
    pub async fn render_series(&self, agent_id: AgentId) -> Vec<PlotPoint> {
        let plot = self.plot.read().await;
        plot.diffs.render(agent_id, &plot.axis)
    }

    /// Export all difference series to a timestamped CSV file.
    pub async fn export(&self) -> Result<PathBuf> {
        let plot = self.plot.read().await;
        self.exporter.export(&plot.axis, &plot.diffs)
    }

    /// Export all difference series as CSV into `w`.
    pub async fn export_to<W: std::io::Write>(&self, w: &mut W) -> Result<usize> {
        let plot = self.plot.read().await;
        crate::output::write_csv(w, &plot.axis, &plot.diffs)
    }

    /// Human-readable status: latest raw data per agent, wrapped differences of
    /// the latest raw phases for every pair, and the latest interpolated
    /// difference against the reference.
    pub async fn status_lines(&self) -> Vec<String> {
        let plot = self.plot.read().await;
        let ingest = self.ingest.read().await;

        let mut lines = Vec::new();
        lines.push(format!(
            "Status: ({} agents) ({} samples {} rejected) ({} ticks)",
            ingest.latest.len(),
            ingest.samples_received,
            ingest.records_rejected,
            plot.ticks
        ));
        if ingest.latest.is_empty() {
            lines.push("No data yet...".to_string());
            return lines;
        }

        let mut ids: Vec<AgentId> = ingest.latest.keys().copied().collect();
        ids.sort_unstable();
        for id in &ids {
            let s = &ingest.latest[id];
            lines.push(format!(
                "Agent {}: TS = {:.5}, phi = {:.5}, sensorV = {:.5}, batteryV = {:.5}",
                id, s.raw_timestamp, s.phase, s.sensor_voltage, s.battery_voltage
            ));
        }
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                let diff = wrap(ingest.latest[a].phase - ingest.latest[b].phase);
                lines.push(format!("Agent {} - Agent {}: diff = {:.5}", a, b, diff));
            }
        }
        if let Some(reference) = plot.reference.get() {
            for id in plot.diffs.agent_ids() {
                if let Some(diff) = plot.diffs.latest(id) {
                    lines.push(format!(
                        "Ref-{} vs {}: diff = {:.5} ({} points)",
                        reference,
                        id,
                        diff,
                        plot.diffs.len_of(id)
                    ));
                }
            }
        }
        lines
    }

    async fn log_status(&self) {
        for line in self.status_lines().await {
            info!("{}", line);
        }
    }

    /// JSON snapshot of per-agent state (written to work_dir/agents.json).
    pub async fn state_json(&self) -> serde_json::Value {
        let plot = self.plot.read().await;
        let ingest = self.ingest.read().await;

        let mut agents = serde_json::Map::new();
        for id in ingest.history.agent_ids() {
            agents.insert(
                id.to_string(),
                serde_json::json!({
                    "samples": ingest.history.len_of(id),
                    "avg_offset": ingest.clock.avg_offset(id),
                    "latest": ingest.latest.get(&id),
                    "diff_points": plot.diffs.len_of(id),
                    "latest_diff": plot.diffs.latest(id),
                }),
            );
        }
        serde_json::json!({
            "reference": plot.reference.get(),
            "ticks": plot.ticks,
            "samples_received": ingest.samples_received,
            "records_rejected": ingest.records_rejected,
            "agents": agents,
        })
    }

    /// Rewrite work_dir/agents.json. No-op without a work_dir.
    pub async fn write_state(&self) -> Result<()> {
        let Some(dir) = self.work_dir.as_deref() else {
            return Ok(());
        };
        let state = self.state_json().await;
        let body = serde_json::to_string_pretty(&state)?;
        write_atomic(dir, "agents.json", body.as_bytes()).await
    }

    /// Create the work_dir if configured. Call once at startup.
    pub async fn init_work_dir(&self) -> Result<()> {
        if let Some(dir) = self.work_dir.as_deref() {
            tokio::fs::create_dir_all(dir).await?;
            debug!("Work dir {}", dir.display());
        }
        Ok(())
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Write via a temp file and rename so readers never see a partial file.
async fn write_atomic(dir: &Path, name: &str, data: &[u8]) -> Result<()> {
    let tmp = dir.join(format!("{}.tmp", name));
    tokio::fs::write(&tmp, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, dir.join(name)).await {
        warn!("Failed to replace {}: {}", name, e);
        return Err(e.into());
    }
    Ok(())
}
