// Corrected sample history
// Per-agent bounded buffers of clock-corrected samples, in arrival order.

use std::collections::HashMap;

use serde::Serialize;

use crate::ring::Ring;
use crate::sample::{AgentId, Sample};

/// A sample moved onto the server time base.
///
/// The correction is a snapshot of the agent's average offset at the time the
/// sample arrived; earlier samples are never re-corrected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrectedSample {
    pub corrected_timestamp: f64,
    pub phase: f64,
    pub sensor_voltage: f64,
    pub battery_voltage: f64,
}

impl CorrectedSample {
    pub fn from_sample(sample: &Sample, avg_offset: f64) -> Self {
        CorrectedSample {
            corrected_timestamp: sample.raw_timestamp + avg_offset,
            phase: sample.phase,
            sensor_voltage: sample.sensor_voltage,
            battery_voltage: sample.battery_voltage,
        }
    }
}

/// Arrival-ordered samples for one agent. Corrected timestamps may not be
/// monotonic when the average offset drifts; they are not re-sorted.
pub type AgentHistory = Ring<CorrectedSample>;

/// Histories of all agents seen so far.
#[derive(Debug)]
pub struct HistoryStore {
    agents: HashMap<AgentId, AgentHistory>,
    max_points: usize,
}

impl HistoryStore {
    pub fn new(max_points: usize) -> Self {
        HistoryStore {
            agents: HashMap::new(),
            max_points,
        }
    }

    /// Append a corrected sample, evicting the agent's oldest past capacity.
    pub fn append(&mut self, agent_id: AgentId, sample: CorrectedSample) {
        let max_points = self.max_points;
        self.agents
            .entry(agent_id)
            .or_insert_with(|| Ring::new(max_points))
            .push_back(sample);
    }

    pub fn get(&self, agent_id: AgentId) -> Option<&AgentHistory> {
        self.agents.get(&agent_id)
    }

    pub fn len_of(&self, agent_id: AgentId) -> usize {
        self.agents.get(&agent_id).map_or(0, |h| h.len())
    }

    /// Known agent ids, ascending.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Copy of the agent's last `n` samples, oldest first.
    pub fn recent_window(&self, agent_id: AgentId, n: usize) -> Vec<CorrectedSample> {
        self.agents
            .get(&agent_id)
            .map(|h| h.snapshot_last(n))
            .unwrap_or_default()
    }
}
