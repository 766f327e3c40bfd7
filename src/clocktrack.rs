// Clock offset tracking
// Agents report timestamps from their own free-running clocks. The offset
// (server receive time - agent timestamp) is tracked per agent and its recent
// mean is used to move agent timestamps onto the server time base.

use std::collections::HashMap;

use crate::ring::Ring;
use crate::sample::AgentId;

/// Offset observations for one agent, oldest first.
#[derive(Debug, Clone)]
pub struct OffsetRecord {
    offsets: Ring<f64>,
}

impl OffsetRecord {
    pub fn new(max_points: usize) -> Self {
        OffsetRecord {
            offsets: Ring::new(max_points),
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Append a raw offset observation, evicting the oldest past capacity.
    pub fn push(&mut self, offset: f64) {
        self.offsets.push_back(offset);
    }

    /// Mean of the last `min(len, avg_points)` offsets. None when empty.
    pub fn average(&self, avg_points: usize) -> Option<f64> {
        let n = self.offsets.len().min(avg_points.max(1));
        if n == 0 {
            return None;
        }
        let sum: f64 = self.offsets.last_n(n).sum();
        Some(sum / n as f64)
    }

    /// Most recent raw offset.
    pub fn last(&self) -> Option<f64> {
        self.offsets.back().copied()
    }
}

/// Per-agent clock offset tracker.
#[derive(Debug)]
pub struct ClockTracker {
    records: HashMap<AgentId, OffsetRecord>,
    max_points: usize,
    avg_points: usize,
}

impl ClockTracker {
    pub fn new(max_points: usize, avg_points: usize) -> Self {
        ClockTracker {
            records: HashMap::new(),
            max_points,
            avg_points,
        }
    }

    /// Record one offset observation and return the agent's current average offset.
    ///
    /// The first sample of an agent defines its initial offset; no warm-up is required.
    pub fn record_offset(&mut self, agent_id: AgentId, local_receive_time: f64, raw_timestamp: f64) -> f64 {
        let offset = local_receive_time - raw_timestamp;
        let max_points = self.max_points;
        let record = self
            .records
            .entry(agent_id)
            .or_insert_with(|| OffsetRecord::new(max_points));
        record.push(offset);
        // Non-empty after push
        record.average(self.avg_points).unwrap_or(offset)
    }

    /// Current average offset without recording anything.
    pub fn avg_offset(&self, agent_id: AgentId) -> Option<f64> {
        self.records.get(&agent_id)?.average(self.avg_points)
    }

    pub fn get(&self, agent_id: AgentId) -> Option<&OffsetRecord> {
        self.records.get(&agent_id)
    }

    pub fn num_agents(&self) -> usize {
        self.records.len()
    }
}
