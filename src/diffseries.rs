// Phase difference series
// Reference agent selection, the shared relative time axis, and the per-agent
// history of wrapped phase differences used for display and export.

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::Serialize;
use tracing::info;

use crate::ring::Ring;
use crate::sample::AgentId;

/// Chooses the agent all differences are measured against.
///
/// Set once, to the lowest id known on the first tick with any data, and never
/// changed afterwards. If that agent stops reporting, all pairs stall.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceSelector {
    reference: Option<AgentId>,
}

impl ReferenceSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<AgentId> {
        self.reference
    }

    /// Fix the reference if it is not set yet and any agent is known.
    pub fn ensure_reference(&mut self, known_agent_ids: &[AgentId]) -> Option<AgentId> {
        if self.reference.is_none() {
            if let Some(&lowest) = known_agent_ids.iter().min() {
                info!("Reference agent: {}", lowest);
                self.reference = Some(lowest);
            }
        }
        self.reference
    }
}

/// Relative time of each tick, newest first. The newest entry is always 0.
#[derive(Debug, Clone)]
pub struct TimeAxis {
    times: Ring<f64>,
}

impl TimeAxis {
    pub fn new(max_points: usize) -> Self {
        TimeAxis {
            times: Ring::new(max_points),
        }
    }

    /// Shift every entry back by `dt` seconds and prepend 0.
    pub fn advance(&mut self, dt: f64) {
        for t in self.times.iter_mut() {
            *t -= dt;
        }
        self.times.push_front(0.0);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The `n` newest entries, newest first.
    pub fn newest(&self, n: usize) -> impl Iterator<Item = f64> + '_ {
        self.times.iter().take(n).copied()
    }
}

/// One point of a renderable series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlotPoint {
    Value { time: f64, phase_diff: f64 },
    /// Break in the line: consecutive values jumped by more than PI.
    Gap,
}

/// Wrapped phase differences of each non-reference agent, newest first.
#[derive(Debug)]
pub struct DiffSeries {
    series: HashMap<AgentId, Ring<f64>>,
    max_points: usize,
}

impl DiffSeries {
    pub fn new(max_points: usize) -> Self {
        DiffSeries {
            series: HashMap::new(),
            max_points,
        }
    }

    /// Insert the newest difference at the front of the agent's series.
    pub fn record_diff(&mut self, agent_id: AgentId, phase_diff: f64) {
        let max_points = self.max_points;
        self.series
            .entry(agent_id)
            .or_insert_with(|| Ring::new(max_points))
            .push_front(phase_diff);
    }

    pub fn get(&self, agent_id: AgentId) -> Option<&Ring<f64>> {
        self.series.get(&agent_id)
    }

    pub fn len_of(&self, agent_id: AgentId) -> usize {
        self.series.get(&agent_id).map_or(0, |s| s.len())
    }

    /// Agents with a series, ascending.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.series.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Length of the longest series.
    pub fn max_len(&self) -> usize {
        self.series.values().map(|s| s.len()).max().unwrap_or(0)
    }

    pub fn latest(&self, agent_id: AgentId) -> Option<f64> {
        self.series.get(&agent_id)?.front().copied()
    }

    /// Oldest-to-newest points of an agent's series, paired with the matching
    /// prefix of the time axis, with a gap between any two consecutive values
    /// more than PI apart.
    pub fn render(&self, agent_id: AgentId, axis: &TimeAxis) -> Vec<PlotPoint> {
        let Some(diffs) = self.series.get(&agent_id) else {
            return Vec::new();
        };
        let mut pairs: Vec<(f64, f64)> = axis.newest(diffs.len()).zip(diffs.iter().copied()).collect();
        pairs.reverse();
        with_gaps(&pairs)
    }
}

/// Insert a gap marker between consecutive `(time, value)` points whose values
/// differ by more than PI.
pub fn with_gaps(points: &[(f64, f64)]) -> Vec<PlotPoint> {
    let mut out = Vec::with_capacity(points.len());
    let mut prev: Option<f64> = None;
    for &(time, phase_diff) in points {
        if let Some(p) = prev {
            if (phase_diff - p).abs() > PI {
                out.push(PlotPoint::Gap);
            }
        }
        out.push(PlotPoint::Value { time, phase_diff });
        prev = Some(phase_diff);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_fixed_once_set() {
        let mut sel = ReferenceSelector::new();
        assert_eq!(sel.ensure_reference(&[]), None);
        assert_eq!(sel.ensure_reference(&[5, 3, 9]), Some(3));
        // A lower id arriving later does not move the reference
        assert_eq!(sel.ensure_reference(&[1, 3, 5, 9]), Some(3));
        assert_eq!(sel.ensure_reference(&[]), Some(3));
        assert_eq!(sel.get(), Some(3));
    }

    #[test]
    fn test_time_axis_shift() {
        let mut axis = TimeAxis::new(3);
        axis.advance(0.5);
        axis.advance(0.25);
        axis.advance(0.25);
        let times: Vec<f64> = axis.newest(10).collect();
        assert_eq!(times, vec![0.0, -0.25, -0.5]);
        axis.advance(1.0);
        let times: Vec<f64> = axis.newest(10).collect();
        assert_eq!(times, vec![0.0, -1.0, -1.25]);
        assert_eq!(axis.len(), 3);
    }

    #[test]
    fn test_record_diff_newest_first_and_bounded() {
        let mut series = DiffSeries::new(3);
        for v in [0.1, 0.2, 0.3, 0.4] {
            series.record_diff(2, v);
        }
        let values: Vec<f64> = series.get(2).unwrap().iter().copied().collect();
        assert_eq!(values, vec![0.4, 0.3, 0.2]);
        assert_eq!(series.latest(2), Some(0.4));
        assert_eq!(series.max_len(), 3);
    }

    #[test]
    fn test_gap_inserted_across_wrap() {
        let points = with_gaps(&[(-1.0, 3.0), (0.0, -3.0)]);
        assert_eq!(
            points,
            vec![
                PlotPoint::Value { time: -1.0, phase_diff: 3.0 },
                PlotPoint::Gap,
                PlotPoint::Value { time: 0.0, phase_diff: -3.0 },
            ]
        );
        let smooth = with_gaps(&[(-1.0, 1.0), (0.0, -1.0)]);
        assert_eq!(smooth.len(), 2);
    }

    #[test]
    fn test_render_pairs_with_axis() {
        let mut axis = TimeAxis::new(10);
        let mut series = DiffSeries::new(10);
        axis.advance(0.0);
        axis.advance(1.0);
        series.record_diff(2, 3.0);
        axis.advance(1.0);
        series.record_diff(2, -3.0);

        let points = series.render(2, &axis);
        assert_eq!(
            points,
            vec![
                PlotPoint::Value { time: -1.0, phase_diff: 3.0 },
                PlotPoint::Gap,
                PlotPoint::Value { time: 0.0, phase_diff: -3.0 },
            ]
        );
        assert!(series.render(7, &axis).is_empty());
    }
}
