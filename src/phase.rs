// Phase interpolation between agents
//
// Each agent's phase is sampled at its own (corrected) instants. To compare two
// agents we pick an instant inside the time range both recent windows cover and
// linearly interpolate each signal there.
//
// Raw phases are interpolated before the difference is wrapped. If an agent's
// phase wraps between two neighbouring samples the interpolated value near that
// point is wrong; this is a known approximation and is not corrected here.

use std::f64::consts::PI;

use crate::history::CorrectedSample;

const TWO_PI: f64 = 2.0 * PI;

/// Map an angle into (-PI, PI].
pub fn wrap(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TWO_PI) - PI;
    if wrapped <= -PI {
        wrapped + TWO_PI
    } else {
        wrapped
    }
}

/// Piecewise-linear interpolation of `(times[i], values[i])` at `x`.
///
/// Outside the sampled range the nearest end value is returned. Times are
/// expected in ascending order; for duplicate times the later value wins.
/// Returns None for empty input or mismatched lengths.
pub fn interp(x: f64, times: &[f64], values: &[f64]) -> Option<f64> {
    if times.is_empty() || times.len() != values.len() {
        return None;
    }
    let last = times.len() - 1;
    if x <= times[0] {
        return Some(values[0]);
    }
    if x >= times[last] {
        return Some(values[last]);
    }
    // First index with times[j] >= x; 1 <= j <= last here.
    let j = times.partition_point(|&t| t < x).clamp(1, last);
    let (t0, t1) = (times[j - 1], times[j]);
    let (v0, v1) = (values[j - 1], values[j]);
    let span = t1 - t0;
    if span <= 0.0 {
        return Some(v1);
    }
    Some(v0 + (x - t0) * (v1 - v0) / span)
}

/// Time range covered by both windows, using each window's first and last
/// corrected timestamps. None when the range is empty.
pub fn overlap(reference: &[CorrectedSample], agent: &[CorrectedSample]) -> Option<(f64, f64)> {
    let (ref_first, ref_last) = (reference.first()?, reference.last()?);
    let (agent_first, agent_last) = (agent.first()?, agent.last()?);
    let start = ref_first.corrected_timestamp.max(agent_first.corrected_timestamp);
    let end = ref_last.corrected_timestamp.min(agent_last.corrected_timestamp);
    if start >= end {
        None
    } else {
        Some((start, end))
    }
}

/// Result of comparing one agent against the reference at a single instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEvaluation {
    /// Instant (server time base) at which both signals were interpolated
    pub instant: f64,
    /// False when the windows did not overlap and `now` was used instead
    pub overlapped: bool,
    pub ref_phase: f64,
    pub agent_phase: f64,
    /// wrap(agent_phase - ref_phase)
    pub phase_diff: f64,
}

fn split(window: &[CorrectedSample]) -> (Vec<f64>, Vec<f64>) {
    window
        .iter()
        .map(|s| (s.corrected_timestamp, s.phase))
        .unzip()
}

/// Interpolate both windows at the midpoint of their overlap, or at `now`
/// when they do not overlap. Returns None if either window has fewer than
/// two samples.
pub fn evaluate_pair(reference: &[CorrectedSample], agent: &[CorrectedSample], now: f64) -> Option<PairEvaluation> {
    if reference.len() < 2 || agent.len() < 2 {
        return None;
    }

    let (instant, overlapped) = match overlap(reference, agent) {
        Some((start, end)) => ((start + end) / 2.0, true),
        None => (now, false),
    };

    let (ref_times, ref_phases) = split(reference);
    let (agent_times, agent_phases) = split(agent);
    let ref_phase = interp(instant, &ref_times, &ref_phases)?;
    let agent_phase = interp(instant, &agent_times, &agent_phases)?;

    Some(PairEvaluation {
        instant,
        overlapped,
        ref_phase,
        agent_phase,
        phase_diff: wrap(agent_phase - ref_phase),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(points: &[(f64, f64)]) -> Vec<CorrectedSample> {
        points
            .iter()
            .map(|&(t, phase)| CorrectedSample {
                corrected_timestamp: t,
                phase,
                sensor_voltage: 0.0,
                battery_voltage: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_wrap_range() {
        let mut x = -50.0;
        while x < 50.0 {
            let w = wrap(x);
            assert!(w > -PI && w <= PI, "wrap({}) = {}", x, w);
            x += 0.01;
        }
        assert_eq!(wrap(PI), PI);
        assert_eq!(wrap(-PI), PI);
        assert_eq!(wrap(0.0), 0.0);
        assert!((wrap(-1.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_periodic() {
        for &x in &[-3.0, -1.0, 0.2, 1.5, 3.1] {
            for k in -5..=5 {
                let shifted = wrap(x + TWO_PI * k as f64);
                assert!((shifted - wrap(x)).abs() < 1e-9, "x={} k={}", x, k);
            }
        }
    }

    #[test]
    fn test_interp_inside_and_clamped() {
        let times = [0.0, 10.0, 20.0];
        let values = [0.0, 1.0, 3.0];
        assert_eq!(interp(5.0, &times, &values), Some(0.5));
        assert_eq!(interp(15.0, &times, &values), Some(2.0));
        assert_eq!(interp(10.0, &times, &values), Some(1.0));
        assert_eq!(interp(-1.0, &times, &values), Some(0.0));
        assert_eq!(interp(99.0, &times, &values), Some(3.0));
        assert_eq!(interp(1.0, &[], &[]), None);
    }

    #[test]
    fn test_interp_duplicate_times() {
        let times = [0.0, 5.0, 5.0, 10.0];
        let values = [0.0, 1.0, 2.0, 3.0];
        let v = interp(5.0, &times, &values).unwrap();
        assert!(v == 1.0 || v == 2.0);
        assert!(interp(7.5, &times, &values).unwrap().is_finite());
    }

    #[test]
    fn test_overlap_midpoint_interpolation() {
        let reference = window(&[(0.0, 0.0), (10.0, 1.0)]);
        let agent = window(&[(0.0, 0.0), (10.0, -1.0)]);
        let eval = evaluate_pair(&reference, &agent, 1e9).unwrap();
        assert!(eval.overlapped);
        assert_eq!(eval.instant, 5.0);
        assert!((eval.ref_phase - 0.5).abs() < 1e-12);
        assert!((eval.agent_phase + 0.5).abs() < 1e-12);
        assert!((eval.phase_diff + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_overlap_falls_back_to_now() {
        let reference = window(&[(0.0, 0.0), (1.0, 1.0)]);
        let agent = window(&[(5.0, 2.0), (6.0, 2.5)]);
        assert_eq!(overlap(&reference, &agent), None);
        let eval = evaluate_pair(&reference, &agent, 123.0).unwrap();
        assert!(!eval.overlapped);
        assert_eq!(eval.instant, 123.0);
        // Both signals clamp to their last values
        assert_eq!(eval.ref_phase, 1.0);
        assert_eq!(eval.agent_phase, 2.5);
        assert!((eval.phase_diff - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_samples() {
        let reference = window(&[(0.0, 0.0), (1.0, 1.0)]);
        let agent = window(&[(0.5, 0.0)]);
        assert!(evaluate_pair(&reference, &agent, 0.0).is_none());
        assert!(evaluate_pair(&agent, &reference, 0.0).is_none());
    }

    #[test]
    fn test_diff_is_wrapped() {
        let reference = window(&[(0.0, -3.0), (2.0, -3.0)]);
        let agent = window(&[(0.0, 3.0), (2.0, 3.0)]);
        let eval = evaluate_pair(&reference, &agent, 0.0).unwrap();
        // 6.0 wraps to 6.0 - 2*PI
        assert!((eval.phase_diff - (6.0 - TWO_PI)).abs() < 1e-12);
    }
}
