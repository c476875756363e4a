//! Per-iteration trace capture
//!
//! The orchestrator invokes the trace sink at a fixed point of every
//! iteration for every knot, unconditionally compiled; the sink decides
//! whether the data is kept. `NullTrace` reports itself disabled so the
//! caller can skip the forward-kinematics work feeding it.

use nalgebra::Vector3;

/// Structured per-knot trace record sink
pub trait TraceSink {
    /// Whether records will be retained; callers may skip preparing
    /// record inputs when this is false
    fn enabled(&self) -> bool {
        true
    }

    /// Record the Cartesian position and contact-force state of one knot
    /// at one outer iteration (iteration 0 is the seed trajectory)
    fn record(&mut self, iteration: usize, knot: usize, position: &Vector3<f64>, force: &Vector3<f64>);
}

/// Discards every record
#[derive(Debug, Clone, Default)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn enabled(&self) -> bool {
        false
    }

    fn record(&mut self, _: usize, _: usize, _: &Vector3<f64>, _: &Vector3<f64>) {}
}

/// In-memory trace tensor, indexed [knot, feature, iteration]
///
/// Features 0-2 are the Cartesian position, 3-5 the contact-force state,
/// matching the layout of the original debug tensor dump.
#[derive(Debug, Clone)]
pub struct MemoryTrace {
    knots: usize,
    iterations: usize,
    data: Vec<f64>,
}

impl MemoryTrace {
    /// `knots` = N+1, `iterations` = iteration budget + 1 (seed included)
    pub fn new(knots: usize, iterations: usize) -> Self {
        Self { knots, iterations, data: vec![0.0; knots * 6 * iterations] }
    }

    pub fn get(&self, knot: usize, feature: usize, iteration: usize) -> f64 {
        self.data[self.index(knot, feature, iteration)]
    }

    fn index(&self, knot: usize, feature: usize, iteration: usize) -> usize {
        debug_assert!(knot < self.knots && feature < 6 && iteration < self.iterations);
        (knot * 6 + feature) * self.iterations + iteration
    }
}

impl TraceSink for MemoryTrace {
    fn record(&mut self, iteration: usize, knot: usize, position: &Vector3<f64>, force: &Vector3<f64>) {
        if iteration >= self.iterations || knot >= self.knots {
            return;
        }
        for i in 0..3 {
            let p = self.index(knot, i, iteration);
            self.data[p] = position[i];
            let f = self.index(knot, i + 3, iteration);
            self.data[f] = force[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_trace_disabled() {
        assert!(!NullTrace.enabled());
    }

    #[test]
    fn test_memory_trace_layout() {
        let mut trace = MemoryTrace::new(3, 2);
        assert!(trace.enabled());

        trace.record(1, 2, &Vector3::new(0.1, 0.2, 0.3), &Vector3::new(9.0, 8.0, 7.0));
        assert_eq!(trace.get(2, 0, 1), 0.1);
        assert_eq!(trace.get(2, 2, 1), 0.3);
        assert_eq!(trace.get(2, 3, 1), 9.0);
        assert_eq!(trace.get(2, 5, 1), 7.0);
        // Untouched cells stay zero
        assert_eq!(trace.get(0, 0, 0), 0.0);
    }

    #[test]
    fn test_out_of_range_record_ignored() {
        let mut trace = MemoryTrace::new(2, 1);
        trace.record(5, 0, &Vector3::zeros(), &Vector3::zeros());
        trace.record(0, 5, &Vector3::zeros(), &Vector3::zeros());
    }
}
