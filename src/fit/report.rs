//! Collaborators that receive fit output: the results log and the plot.

use serde::{Deserialize, Serialize};

use crate::data::GeneratedCurve;

/// An append-only text sink for result blocks.
pub trait ResultsLog {
    /// Append one block of text.
    fn append_block(&mut self, block: &str);
}

impl ResultsLog for String {
    fn append_block(&mut self, block: &str) {
        self.push_str(block);
        if !block.ends_with('\n') {
            self.push('\n');
        }
    }
}

impl ResultsLog for Vec<String> {
    fn append_block(&mut self, block: &str) {
        self.push(block.to_string());
    }
}

/// Opaque identifier of a curve handed to a [`PlotSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlotHandle(u64);

impl PlotHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Receives generated curves for display.
pub trait PlotSink {
    fn add_curve(&mut self, curve: &GeneratedCurve, name: &str) -> PlotHandle;
}

/// A [`PlotSink`] that keeps every curve it receives.
#[derive(Debug, Clone, Default)]
pub struct CurveCollector {
    curves: Vec<(String, GeneratedCurve)>,
}

impl CurveCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn curves(&self) -> &[(String, GeneratedCurve)] {
        &self.curves
    }

    pub fn get(&self, handle: PlotHandle) -> Option<&GeneratedCurve> {
        self.curves.get(handle.id() as usize).map(|(_, curve)| curve)
    }
}

impl PlotSink for CurveCollector {
    fn add_curve(&mut self, curve: &GeneratedCurve, name: &str) -> PlotHandle {
        self.curves.push((name.to_string(), curve.clone()));
        PlotHandle::new(self.curves.len() as u64 - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_log_separates_blocks() {
        let mut log = String::new();
        log.append_block("first");
        log.append_block("second\n");
        assert_eq!(log, "first\nsecond\n");

        let mut blocks: Vec<String> = Vec::new();
        blocks.append_block("one");
        assert_eq!(blocks, vec!["one"]);
    }

    #[test]
    fn test_collector_handles() {
        let curve = GeneratedCurve::new("c", vec![0.0, 1.0], vec![1.0, 2.0]).unwrap();
        let mut sink = CurveCollector::new();
        let a = sink.add_curve(&curve, "a");
        let b = sink.add_curve(&curve, "b");
        assert_ne!(a, b);
        assert_eq!(sink.get(b), Some(&curve));
        assert_eq!(sink.curves()[0].0, "a");
    }
}
