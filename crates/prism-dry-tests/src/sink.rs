// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recording telemetry sink.

use std::sync::Mutex;

use prism_core::TelemetrySink;

/// One recorded telemetry event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// Progress report.
    Progress(u8),
    /// A pass completed.
    PassCompleted(String),
    /// A loop converged after the given rounds.
    LoopConverged(u32),
    /// A loop diverged after the given rounds, naming the changing passes.
    LoopDiverged(u32, Vec<String>),
}

/// Sink that appends every event to an internal list.
#[derive(Debug, Default)]
pub struct RecordingTelemetrySink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetrySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded event, in order.
    #[must_use]
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Just the progress percentages, in order.
    #[must_use]
    pub fn progress_values(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl TelemetrySink for RecordingTelemetrySink {
    fn progress(&self, percent: u8) {
        self.push(TelemetryEvent::Progress(percent));
    }

    fn pass_completed(&self, name: &str) {
        self.push(TelemetryEvent::PassCompleted(name.to_string()));
    }

    fn loop_converged(&self, rounds: u32) {
        self.push(TelemetryEvent::LoopConverged(rounds));
    }

    fn loop_diverged(&self, rounds: u32, passes: &[&'static str]) {
        self.push(TelemetryEvent::LoopDiverged(
            rounds,
            passes.iter().map(|p| (*p).to_string()).collect(),
        ));
    }
}
