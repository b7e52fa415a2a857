//! The [`ReadingFilter`] seam between raw echo widths and the navigator.

use corridor_types::{CorridorError, SensorId, Ticks};
use serde::{Deserialize, Serialize};

use crate::history::HistoryFilter;
use crate::spike_gate::SpikeGate;

/// Turns a stream of raw echo widths into one filtered reading per sensor.
pub trait ReadingFilter: Send {
    /// Feed one raw sample for `sensor` and return the new filtered reading.
    fn record(&mut self, sensor: SensorId, raw: Ticks) -> Result<Ticks, CorridorError>;

    /// Most recent filtered reading, or `None` for an unknown sensor.
    fn reading(&self, sensor: SensorId) -> Option<Ticks>;

    /// Forget every sample and reading.
    fn reset(&mut self);
}

/// Filter selection as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Three-sample history vote.
    #[default]
    Vote,
    /// Single-sample jump rejection of the first firmware revision.
    SpikeGate,
}

impl FilterKind {
    pub fn build(self) -> Box<dyn ReadingFilter> {
        match self {
            FilterKind::Vote => Box::new(HistoryFilter::new()),
            FilterKind::SpikeGate => Box::new(SpikeGate::default()),
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterKind::Vote => write!(f, "vote"),
            FilterKind::SpikeGate => write!(f, "spike_gate"),
        }
    }
}
