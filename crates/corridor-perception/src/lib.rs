//! `corridor-perception` – Echo Filtering
//!
//! Turns raw, noisy echo widths into readings the navigator can act on.
//!
//! # Modules
//!
//! - [`filter`] – the [`ReadingFilter`][filter::ReadingFilter] trait and the
//!   configurable [`FilterKind`][filter::FilterKind].
//! - [`history`] – [`HistoryFilter`][history::HistoryFilter]: three-sample
//!   voting filter that rejects single-sample spikes.
//! - [`spike_gate`] – [`SpikeGate`][spike_gate::SpikeGate]: the older
//!   jump-window filter, kept selectable.
//! - [`distance`] – tick to inch/centimetre conversion for log output.

pub mod distance;
pub mod filter;
pub mod history;
pub mod spike_gate;

pub use distance::{inches_to_ticks, ticks_to_centimeters, ticks_to_inches};
pub use filter::{FilterKind, ReadingFilter};
pub use history::{HistoryFilter, vote};
pub use spike_gate::SpikeGate;
