//! `corridor-runtime` – Wall-Following Control
//!
//! The foreground side of the robot: it decides, once per iteration, whether
//! to follow the wall, stop and back up, or swerve, and turns that decision
//! into motor commands.
//!
//! # Modules
//!
//! - [`ranger`] – [`Ranger`][ranger::Ranger]: a ranging sequencer whose raw
//!   echo widths are forwarded through a reading filter.
//! - [`correction`] – [`CorrectionController`][correction::CorrectionController]:
//!   ordered table of side-distance bands mapped to motor speed pairs.
//! - [`navigation`] – [`Navigator`][navigation::Navigator]: the
//!   Forward / StopRecover / Dodge / Turn state machine and its
//!   [`NavigationPolicy`][navigation::NavigationPolicy].
//! - [`recovery_guard`] – [`RecoveryGuard`][recovery_guard::RecoveryGuard]:
//!   optional bound on the otherwise unbounded recovery loops.
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: startup
//!   sequence and the round-robin main loop.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber setup.

pub mod control_loop;
pub mod correction;
pub mod navigation;
pub mod ranger;
pub mod recovery_guard;
pub mod telemetry;

pub use control_loop::{ControlLoop, ControlLoopConfig};
pub use correction::{CorrectionBand, CorrectionController, CorrectionTable, DEFAULT_BANDS};
pub use navigation::{AvoidanceStrategy, DodgeExit, NavigationPolicy, Navigator, decide};
pub use ranger::Ranger;
pub use recovery_guard::RecoveryGuard;
pub use telemetry::init_tracing;
