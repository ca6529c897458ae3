//! SurfaceMap Session - orchestration of one scan
//!
//! This crate provides:
//! - `JobMonitor`: bounded, cancellable polling of engine jobs
//! - Alert aggregation into attack-surface records
//! - `ScanSession`: the phase state machine persisting each phase's results

pub mod aggregate;
pub mod monitor;
pub mod session;

#[cfg(test)]
mod testing;

pub use aggregate::{aggregate, to_attack_surface};
pub use monitor::{Clock, JobMonitor, ManualClock, PollPolicy, TokioClock};
pub use session::{Phase, PhaseOutcome, PhaseRecord, ScanSession, SessionReport, SessionState};
