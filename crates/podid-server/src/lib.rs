//! podid server composition: command-line configuration and the
//! background cleanup sweeper.

pub mod config;
pub mod sweeper;

pub use config::ServerArgs;
pub use sweeper::{SweepReport, run_sweeper, spawn_sweeper, sweep_once};
