//! Daemon wiring and run loop

pub mod options;
pub mod run;
pub mod state;
