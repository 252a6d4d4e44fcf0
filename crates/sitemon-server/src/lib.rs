//! The sitemon server: periodic reachability probing and certificate
//! inspection over a registry of monitored URLs, with incident history
//! retention and monthly archival.

pub mod config;
pub mod engine;
pub mod probe;
pub mod sched;
