//! RELAY Supervisor - Local Worker Daemon
//!
//! A supervisor owns one agent identity (e.g. `frontend`) and executes at
//! most one long-running subprocess at a time in the operator's
//! repository. Tasks arrive on `agent:<name>`; the command payload is
//! materialized to a scratch file, the external tool is spawned with the
//! repository as working directory, both output streams are published as
//! `progress` envelopes, and the exit is reported as a terminal
//! `response` envelope back to the requester's channel.

pub mod config;
pub mod runner;
pub mod startup;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use runner::{OutputLine, OutputSource, TaskExecution};
pub use supervisor::Supervisor;
