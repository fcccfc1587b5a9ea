//! iocbuild - EPICS IOC build orchestrator
//!
//! Builds EPICS IOC applications in two steps: the modules named in a
//! target's `configure/RELEASE` are fetched into a shared cache by an
//! external preparation tool, then the target is built with `make` against
//! that cache. Tool exit codes are forwarded unchanged.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Dependency discovery, cache layout and orchestration
//! - [`infra`] - Infrastructure layer (filesystem, processes, containers)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
