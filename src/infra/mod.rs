//! Infrastructure layer
//!
//! Handles all I/O operations: filesystem, external processes and the
//! container runtime. This module is the only place where side effects occur.

pub mod container;
pub mod dirs;
pub mod filesystem;
pub mod process;
