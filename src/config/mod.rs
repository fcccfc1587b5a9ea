//! Configuration and constants
//!
//! - [`defaults`] - Default values used when the project file is silent
//! - [`urls`] - Remote locations modules are fetched from

pub mod defaults;
pub mod urls;
