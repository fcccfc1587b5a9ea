//! Core business logic module
//!
//! Everything that decides what the external tools are asked to do. Process
//! execution and filesystem helpers live in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`project`] - Project configuration (iocbuild.toml) and targets
//! - [`target`] - Build target paths
//! - [`version`] - Module path recognition
//! - [`release`] - RELEASE file reading
//! - [`dependency`] - Dependency discovery and build ordering
//! - [`settings`] - Set files, RELEASE.local, RELEASE_SITE and patching
//! - [`cache`] - Dependency cache layout
//! - [`build_env`] - Build environment setup
//! - [`orchestrator`] - Prepare, build and run
//! - [`doctor`] - Installed tool checks

pub mod build_env;
pub mod cache;
pub mod dependency;
pub mod doctor;
pub mod orchestrator;
pub mod project;
pub mod release;
pub mod settings;
pub mod target;
pub mod version;
