//! `aircraft-registry` - A reviewed, versioned snapshot of the civil aircraft register
//!
//! This library fetches the national aircraft register, normalizes it into a
//! compact JSON snapshot, and publishes that snapshot only after a human
//! reviewer has approved the change. Every publication carries a semantic
//! version and leaves a backup of the document it replaced.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod registry;
pub mod release;
pub mod storage;
pub mod sync;
pub mod version;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use registry::{AircraftRecord, RegistrySnapshot};
pub use release::{ReleaseManager, Stage};
pub use version::{Severity, Version};
