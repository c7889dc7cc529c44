//! `footprint` - Carbon-footprint aggregation and report snapshot storage
//!
//! This library provides the emissions aggregation engine used by the
//! reporting dashboard, the report state reducer, and the tag-keyed JSON
//! store (with its HTTP interface) that saves and restores report snapshots.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod logging;
pub mod report;
pub mod server;
pub mod store;

pub use aggregate::Dashboard;
pub use config::Config;
pub use entry::{EmissionEntry, EntryField, Unit};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use report::{Command, ReportState, Scope};
pub use store::{DemoSeed, TagStore};
