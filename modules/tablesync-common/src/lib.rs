//! Shared vocabulary for the table synchronization pipeline.
//!
//! Events flow between rules; versions address table snapshots; tables are
//! the unit of commit. Nothing in here performs I/O.

pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use config::EngineConfig;
pub use error::SyncError;
pub use event::{Event, EventData, Origin, QualifiedId};
pub use types::{Aggregate, Row, Table, Version};
