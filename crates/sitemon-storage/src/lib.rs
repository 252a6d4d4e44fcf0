//! SQLite-backed persistence for the monitoring engine.
//!
//! A single [`Store`] owns the target registry, the per-URL certificate
//! table, and the live/backup incident logs. It is constructed once at
//! process start and injected into every component; there are no implicit
//! singletons. Retention (the 30-day live window) is enforced on every
//! incident write, not only on a timer.

pub mod archive;
pub mod error;
mod store;


pub use archive::ArchiveBundle;
pub use error::{Result, StorageError};
pub use store::{IncidentQuery, Store};
