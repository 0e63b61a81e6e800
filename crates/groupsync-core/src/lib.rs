//! groupsync core library.
//!
//! Keeps the groups of a merged parent course in line with enrollment:
//! one group per merged course, and every student in the group of the
//! course they are enrolled in.
//!
//! - `api`: the `Directory` seam and its HTTP client
//! - `auth`: OAuth access tokens
//! - `config`: host, credentials and limits
//! - `models`: courses, groups and rosters
//! - `sync`: the reconciliation engine

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod sync;

pub use api::{ApiClient, ApiError, Directory};
pub use config::Config;
pub use sync::{MatchPolicy, Reconciler, SyncError, SyncOptions, SyncReport};
