//! Directory client module for the course platform REST API.
//!
//! `Directory` is the seam the reconciliation engine talks through;
//! `ApiClient` implements it over HTTP against the Learn REST endpoints.
//!
//! The API uses OAuth2 bearer tokens obtained with the client-credentials
//! grant, renewed before any call that would otherwise use an expiring token.

pub mod client;
pub mod directory;
pub mod error;

pub use client::ApiClient;
pub use directory::Directory;
pub use error::ApiError;
