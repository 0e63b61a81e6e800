//! Authentication for the directory REST API.
//!
//! The directory issues bearer tokens through the OAuth2 client-credentials
//! grant. `AccessToken` tracks when a token expires so the client can renew
//! it before a request instead of failing mid-run.

pub mod token;

pub use token::AccessToken;
