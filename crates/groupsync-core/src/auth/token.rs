use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Renew this many seconds ahead of the reported expiry.
const TOKEN_REFRESH_BUFFER_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Build a token from an `expires_in` value in seconds.
    pub fn new(token: String, expires_in_secs: i64) -> Self {
        Self {
            token,
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if the token will expire soon and should be renewed
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at - Duration::seconds(TOKEN_REFRESH_BUFFER_SECS)
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}
