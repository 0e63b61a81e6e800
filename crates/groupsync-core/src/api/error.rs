use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - check the application key and secret")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Rate limited by the directory")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("More than {limit} records returned; paging is not supported")]
    ResultLimitExceeded { limit: u32 },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid directory URL: {0}")]
    InvalidUrl(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            409 => ApiError::AlreadyExists(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            code => ApiError::UnexpectedStatus {
                status: code,
                body: truncated,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// The call failed because its effect is already in place.
    pub fn is_already_satisfied(&self) -> bool {
        matches!(self, ApiError::AlreadyExists(_))
    }

    /// HTTP status behind the error, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::AlreadyExists(_) => Some(409),
            ApiError::RateLimited => Some(429),
            ApiError::UnexpectedStatus { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            ApiError::ServerError(_)
            | ApiError::ResultLimitExceeded { .. }
            | ApiError::InvalidResponse(_)
            | ApiError::InvalidUrl(_) => None,
        }
    }
}
