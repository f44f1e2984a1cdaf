//! API error types.

use thiserror::Error;

/// Kahla response codes the client reacts to.
///
/// Every response body carries an integer `code`; `0` is success and the
/// negative values below are the failures the server reports.
pub mod code {
    /// Request succeeded.
    pub const SUCCESS: i64 = 0;
    /// Wrong credentials or key.
    pub const WRONG_KEY: i64 = -1;
    /// Operation is pending on the server.
    pub const PENDING: i64 = -2;
    /// Resource does not exist.
    pub const NOT_FOUND: i64 = -4;
    /// Unclassified server failure.
    pub const UNKNOWN_ERROR: i64 = -5;
    /// Server is out of capacity.
    pub const NOT_ENOUGH_RESOURCES: i64 = -7;
    /// Session cookie missing or expired.
    pub const UNAUTHORIZED: i64 = -8;
    /// Request parameters rejected.
    pub const INVALID_INPUT: i64 = -10;
    /// Server-side timeout.
    pub const TIMEOUT: i64 = -11;
}

/// Errors from a Kahla REST call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure: DNS, TLS, connection reset, request timeout.
    #[error("{tag}: request failed: {source}")]
    Http {
        /// Call that failed.
        tag: &'static str,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-200 status.
    #[error("{tag}: response status code not 200: {status}")]
    Status {
        /// Call that failed.
        tag: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// The body is not the JSON shape the call expects.
    #[error("{tag}: invalid response body: {source}")]
    Json {
        /// Call that failed.
        tag: &'static str,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The server rejected the request with a non-zero `code`.
    #[error("kahla response code not 0. {tag}. {message} ({code})")]
    Application {
        /// Call that failed.
        tag: &'static str,
        /// Kahla response code.
        code: i64,
        /// Server-provided message.
        message: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    /// Whether repeating the same request could succeed.
    ///
    /// Transport failures, server-side statuses and transient Kahla codes are
    /// retryable; rejected input and credentials are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Status { status, .. } => *status >= 500 || matches!(status, 408 | 429),
            Self::Json { .. } | Self::Client(_) => false,
            Self::Application { code: c, .. } => matches!(
                *c,
                code::PENDING | code::UNKNOWN_ERROR | code::NOT_ENOUGH_RESOURCES | code::TIMEOUT
            ),
        }
    }

    /// Whether the server no longer accepts the session cookie.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Application { code: code::UNAUTHORIZED, .. } | Self::Status { status: 401, .. }
        )
    }
}

/// Result type for API calls.
pub type Result<T> = std::result::Result<T, ApiError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn app(code: i64) -> ApiError {
        ApiError::Application {
            tag: "login",
            code,
            message: "Wrong password".to_string(),
        }
    }

    #[test]
    fn application_display() {
        assert_eq!(
            app(code::WRONG_KEY).to_string(),
            "kahla response code not 0. login. Wrong password (-1)"
        );
    }

    #[test]
    fn status_display() {
        let err = ApiError::Status {
            tag: "init_pusher",
            status: 502,
        };
        assert_eq!(
            err.to_string(),
            "init_pusher: response status code not 200: 502"
        );
    }

    #[test]
    fn retryable_classification() {
        assert!(!app(code::WRONG_KEY).is_retryable());
        assert!(!app(code::INVALID_INPUT).is_retryable());
        assert!(!app(code::UNAUTHORIZED).is_retryable());
        assert!(app(code::UNKNOWN_ERROR).is_retryable());
        assert!(app(code::TIMEOUT).is_retryable());

        let status = |status| ApiError::Status { tag: "t", status };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(401).is_retryable());
    }

    #[test]
    fn unauthorized_detection() {
        assert!(app(code::UNAUTHORIZED).is_unauthorized());
        assert!(ApiError::Status { tag: "t", status: 401 }.is_unauthorized());
        assert!(!app(code::WRONG_KEY).is_unauthorized());
    }
}
