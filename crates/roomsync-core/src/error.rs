// ── Core error types ──
//
// The cache-level error taxonomy. Entries store these, so the type is
// `Clone`; consumers never see reqwest errors or raw JSON failures. The
// `From<roomsync_api::Error>` impl decides which bucket a transport-layer
// failure lands in.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Transport failure or timeout. The only kind worth retrying.
    #[error("Network error: {message}")]
    Network { message: String },

    /// 401/403: the visitor is signed out or lacks permission.
    #[error("Not authorized (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// Rejected client-side before any request was made.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Any other 4xx, e.g. a booking refused for overlapping dates.
    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// 5xx or a payload that could not be decoded.
    #[error("Server error: {message}")]
    Server {
        message: String,
        status: Option<u16>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns `true` for signed-out / forbidden responses.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Returns `true` if a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<roomsync_api::Error> for CoreError {
    fn from(err: roomsync_api::Error) -> Self {
        match err {
            roomsync_api::Error::Authentication { status, message } => {
                CoreError::Auth { status, message }
            }
            roomsync_api::Error::Transport(ref e) => {
                if let Some(status) = e.status() {
                    classify_status(status.as_u16(), e.to_string())
                } else {
                    CoreError::Network {
                        message: e.to_string(),
                    }
                }
            }
            roomsync_api::Error::Api { status, message } => classify_status(status, message),
            roomsync_api::Error::Deserialization { message, body: _ } => CoreError::Server {
                message: format!("Malformed response: {message}"),
                status: None,
            },
            roomsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            roomsync_api::Error::ClientBuild(message) => CoreError::Config { message },
        }
    }
}

fn classify_status(status: u16, message: String) -> CoreError {
    match status {
        401 | 403 => CoreError::Auth { status, message },
        400..=499 => CoreError::Rejected { status, message },
        _ => CoreError::Server {
            message,
            status: Some(status),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_auth() {
        let err: CoreError = roomsync_api::Error::Authentication {
            status: 401,
            message: "no session".into(),
        }
        .into();
        assert!(err.is_auth());
        assert!(!err.is_transient());
    }

    #[test]
    fn client_errors_are_rejections() {
        let err: CoreError = roomsync_api::Error::Api {
            status: 400,
            message: "dates taken".into(),
        }
        .into();
        assert_eq!(
            err,
            CoreError::Rejected {
                status: 400,
                message: "dates taken".into()
            }
        );
    }

    #[test]
    fn gateway_errors_are_server_errors() {
        let err: CoreError = roomsync_api::Error::Api {
            status: 503,
            message: String::new(),
        }
        .into();
        assert!(matches!(err, CoreError::Server { status: Some(503), .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn malformed_payload_is_server_error() {
        let err: CoreError = roomsync_api::Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Server { status: None, .. }));
        assert!(!err.is_transient());
    }
}
