//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use roomsync_config::ConfigError;
use roomsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the marketplace backend")]
    #[diagnostic(
        code(roomsync::connection_failed),
        help(
            "Check that the backend is running and the base URL is right.\n\
             Detail: {message}"
        )
    )]
    ConnectionFailed { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Not authorized (HTTP {status}): {message}")]
    #[diagnostic(
        code(roomsync::auth_failed),
        help(
            "Sign in first: roomsync login\n\
             Or store a password with: roomsync config set-password"
        )
    )]
    AuthFailed { status: u16, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(roomsync::no_credentials),
        help(
            "Set `email` in the profile and run: roomsync config set-password\n\
             Or set ROOMSYNC_EMAIL and ROOMSYNC_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Bookings ─────────────────────────────────────────────────────

    #[error("Room {room} is not available from {check_in} to {check_out}")]
    #[diagnostic(
        code(roomsync::unavailable),
        help("Try other dates: roomsync availability {room} <check-in> <check-out>")
    )]
    Unavailable {
        room: u64,
        check_in: String,
        check_out: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Request rejected (HTTP {status}): {message}")]
    #[diagnostic(code(roomsync::rejected))]
    Rejected { status: u16, message: String },

    #[error("Server error: {message}")]
    #[diagnostic(code(roomsync::server_error))]
    Server { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(roomsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(roomsync::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend configured")]
    #[diagnostic(
        code(roomsync::no_config),
        help(
            "Pass --base-url or add a profile to the config file.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(roomsync::config))]
    Config(#[from] ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(roomsync::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Rejected { status: 404, .. } => exit_code::NOT_FOUND,
            Self::Unavailable { .. } | Self::Rejected { status: 409, .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Network { message } => CliError::ConnectionFailed { message },
            CoreError::Auth { status, message } => CliError::AuthFailed { status, message },
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Rejected { status, message } => CliError::Rejected { status, message },
            CoreError::Server { message, .. } => CliError::Server { message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let not_found = CliError::from(CoreError::Rejected {
            status: 404,
            message: "Not found.".into(),
        });
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);

        let signed_out = CliError::from(CoreError::Auth {
            status: 403,
            message: "CSRF Failed".into(),
        });
        assert_eq!(signed_out.exit_code(), exit_code::AUTH);

        let offline = CliError::from(CoreError::Network {
            message: "connection refused".into(),
        });
        assert_eq!(offline.exit_code(), exit_code::CONNECTION);
    }
}
