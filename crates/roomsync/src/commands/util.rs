//! Shared helpers for command handlers.

use std::path::Path;

use roomsync_config::Config;
use roomsync_core::{Command as CoreCommand, Marketplace, Session};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// Log in with configured credentials, if any. Returns whether a login
/// was attempted.
pub async fn sign_in(
    marketplace: &Marketplace,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<bool, CliError> {
    let Some((email, password)) = config::resolve_credentials(global, cfg)? else {
        return Ok(false);
    };
    tracing::debug!(email, "signing in with configured credentials");
    marketplace
        .execute(CoreCommand::Login { email, password })
        .await?;
    Ok(true)
}

/// Sign in and confirm the backend sees a session.
pub async fn require_session(
    marketplace: &Marketplace,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<Session, CliError> {
    let attempted = sign_in(marketplace, cfg, global).await?;
    let session = marketplace.resolve_session().await;
    if session.is_logged_in {
        return Ok(session);
    }
    if attempted {
        Err(CliError::AuthFailed {
            status: 401,
            message: "the backend did not accept the session".into(),
        })
    } else {
        Err(CliError::NoCredentials {
            profile: config::active_profile_name(global, cfg),
        })
    }
}

/// Read a JSON file into a typed payload.
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Text for an optional value in detail views.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}
