//! CLI-side configuration: applies `GlobalOpts` overrides on top of the
//! shared `roomsync-config` profiles.

use std::time::Duration;

use secrecy::SecretString;

use roomsync_config::{Config, ConfigError};
use roomsync_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use roomsync_config::{config_path, load_config_or_default, save_config, store_password};

/// Profile selected by `--profile` or the config's default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    cfg.active_profile_name(global.profile.as_deref())
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
pub fn build_client_config(global: &GlobalOpts, cfg: &Config) -> Result<ClientConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let mut client = match cfg.profiles.get(&profile_name) {
        Some(profile) => roomsync_config::profile_to_client_config(profile, &cfg.defaults)?,
        None => {
            // An explicitly named profile must exist.
            if global.profile.is_some() {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: available_profiles(cfg),
                });
            }
            let url_str = global.base_url.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            let mut client = ClientConfig::new(parse_base_url(url_str)?);
            client.timeout = Duration::from_secs(cfg.defaults.timeout);
            client.retries = cfg.defaults.retries;
            client
        }
    };

    if let Some(ref url_str) = global.base_url {
        client.base_url = parse_base_url(url_str)?;
    }
    if let Some(secs) = global.timeout {
        client.timeout = Duration::from_secs(secs);
    }
    Ok(client)
}

/// Resolve login credentials: `--email` / profile / env for the email,
/// then the shared password chain. `Ok(None)` when nothing is configured.
pub fn resolve_credentials(
    global: &GlobalOpts,
    cfg: &Config,
) -> Result<Option<(String, SecretString)>, CliError> {
    let profile_name = active_profile_name(global, cfg);
    let mut profile = cfg
        .profiles
        .get(&profile_name)
        .map(clone_login_fields)
        .unwrap_or_default();
    if let Some(ref email) = global.email {
        profile.email = Some(email.clone());
    }

    match roomsync_config::resolve_credentials(&profile, &profile_name) {
        Ok(creds) => Ok(Some(creds)),
        Err(ConfigError::NoCredentials { .. }) => Ok(None),
        Err(other) => Err(other.into()),
    }
}

fn clone_login_fields(profile: &roomsync_config::Profile) -> roomsync_config::Profile {
    roomsync_config::Profile {
        base_url: profile.base_url.clone(),
        email: profile.email.clone(),
        password: profile.password.clone(),
        ..roomsync_config::Profile::default()
    }
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

fn parse_base_url(url_str: &str) -> Result<url::Url, CliError> {
    let mut url: url::Url = url_str.parse().map_err(|_| CliError::Validation {
        field: "base-url".into(),
        reason: format!("invalid URL: {url_str}"),
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
