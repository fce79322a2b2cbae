//! Shared configuration for the roomsync CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to [`roomsync_core::ClientConfig`]. The CLI layers its
//! `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use roomsync_core::ClientConfig;

const KEYRING_SERVICE: &str = "roomsync";
const ENV_PREFIX: &str = "ROOMSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: the explicit one, else the configured
    /// default, else `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Extra attempts for network failures.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_retries() -> u32 {
    3
}

/// A named marketplace backend.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// API root, e.g. "http://127.0.0.1:8000/api/v1/".
    pub base_url: String,

    /// Login email.
    pub email: Option<String>,

    /// Password (plaintext, prefer keyring or `ROOMSYNC_PASSWORD`).
    pub password: Option<String>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Override retries.
    pub retries: Option<u32>,

    /// Seconds a fetched resource stays fresh. Unset: until invalidated.
    pub stale_time: Option<u64>,

    /// Booking window in months.
    pub booking_horizon_months: Option<u32>,

    /// Public prefix for uploaded images.
    pub image_delivery_prefix: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "roomsync", "roomsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("roomsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file yields the
/// defaults. Nested env keys use a double underscore, e.g.
/// `ROOMSYNC_DEFAULTS__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve login credentials without CLI flags.
///
/// Email: profile, then `ROOMSYNC_EMAIL`. Password: `ROOMSYNC_PASSWORD`,
/// then the system keyring (`roomsync` / `{profile}/password`), then the
/// plaintext profile field.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let email = profile
        .email
        .clone()
        .or_else(|| std::env::var(format!("{ENV_PREFIX}EMAIL")).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    let password = first_password(
        std::env::var(format!("{ENV_PREFIX}PASSWORD")).ok(),
        || keyring_password(profile_name),
        profile.password.as_deref(),
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })?;

    Ok((email, password))
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

fn keyring_password(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .and_then(|entry| entry.get_password())
        .ok()
}

/// Env beats keyring beats plaintext. The keyring is only consulted when
/// the env var is unset.
fn first_password(
    env: Option<String>,
    keyring: impl FnOnce() -> Option<String>,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    env.or_else(keyring)
        .or_else(|| plaintext.map(str::to_owned))
        .map(SecretString::from)
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ClientConfig` from a profile and the global defaults.
pub fn profile_to_client_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let mut base_url: url::Url = profile
        .base_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {}", profile.base_url),
        })?;
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }

    let mut config = ClientConfig::new(base_url);
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.retries = profile.retries.unwrap_or(defaults.retries);
    config.stale_time = profile.stale_time.map(Duration::from_secs);

    if let Some(months) = profile.booking_horizon_months {
        if months == 0 {
            return Err(ConfigError::Validation {
                field: "booking_horizon_months".into(),
                reason: "must be at least 1".into(),
            });
        }
        config.booking_horizon_months = months;
    }
    if let Some(ref prefix) = profile.image_delivery_prefix {
        config.image_delivery_prefix.clone_from(prefix);
    }

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_profiles_from_toml() {
        let (_dir, path) = write_config(
            r#"
default_profile = "local"

[defaults]
output = "json"

[profiles.local]
base_url = "http://127.0.0.1:8000/api/v1/"
email = "hana@example.com"
stale_time = 60
"#,
        );

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.active_profile_name(None), "local");
        assert_eq!(cfg.active_profile_name(Some("prod")), "prod");
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.timeout, 30);

        let profile = cfg.profile("local").unwrap();
        assert_eq!(profile.email.as_deref(), Some("hana@example.com"));
        assert!(matches!(
            cfg.profile("prod"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "default".into(),
            Profile {
                base_url: "http://localhost:8000/api/v1/".into(),
                retries: Some(1),
                ..Profile::default()
            },
        );

        save_config_to(&path, &cfg).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile("default").unwrap().retries, Some(1));
    }

    #[test]
    fn profile_translates_to_client_config() {
        let profile = Profile {
            base_url: "http://localhost:8000/api/v1".into(),
            timeout: Some(5),
            stale_time: Some(60),
            booking_horizon_months: Some(3),
            ..Profile::default()
        };

        let config = profile_to_client_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/api/v1/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retries, 3);
        assert_eq!(config.stale_time, Some(Duration::from_secs(60)));
        assert_eq!(config.booking_horizon_months, 3);
    }

    #[test]
    fn invalid_profile_values_are_rejected() {
        let bad_url = Profile {
            base_url: "not a url".into(),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_client_config(&bad_url, &Defaults::default()),
            Err(ConfigError::Validation { ref field, .. }) if field == "base_url"
        ));

        let zero_horizon = Profile {
            base_url: "http://localhost:8000/api/v1/".into(),
            booking_horizon_months: Some(0),
            ..Profile::default()
        };
        assert!(profile_to_client_config(&zero_horizon, &Defaults::default()).is_err());
    }

    #[test]
    fn password_chain_prefers_env_then_keyring_then_plaintext() {
        let pick = |env: Option<&str>, keyring: Option<&str>, plain: Option<&str>| {
            first_password(env.map(str::to_owned), || keyring.map(str::to_owned), plain)
                .map(|s| s.expose_secret().to_owned())
        };

        assert_eq!(pick(Some("env"), Some("ring"), Some("plain")).as_deref(), Some("env"));
        assert_eq!(pick(None, Some("ring"), Some("plain")).as_deref(), Some("ring"));
        assert_eq!(pick(None, None, Some("plain")).as_deref(), Some("plain"));
        assert_eq!(pick(None, None, None), None);
    }
}
