//! Session handlers: whoami, login, logout, OAuth.

use secrecy::{ExposeSecret, SecretString};

use roomsync_config::Config;
use roomsync_core::{Command as CoreCommand, CommandResult, Marketplace, Session, User};

use crate::cli::{GlobalOpts, LoginArgs, OAuthArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

fn session_detail(session: &Session) -> String {
    match session.user {
        Some(ref user) if session.is_logged_in => output::detail_lines(&[
            ("User", user.display_name().to_owned()),
            ("Username", user.username.clone()),
            ("Email", util::or_dash(user.email.as_deref())),
            ("Host", user.is_host.to_string()),
        ]),
        _ => "Not signed in".into(),
    }
}

fn session_id(session: &Session) -> String {
    session
        .user
        .as_ref()
        .filter(|_| session.is_logged_in)
        .map(|u| u.username.clone())
        .unwrap_or_default()
}

fn print_signed_in(user: Option<&User>, global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    match user {
        Some(user) => eprintln!("Signed in as {}", user.display_name()),
        None => eprintln!("Signed in"),
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn whoami(
    marketplace: &Marketplace,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::sign_in(marketplace, cfg, global).await?;
    let session = marketplace.resolve_session().await;
    let out = output::render_single(&global.output, &session, session_detail, session_id);
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn login(
    marketplace: &Marketplace,
    args: LoginArgs,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let profile_name = config::active_profile_name(global, cfg);
    let (email, password) = match config::resolve_credentials(global, cfg)? {
        Some(creds) => creds,
        None => {
            let email = global
                .email
                .clone()
                .or_else(|| cfg.profiles.get(&profile_name).and_then(|p| p.email.clone()))
                .ok_or_else(|| CliError::NoCredentials {
                    profile: profile_name.clone(),
                })?;
            let password = rpassword::prompt_password(format!("Password for {email}: "))?;
            (email, SecretString::from(password))
        }
    };

    let result = marketplace
        .execute(CoreCommand::Login {
            email,
            password: password.clone(),
        })
        .await?;

    if args.remember {
        config::store_password(&profile_name, password.expose_secret())?;
        if !global.quiet {
            eprintln!("Password stored in system keyring for profile '{profile_name}'");
        }
    }

    let user = match result {
        CommandResult::LoggedIn(user) => user,
        _ => None,
    };
    print_signed_in(user.as_ref(), global);
    Ok(())
}

pub async fn logout(
    marketplace: &Marketplace,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_session(marketplace, cfg, global).await?;
    marketplace.execute(CoreCommand::Logout).await?;
    let session = marketplace.resolve_session().await;
    if !global.quiet {
        if session.is_logged_in {
            eprintln!("Logout requested, but the backend still reports a session");
        } else {
            eprintln!("Signed out");
        }
    }
    Ok(())
}

pub async fn oauth(
    marketplace: &Marketplace,
    args: OAuthArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = marketplace
        .execute(CoreCommand::OAuthLogin {
            provider: args.provider,
            code: args.code,
        })
        .await?;
    let user = match result {
        CommandResult::LoggedIn(user) => user,
        _ => None,
    };
    print_signed_in(user.as_ref(), global);
    Ok(())
}
