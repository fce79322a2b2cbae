// Identity endpoints
//
// Session login (email + password), OAuth code exchange, logout, and the
// "who am I" lookup. The backend sets the session and CSRF cookies on login;
// the client's cookie jar carries them from then on.

use secrecy::{ExposeSecret, SecretString};
use strum::{Display, EnumString};
use tracing::debug;

use crate::client::{ApiClient, check_status, decode};
use crate::error::Error;
use crate::models::{LoginRequest, LoginResponse, OAuthCode, User};

/// Third-party identity providers the backend can exchange codes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OAuthProvider {
    Github,
    Kakao,
}

impl ApiClient {
    /// Fetch the currently authenticated user.
    ///
    /// `GET auth/me`. An empty or `null` body means no session; a 401/403
    /// surfaces as [`Error::Authentication`].
    pub async fn me(&self) -> Result<Option<User>, Error> {
        let url = self.api_url("auth/me")?;
        debug!("GET {}", url);
        let resp = self.http().get(url).send().await?;
        let resp = check_status(resp).await?;
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        decode(&body)
    }

    /// Log in with email and password.
    ///
    /// `POST auth/login` (CSRF)
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<LoginResponse, Error> {
        let url = self.api_url("auth/login")?;
        debug!(email, "logging in");
        let body = LoginRequest {
            email,
            password: password.expose_secret(),
        };
        self.post(url, &body).await
    }

    /// Exchange an OAuth authorization code for a session.
    ///
    /// `POST auth/{github|kakao}` (CSRF)
    pub async fn oauth_login(
        &self,
        provider: OAuthProvider,
        code: &str,
    ) -> Result<LoginResponse, Error> {
        let url = self.api_url(&format!("auth/{provider}"))?;
        debug!(%provider, "exchanging OAuth code");
        self.post(url, &OAuthCode { code }).await
    }

    /// End the current session.
    ///
    /// `POST auth/logout` (CSRF)
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.api_url("auth/logout")?;
        debug!("logging out");
        self.post_unit(url, None::<&()>).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("GitHub".parse::<OAuthProvider>().unwrap(), OAuthProvider::Github);
        assert_eq!(OAuthProvider::Kakao.to_string(), "kakao");
        assert!("facebook".parse::<OAuthProvider>().is_err());
    }
}
