// Marketplace API HTTP client
//
// Wraps `reqwest::Client` with base-path URL construction, CSRF header
// injection for state-changing requests, and status/body decoding. All
// endpoint groups (rooms, auth, media, bookings) are implemented as
// inherent methods in separate files to keep this module focused on
// transport mechanics.

use std::sync::{Arc, RwLock};

use reqwest::cookie::{CookieStore, Jar};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Name of the cookie Django uses to hand out its CSRF token.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Header the backend expects the CSRF token in.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Raw HTTP client for the marketplace REST API (`/api/v1/`).
///
/// Every state-changing request carries the `X-CSRFToken` header. The token
/// comes from an explicitly stored value if one was set, otherwise from the
/// `csrftoken` cookie the backend placed in the client's jar.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    csrf_token: RwLock<Option<String>>,
    cookie_jar: Option<Arc<Jar>>,
}

impl ApiClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// automatically (session auth requires cookies). `base_url` is the API
    /// root, e.g. `http://localhost:8000/api/v1/`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let cookie_jar = config.cookie_jar.clone();
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url: normalize_base(base_url),
            csrf_token: RwLock::new(None),
            cookie_jar,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// No cookie jar is attached, so CSRF tokens must be supplied through
    /// [`set_csrf_token`](Self::set_csrf_token).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
            csrf_token: RwLock::new(None),
            cookie_jar: None,
        }
    }

    /// The API root every endpoint path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── CSRF token management ─────────────────────────────────────────

    /// Store a CSRF token explicitly, overriding the cookie lookup.
    pub fn set_csrf_token(&self, token: impl Into<String>) {
        debug!("storing CSRF token");
        *self.csrf_token.write().expect("CSRF lock poisoned") = Some(token.into());
    }

    /// Forget any explicitly stored CSRF token.
    pub fn clear_csrf_token(&self) {
        *self.csrf_token.write().expect("CSRF lock poisoned") = None;
    }

    /// The token sent with state-changing requests, if one is known.
    pub fn csrf_token(&self) -> Option<String> {
        if let Some(token) = self.csrf_token.read().expect("CSRF lock poisoned").clone() {
            return Some(token);
        }
        let jar = self.cookie_jar.as_ref()?;
        let header = jar.cookies(&self.base_url)?;
        let cookies = header.to_str().ok()?;
        cookie_value(cookies, CSRF_COOKIE).map(String::from)
    }

    /// Apply the CSRF header to a request builder. An unknown token is sent
    /// as an empty string so the backend rejects with 403 rather than the
    /// request silently lacking the header.
    fn apply_csrf(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header(CSRF_HEADER, self.csrf_token().unwrap_or_default())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an API path relative to `/api/v1/`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        parse_json(resp).await
    }

    /// Send a POST request with a JSON body (CSRF-protected) and decode the
    /// JSON response.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let builder = self.apply_csrf(self.http.post(url).json(body));
        let resp = builder.send().await?;
        parse_json(resp).await
    }

    /// Send a POST request with a JSON body, discarding the response body.
    pub(crate) async fn post_unit(
        &self,
        url: Url,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<(), Error> {
        debug!("POST {}", url);
        let mut builder = self.http.post(url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let resp = self.apply_csrf(builder).send().await?;
        check_status(resp).await.map(drop)
    }
}

// ── Response decoding ────────────────────────────────────────────────

/// Map non-success statuses to [`Error`], passing successful responses on.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    trace!(%status, url = %resp.url(), "response received");

    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = preview(&body).to_owned();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            status: status.as_u16(),
            message,
        });
    }

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

/// Check the status, then decode the body as JSON.
pub(crate) async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let resp = check_status(resp).await?;
    let body = resp.text().await?;
    decode(&body)
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}

/// `Url::join` drops the last segment unless the base ends with `/`.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Extract a single cookie value from a `Cookie` header string.
fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = ApiClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://localhost:8000/api/v1").unwrap(),
        );
        assert_eq!(
            client.api_url("room/42").unwrap().as_str(),
            "http://localhost:8000/api/v1/room/42"
        );
    }

    #[test]
    fn leading_slash_in_path_stays_under_base() {
        let client = ApiClient::with_client(
            reqwest::Client::new(),
            Url::parse("http://localhost:8000/api/v1/").unwrap(),
        );
        assert_eq!(
            client.api_url("/auth/me").unwrap().as_str(),
            "http://localhost:8000/api/v1/auth/me"
        );
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let header = "sessionid=abc; csrftoken=tok123; theme=dark";
        assert_eq!(cookie_value(header, "csrftoken"), Some("tok123"));
        assert_eq!(cookie_value(header, "missing"), None);
    }

    #[test]
    fn csrf_token_read_from_jar() {
        let jar = Arc::new(Jar::default());
        let base = Url::parse("http://localhost:8000/api/v1/").unwrap();
        jar.add_cookie_str("csrftoken=from-cookie; Path=/", &base);
        let transport = TransportConfig {
            cookie_jar: Some(Arc::clone(&jar)),
            ..TransportConfig::default()
        };
        let client = ApiClient::new(base, &transport).unwrap();
        assert_eq!(client.csrf_token().as_deref(), Some("from-cookie"));

        client.set_csrf_token("explicit");
        assert_eq!(client.csrf_token().as_deref(), Some("explicit"));

        client.clear_csrf_token();
        assert_eq!(client.csrf_token().as_deref(), Some("from-cookie"));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let body = "é".repeat(300);
        assert_eq!(preview(&body).chars().count(), 200);
    }
}
