use super::{page, Snapshot};
use crate::error::PortalError;
use crate::monitor::PositionSource;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderValue, LOCATION};
use reqwest::{redirect, Client, Response, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:145.0) Gecko/20100101 Firefox/145.0";
const LOGIN_PATH: &str = "/Login";
const TRACKER_PATH: &str = "/Subscriptions/WheresMyBus";
const USERNAME_FIELD: &str = "ctl00$MainContent$glogin$lLogin$UserName";
const PASSWORD_FIELD: &str = "ctl00$MainContent$glogin$lLogin$Password";

#[derive(Clone)]
pub enum Credentials {
    /// Subscriber login through the portal's ASP.NET form.
    Login { username: String, password: String },
    /// A `Cookie` header lifted from a signed-in browser.
    Cookie(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Cookie(_) => f.debug_tuple("Cookie").field(&"<redacted>").finish(),
        }
    }
}

/// An authenticated handle on the tracking portal.
///
/// Owns the cookie jar for the lifetime of the watch; dropping it ends the
/// session.
pub struct PortalSession {
    client: Client,
    base_url: String,
}

impl PortalSession {
    pub async fn acquire(
        base_url: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, PortalError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let portal = Url::parse(&base_url).map_err(|_| PortalError::InvalidUrl(base_url.clone()))?;

        let jar = Arc::new(Jar::default());
        if let Credentials::Cookie(cookie) = credentials {
            seed_jar(&jar, cookie, &portal)?;
        }

        // Redirects stay visible: a 302 is how the portal signals both a
        // successful login and an expired session.
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_provider(jar)
            .redirect(redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|source| PortalError::Transport {
                url: base_url.clone(),
                source,
            })?;

        let session = Self { client, base_url };

        match credentials {
            Credentials::Login { username, password } => session.login(username, password).await?,
            Credentials::Cookie(_) => tracing::info!("Reusing browser session cookie"),
        }

        Ok(session)
    }

    async fn login(&self, username: &str, password: &str) -> Result<(), PortalError> {
        let login_url = self.url(LOGIN_PATH);

        // Prime the ASP.NET session cookie before posting the form.
        let landing = self.get(&login_url).await?;
        tracing::debug!(status = %landing.status(), "Fetched login page");

        let post_url = format!("{login_url}?LoginType=Subscriber");
        let response = self
            .client
            .post(&post_url)
            .form(&[(USERNAME_FIELD, username), (PASSWORD_FIELD, password)])
            .send()
            .await
            .map_err(|source| PortalError::Transport {
                url: post_url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(PortalError::Status {
                url: post_url,
                status,
            });
        }
        if status != StatusCode::FOUND {
            return Err(PortalError::LoginRejected(status));
        }

        tracing::info!(username, "Logged in to bus portal");
        Ok(())
    }

    pub async fn fetch_snapshot(&self) -> Result<Snapshot, PortalError> {
        let url = self.url(TRACKER_PATH);
        let response = self.get(&url).await?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return Err(PortalError::SessionExpired { location });
        }
        if !status.is_success() {
            return Err(PortalError::Status { url, status });
        }

        let body = response
            .text()
            .await
            .map_err(|source| PortalError::Transport { url, source })?;

        Ok(page::parse_tracker_page(&body)?)
    }

    async fn get(&self, url: &str) -> Result<Response, PortalError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| PortalError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(PortalError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Load a browser `Cookie` header into the jar so cookies the portal
/// re-issues mid-watch replace the originals.
fn seed_jar(jar: &Jar, header: &str, portal: &Url) -> Result<(), PortalError> {
    let mut seeded = 0;
    for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        if !pair.contains('=') || HeaderValue::from_str(pair).is_err() {
            return Err(PortalError::InvalidCookie);
        }
        jar.add_cookie_str(pair, portal);
        seeded += 1;
    }
    if seeded == 0 {
        return Err(PortalError::InvalidCookie);
    }
    Ok(())
}

#[async_trait]
impl PositionSource for PortalSession {
    type Error = PortalError;

    async fn fetch(&mut self) -> Result<Snapshot, PortalError> {
        self.fetch_snapshot().await
    }
}
