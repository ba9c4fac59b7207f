//! TopBraid session handling
//!
//! TopBraid authenticates with a servlet form login and identifies the
//! session through a `JSESSIONID` cookie. The session id is cached and only
//! replaced when a query fails (see [`SparqlSource`](super::SparqlSource)),
//! since a failure most often means the session expired.

use super::SourceError;
use reqwest::header::SET_COOKIE;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SESSION_COOKIE: &str = "JSESSIONID";

pub struct SessionManager {
    http_client: reqwest::Client,
    login_url: String,
    username: String,
    password: String,
    session_id: Mutex<Option<String>>,
}

impl SessionManager {
    /// `http_client` must not follow redirects: the session cookie is set on
    /// the login response itself, which usually redirects.
    pub fn new(
        http_client: reqwest::Client,
        login_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            login_url: login_url.into(),
            username: username.into(),
            password: password.into(),
            session_id: Mutex::new(None),
        }
    }

    /// Whether a login endpoint is configured at all
    pub fn is_enabled(&self) -> bool {
        !self.login_url.trim().is_empty()
    }

    /// Current session id, logging in first if there is none
    ///
    /// Returns `None` when session handling is disabled.
    pub async fn session_id(&self) -> Result<Option<String>, SourceError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let mut cached = self.session_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(Some(id.clone()));
        }

        let id = self.login().await?;
        *cached = Some(id.clone());
        Ok(Some(id))
    }

    /// Discard the cached session and log in again
    pub async fn fresh_session_id(&self) -> Result<Option<String>, SourceError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let mut cached = self.session_id.lock().await;
        *cached = None;
        let id = self.login().await?;
        *cached = Some(id.clone());
        Ok(Some(id))
    }

    async fn login(&self) -> Result<String, SourceError> {
        debug!(url = %self.login_url, "Logging in to TopBraid");

        let response = self
            .http_client
            .post(&self.login_url)
            .form(&[
                ("j_username", self.username.as_str()),
                ("j_password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(SourceError::Session(format!(
                "login rejected with status {}",
                status.as_u16()
            )));
        }

        let session_id = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(parse_session_cookie)
            .ok_or_else(|| {
                SourceError::Session(format!("no {} cookie in login response", SESSION_COOKIE))
            })?;

        info!("Obtained new TopBraid session");
        Ok(session_id)
    }
}

/// Extract the session id from one `Set-Cookie` header value
fn parse_session_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name.trim() == SESSION_COOKIE && !value.trim().is_empty()).then(|| value.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_cookie() {
        assert_eq!(
            parse_session_cookie("JSESSIONID=ABC123; Path=/tbl; HttpOnly"),
            Some("ABC123".to_string())
        );
        assert_eq!(parse_session_cookie("OTHER=1; Path=/"), None);
        assert_eq!(parse_session_cookie("JSESSIONID=; Path=/"), None);
    }

    #[tokio::test]
    async fn test_disabled_without_login_url() {
        let manager = SessionManager::new(reqwest::Client::new(), "", "user", "pass");

        assert!(!manager.is_enabled());
        assert_eq!(manager.session_id().await.unwrap(), None);
        assert_eq!(manager.fresh_session_id().await.unwrap(), None);
    }
}
