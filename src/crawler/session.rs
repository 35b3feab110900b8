//! Page sessions
//!
//! A session is an already authenticated handle on a site: it navigates to
//! a URL, exposes the rendered markup, and reports where it ended up. The
//! HTTP implementation carries the operator's cookie and user agent; a
//! browser-driven session can be plugged in through the same traits.

use crate::config::{SourceConfig, UserAgentConfig};
use crate::{ConfigError, HarvestError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("page load timed out after {0:?}")]
    Timeout(Duration),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("no page loaded")]
    NoPage,
}

/// An authenticated page session
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url`, giving up after `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError>;

    /// Loads the current page again, giving up after `timeout`
    async fn refresh(&mut self, timeout: Duration) -> Result<(), SessionError>;

    /// Returns the markup of the current page as rendered now
    async fn page_source(&mut self) -> Result<String, SessionError>;

    /// URL of the current page after any redirects
    fn current_url(&self) -> Option<&str>;
}

/// Opens one session per source
pub trait SessionFactory: Send + Sync {
    fn open(&self, source: &SourceConfig) -> Result<Box<dyn BrowserSession>, HarvestError>;
}

/// Builds an HTTP client presenting the configured identity
///
/// # Arguments
///
/// * `config` - User agent, language and session cookie
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - A header value was invalid or the client failed to build
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, header_value("accept-language", &config.accept_language)?);
    if let Some(cookie) = &config.cookie {
        headers.insert(COOKIE, header_value("cookie", cookie)?);
    }

    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .cookie_store(true)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, HarvestError> {
    HeaderValue::from_str(value).map_err(|e| {
        HarvestError::Config(ConfigError::Validation(format!(
            "invalid {} header: {}",
            name, e
        )))
    })
}

/// Session backed by plain HTTP requests
pub struct HttpSession {
    client: Client,
    current_url: Option<String>,
    body: Option<String>,
}

impl HttpSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            current_url: None,
            body: None,
        }
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), SessionError> {
        let load = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| SessionError::Navigation(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(SessionError::Navigation(format!("HTTP {}", status.as_u16())));
            }

            let final_url = response.url().to_string();
            let body = response
                .text()
                .await
                .map_err(|e| SessionError::Navigation(e.to_string()))?;
            Ok::<_, SessionError>((final_url, body))
        };

        match tokio::time::timeout(timeout, load).await {
            Ok(Ok((final_url, body))) => {
                self.current_url = Some(final_url);
                self.body = Some(body);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::Timeout(timeout)),
        }
    }

    async fn refresh(&mut self, timeout: Duration) -> Result<(), SessionError> {
        let url = self.current_url.clone().ok_or(SessionError::NoPage)?;
        self.navigate(&url, timeout).await
    }

    /// The body of the last response; call `refresh` to fetch a newer one
    async fn page_source(&mut self) -> Result<String, SessionError> {
        self.body.clone().ok_or(SessionError::NoPage)
    }

    fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }
}

/// Opens an [`HttpSession`] with its own cookie jar for every source
pub struct HttpSessionFactory {
    user_agent: UserAgentConfig,
}

impl HttpSessionFactory {
    pub fn new(user_agent: UserAgentConfig) -> Self {
        Self { user_agent }
    }
}

impl SessionFactory for HttpSessionFactory {
    fn open(&self, _source: &SourceConfig) -> Result<Box<dyn BrowserSession>, HarvestError> {
        let client = build_http_client(&self.user_agent)?;
        Ok(Box::new(HttpSession::new(client)))
    }
}
