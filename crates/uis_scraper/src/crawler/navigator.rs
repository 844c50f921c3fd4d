//! Page fetching.
//!
//! The crawler and the drift detector only ever see a [`Navigator`]; the real
//! one talks HTTP with a cookie-backed session, tests use a canned one.

use rand::Rng;
use reqwest::Client;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::ScrapeError;
use crate::config::{CrawlerConfig, Credentials};

static LOGIN_FORM: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"form[action*="login.pl"], input[name="credential_0"]"#).unwrap()
});

/// A fetched page: the final URL after redirects and its body.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: String,
}

#[async_trait::async_trait]
pub trait Navigator: Send + Sync {
    /// Loads one page. A login form where content was expected is
    /// [`ScrapeError::SessionExpired`].
    async fn fetch(&self, url: &str) -> Result<Page, ScrapeError>;
}

/// True when the page is the portal's login screen.
pub fn is_login_page(url: &str, html: &str) -> bool {
    if url.contains("login.pl") {
        return true;
    }
    let doc = Html::parse_document(html);
    let found = doc.select(&LOGIN_FORM).next().is_some();
    found
}

/// Request delay plus 0-20% jitter.
fn politeness_delay(base_ms: u64) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..=(base_ms / 5));
    Duration::from_millis(base_ms + jitter)
}

/// Navigator backed by `reqwest` with a persistent cookie store.
pub struct HttpNavigator {
    client: Client,
    config: CrawlerConfig,
}

impl HttpNavigator {
    pub fn new(config: CrawlerConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ScrapeError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    /// Posts the credentials to the login form. The session cookie lands in
    /// the client's cookie store.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ScrapeError> {
        let url = self.config.login_url();
        info!(url = %url, user = %credentials.username, "Logging in");

        let response = self
            .client
            .post(&url)
            .form(&[
                ("credential_0", credentials.username.as_str()),
                ("credential_1", credentials.password.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScrapeError::UnexpectedResponse {
                message: format!("login.pl returned status {}", response.status()),
            });
        }

        let final_url = response.url().to_string();
        let html = response.text().await?;

        // Still looking at the login form means the credentials were refused
        if is_login_page("", &html) {
            warn!(url = %final_url, "Login form returned after posting credentials");
            return Err(ScrapeError::SessionExpired { url: final_url });
        }

        info!(url = %final_url, "Logged in");
        Ok(())
    }
}

#[async_trait::async_trait]
impl Navigator for HttpNavigator {
    async fn fetch(&self, url: &str) -> Result<Page, ScrapeError> {
        tokio::time::sleep(politeness_delay(self.config.request_delay_ms)).await;

        debug!(url = %url, "Fetching page");
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ScrapeError::UnexpectedResponse {
                message: format!("{} returned status {}", url, response.status()),
            });
        }

        let final_url = response.url().to_string();
        let html = response.text().await?;

        if !url.contains("login.pl") && is_login_page(&final_url, &html) {
            warn!(url = %url, landed = %final_url, "Session expired - login page returned");
            return Err(ScrapeError::SessionExpired { url: url.to_string() });
        }

        Ok(Page { url: final_url, html })
    }
}
