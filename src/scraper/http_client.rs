use crate::config::ScraperConfig;
use anyhow::{Context, Result, bail};
use std::time::Duration;
use tracing::debug;

/// Cookie-keeping HTTP session against the directory site.
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Detail pages only render inside a session opened from the home page
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }

    /// Fetch a URL as text. Non-2xx statuses are errors; nothing is retried.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("HTTP {} from {}", status, url);
        }

        resp.text().await.context("Failed to read response body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(&ScraperConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn get_text_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let body = client().get_text(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn get_text_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client().get_text(&server.uri()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn session_cookie_is_replayed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "PHPSESSID=abc; Path=/"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/detail"))
            .and(header("cookie", "PHPSESSID=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("with session"))
            .mount(&server)
            .await;

        let client = client();
        client.get_text(&format!("{}/", server.uri())).await.unwrap();
        let body = client.get_text(&format!("{}/detail", server.uri())).await.unwrap();
        assert_eq!(body, "with session");
    }
}
