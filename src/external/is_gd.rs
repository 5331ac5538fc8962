use crate::config::ShortenerConfig;
use crate::error::AppResult;
use reqwest::Client;
use std::time::Duration;

/// is.gd link shortener. Best effort: any failure yields the original URL.
#[derive(Clone)]
pub struct LinkShortener {
    http: Client,
    cfg: ShortenerConfig,
}

impl LinkShortener {
    pub fn new(cfg: ShortenerConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("lottery-backend/shortener")
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self { http, cfg })
    }

    pub fn is_enabled(&self) -> bool {
        self.cfg.enabled && !self.cfg.endpoint.is_empty()
    }

    pub async fn shorten(&self, url: &str) -> String {
        if !self.is_enabled() {
            return url.to_string();
        }

        let result = self
            .http
            .get(&self.cfg.endpoint)
            .query(&[("format", "simple"), ("url", url)])
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                log::warn!("Link shortening failed, keeping original URL: {e}");
                return url.to_string();
            }
        };

        let ok = resp.status().is_success();
        match resp.text().await {
            Ok(body) => accept_short_url(ok, &body).unwrap_or_else(|| {
                log::warn!("Link shortener returned an unusable body, keeping original URL");
                url.to_string()
            }),
            Err(e) => {
                log::warn!("Link shortener body unreadable, keeping original URL: {e}");
                url.to_string()
            }
        }
    }
}

/// is.gd answers `format=simple` requests with the bare short URL.
fn accept_short_url(status_ok: bool, body: &str) -> Option<String> {
    let body = body.trim();
    (status_ok && body.starts_with("http")).then(|| body.to_string())
}
