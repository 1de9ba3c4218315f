use crate::utils::error::Result;
use crate::utils::logger::redact_url;
use reqwest::Client;
use std::time::Duration;

/// 帶逾時設定的 GET 用戶端，回傳原始文字內容
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// GETs `url` and returns the body text. Non-2xx statuses are errors.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        tracing::info!(
            "🌐 Fetching data from: {} (Timeout: {} seconds)",
            redact_url(url),
            self.timeout.as_secs()
        );

        // reqwest 錯誤訊息會帶完整 URL (含金鑰)，先移除
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        tracing::debug!("API response status: {}", response.status());

        let response = response
            .error_for_status()
            .map_err(reqwest::Error::without_url)?;
        Ok(response.text().await.map_err(reqwest::Error::without_url)?)
    }

    /// Like [`fetch_text`](Self::fetch_text), but failures are logged and
    /// reported as `None`.
    pub async fn try_fetch_text(&self, url: &str) -> Option<String> {
        match self.fetch_text(url).await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::error!("❌ Failed to fetch data from {}: {}", redact_url(url), e);
                None
            }
        }
    }
}
