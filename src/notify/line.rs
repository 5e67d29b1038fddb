//! LINE Notify sender.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use super::Notifier;

const LINE_NOTIFY_URL: &str = "https://notify-api.line.me/api/notify";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Posts messages to LINE Notify with a bearer token.
pub struct LineNotifier {
    client: Client,
    token: String,
    url: String,
}

impl LineNotifier {
    pub fn new(token: String) -> Result<Self> {
        Self::with_url(token, LINE_NOTIFY_URL.to_string())
    }

    /// Create with a custom endpoint URL (for testing).
    pub fn with_url(token: String, url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, token, url })
    }

    /// LINE renders the first line next to the sender name; start on a fresh line.
    fn format_message(message: &str) -> String {
        format!("\n{}", message)
    }

    async fn check(response: reqwest::Response) -> Result<()> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("LINE Notify request failed: {} - {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        debug!(len = message.len(), "Sending notification");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .form(&[("message", Self::format_message(message))])
            .send()
            .await
            .context("Failed to send notification")?;

        Self::check(response).await
    }

    async fn notify_with_image(&self, message: &str, image: &Path) -> Result<()> {
        let bytes = tokio::fs::read(image)
            .await
            .with_context(|| format!("Failed to read image {}", image.display()))?;
        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let form = Form::new()
            .text("message", Self::format_message(message))
            .part("imageFile", Part::bytes(bytes).file_name(file_name));

        debug!(image = %image.display(), "Sending notification with image");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .context("Failed to send notification")?;

        Self::check(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{body_string_contains, header, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> LineNotifier {
        LineNotifier::with_url("token-abc".to_string(), format!("{}/api/notify", server.uri()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_notify_posts_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/notify"))
            .and(header("authorization", "Bearer token-abc"))
            .and(body_string_contains("message=%0ABTC%2FUSD"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server).notify("BTC/USD\nhello").await.unwrap();
    }

    #[tokio::test]
    async fn test_notify_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/notify"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid access token"))
            .mount(&server)
            .await;

        let err = notifier(&server).notify("hello").await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_notify_with_image_is_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/notify"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .and(body_string_contains("name=\"imageFile\""))
            .and(body_string_contains("PNGDATA"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut image = tempfile::NamedTempFile::new().unwrap();
        image.write_all(b"PNGDATA").unwrap();

        notifier(&server)
            .notify_with_image("chart", image.path())
            .await
            .unwrap();
    }
}
