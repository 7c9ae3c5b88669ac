use super::BoxFuture;
use super::error::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Text-to-image generation, returning the URL of the stored result.
pub trait ImageGenerator: Send + Sync + 'static {
    fn generate(&self, prompt: &str) -> BoxFuture<'static, ServiceResult<String>>;
}

#[derive(Serialize)]
struct ImageRequest {
    prompt: String,
}

#[derive(Deserialize)]
struct ImageResponse {
    url: Option<String>,
    error: Option<String>,
}

/// HTTP implementation against `POST {base}/image`.
pub struct HttpImageGenerator {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpImageGenerator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> ServiceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
        })
    }
}

impl ImageGenerator for HttpImageGenerator {
    fn generate(&self, prompt: &str) -> BoxFuture<'static, ServiceResult<String>> {
        let mut request = self
            .http
            .post(format!("{}/image", self.base_url))
            .json(&ImageRequest {
                prompt: prompt.to_string(),
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ServiceError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            let payload: ImageResponse = response.json().await?;
            match (payload.url, payload.error) {
                (Some(url), _) => {
                    debug!(url = %url, "Image generated");
                    Ok(url)
                }
                (None, Some(error)) => Err(ServiceError::Failed(error)),
                (None, None) => Err(ServiceError::MissingField("url")),
            }
        })
    }
}
