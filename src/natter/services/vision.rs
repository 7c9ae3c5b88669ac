use super::BoxFuture;
use super::error::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Sent when the user attached an image without asking anything; the vision
/// service requires a non-empty question.
pub const DEFAULT_VISION_QUERY: &str = "Describe and analyze this image comprehensively.";

/// Image understanding over an inline base64 payload.
pub trait VisionAnalyzer: Send + Sync + 'static {
    fn analyze(
        &self,
        image_base64: String,
        user_query: &str,
    ) -> BoxFuture<'static, ServiceResult<String>>;
}

#[derive(Serialize)]
struct VisionRequest {
    #[serde(rename = "imageBase64")]
    image_base64: String,
    #[serde(rename = "userQuery")]
    user_query: String,
}

#[derive(Deserialize)]
struct VisionResponse {
    result: Option<String>,
    error: Option<String>,
}

/// HTTP implementation against `POST {base}/vision`.
pub struct HttpVisionAnalyzer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpVisionAnalyzer {
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

impl VisionAnalyzer for HttpVisionAnalyzer {
    fn analyze(
        &self,
        image_base64: String,
        user_query: &str,
    ) -> BoxFuture<'static, ServiceResult<String>> {
        let user_query = if user_query.trim().is_empty() {
            DEFAULT_VISION_QUERY.to_string()
        } else {
            user_query.trim().to_string()
        };
        let mut request = self
            .http
            .post(format!("{}/vision", self.base_url))
            .json(&VisionRequest {
                image_base64,
                user_query,
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
            let payload: VisionResponse = response.json().await?;
            match (payload.result, payload.error) {
                (Some(result), _) => {
                    debug!(chars = result.len(), "Vision analysis finished");
                    Ok(result)
                }
                (None, Some(error)) => Err(ServiceError::Failed(error)),
                (None, None) => Err(ServiceError::MissingField("result")),
            }
        })
    }
}
