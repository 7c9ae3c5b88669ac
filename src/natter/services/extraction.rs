use super::BoxFuture;
use super::error::{ServiceError, ServiceResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Sentinel body the extraction service returns for media types it cannot
/// parse. Mapped to [`ServiceError::UnsupportedType`] so callers can degrade
/// to "no extracted text" instead of failing the send.
const UNSUPPORTED_SENTINEL: &str = "Unsupported file type.";

/// Remote document-text extraction for opaque formats (PDF, Word, ...).
pub trait TextExtractor: Send + Sync + 'static {
    fn extract(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        media_type: &str,
    ) -> BoxFuture<'static, ServiceResult<String>>;
}

#[derive(Deserialize)]
struct ReadFileResponse {
    text: Option<String>,
    error: Option<String>,
}

/// HTTP implementation against `POST {base}/read-file`.
pub struct HttpTextExtractor {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTextExtractor {
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

impl TextExtractor for HttpTextExtractor {
    fn extract(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        media_type: &str,
    ) -> BoxFuture<'static, ServiceResult<String>> {
        let mut request = self
            .http
            .post(format!("{}/read-file", self.base_url))
            .query(&[("filename", filename)])
            .header(reqwest::header::CONTENT_TYPE, media_type)
            .body(bytes);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let filename = filename.to_string();
        let media_type = media_type.to_string();

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
            let payload: ReadFileResponse = response.json().await?;
            match (payload.text, payload.error) {
                (Some(text), _) if text == UNSUPPORTED_SENTINEL => {
                    Err(ServiceError::UnsupportedType(media_type))
                }
                (Some(text), _) => {
                    debug!(file = %filename, chars = text.len(), "Remote extraction finished");
                    Ok(text)
                }
                (None, Some(error)) => Err(ServiceError::Failed(error)),
                (None, None) => Err(ServiceError::MissingField("text")),
            }
        })
    }
}
