use super::BoxFuture;
use super::error::{ServiceError, ServiceResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// External file storage. An upload returns a durable public retrieval URL;
/// any non-success aborts the send before anything is persisted.
pub trait FileStorage: Send + Sync + 'static {
    fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        media_type: &str,
    ) -> BoxFuture<'static, ServiceResult<String>>;
}

#[derive(Deserialize)]
struct UploadResponse {
    url: Option<String>,
    error: Option<String>,
}

/// HTTP implementation against `POST {base}/upload`.
pub struct HttpFileStorage {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFileStorage {
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

impl FileStorage for HttpFileStorage {
    fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        media_type: &str,
    ) -> BoxFuture<'static, ServiceResult<String>> {
        let mut request = self
            .http
            .post(format!("{}/upload", self.base_url))
            .query(&[("filename", filename)])
            .header(reqwest::header::CONTENT_TYPE, media_type)
            .body(bytes);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let filename = filename.to_string();

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
            let payload: UploadResponse = response.json().await?;
            match (payload.url, payload.error) {
                (Some(url), _) => {
                    debug!(file = %filename, url = %url, "File uploaded");
                    Ok(url)
                }
                (None, Some(error)) => Err(ServiceError::Failed(error)),
                (None, None) => Err(ServiceError::MissingField("url")),
            }
        })
    }
}
