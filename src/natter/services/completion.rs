//! Conversational completion client
//!
//! Posts the message history to the completion service and decodes its
//! SSE-style response (`data: {"content": ...}` frames terminated by
//! `data: [DONE]`). Frame decoding is pure and buffered so byte chunks may
//! split lines arbitrarily.

use super::BoxFuture;
use super::error::{ServiceError, ServiceResult};
use crate::natter::models::message::{Message, Role};
use crate::natter::models::send_state::CancelHandle;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Substituted when a stream ends without yielding any text, so the user
/// never sees an empty reply.
pub const EMPTY_REPLY_FALLBACK: &str = "[No response]";

/// Stream chunks emitted during responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Delta(String),
    Done,
}

/// Type alias for response streams
pub type ResponseStream = BoxStream<'static, ServiceResult<StreamChunk>>;

/// One turn of wire history. `fileContent` carries extracted document text
/// for the assistant; it is transmitted but never rendered.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    #[serde(rename = "fileContent", skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
}

impl ChatTurn {
    pub fn from_message(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            file_content: message.extracted_text.clone(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest {
    messages: Vec<ChatTurn>,
}

/// Conversational completion service.
pub trait CompletionClient: Send + Sync + 'static {
    /// Open a streaming completion for `history`. The cancel handle is
    /// honored between reads of the response body.
    fn stream_chat(
        &self,
        history: Vec<ChatTurn>,
        cancel: CancelHandle,
    ) -> BoxFuture<'static, ServiceResult<ResponseStream>>;

    /// Single-shot completion for non-streaming use.
    fn chat(&self, history: Vec<ChatTurn>) -> BoxFuture<'static, ServiceResult<String>>;
}

/// HTTP implementation against `POST {base}/chat`.
pub struct HttpCompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    /// No overall request timeout: a streaming completion legitimately runs
    /// until the service closes it. Only connecting is bounded.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> ServiceResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key,
        })
    }

    fn request(&self, history: Vec<ChatTurn>) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .post(format!("{}/chat", self.base_url))
            .json(&CompletionRequest { messages: history });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
    }
}

impl CompletionClient for HttpCompletionClient {
    fn stream_chat(
        &self,
        history: Vec<ChatTurn>,
        cancel: CancelHandle,
    ) -> BoxFuture<'static, ServiceResult<ResponseStream>> {
        let request = self.request(history);

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

            let mut body = response.bytes_stream();
            let stream: ResponseStream = Box::pin(async_stream::stream! {
                let mut decoder = FrameDecoder::new();
                while let Some(chunk) = body.next().await {
                    if cancel.is_cancelled() {
                        debug!("Completion stream dropped after cancel");
                        return;
                    }
                    let bytes = match chunk {
                        Ok(bytes) => bytes,
                        Err(error) => {
                            yield Err(ServiceError::Transport(error));
                            return;
                        }
                    };
                    for frame in decoder.push(&String::from_utf8_lossy(&bytes)) {
                        let done = frame == StreamChunk::Done;
                        yield Ok(frame);
                        if done {
                            return;
                        }
                    }
                }
                yield Ok(StreamChunk::Done);
            });
            Ok(stream)
        })
    }

    fn chat(&self, history: Vec<ChatTurn>) -> BoxFuture<'static, ServiceResult<String>> {
        let request = self.request(history);

        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(ServiceError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let mut decoder = FrameDecoder::new();
            let mut content = String::new();
            for frame in decoder.push(&body) {
                if let StreamChunk::Delta(delta) = frame {
                    content.push_str(&delta);
                }
            }
            Ok(content)
        })
    }
}

/// Outcome of draining a response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The stream finished; empty accumulation is replaced by the fallback.
    Completed(String),
    /// The user stopped the stream; partial text is discarded by the caller.
    Cancelled,
}

/// Drain a response stream, calling `on_delta` with each text increment.
///
/// The cancel flag is re-checked before applying every frame so a stop takes
/// effect promptly even when the transport is slow to notice.
pub async fn consume_stream(
    mut stream: ResponseStream,
    cancel: &CancelHandle,
    mut on_delta: impl FnMut(&str),
) -> ServiceResult<StreamOutcome> {
    let mut accumulated = String::new();
    while let Some(item) = stream.next().await {
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }
        match item? {
            StreamChunk::Delta(delta) => {
                accumulated.push_str(&delta);
                on_delta(&delta);
            }
            StreamChunk::Done => break,
        }
    }
    if cancel.is_cancelled() {
        return Ok(StreamOutcome::Cancelled);
    }
    if accumulated.is_empty() {
        accumulated = EMPTY_REPLY_FALLBACK.to_string();
    }
    Ok(StreamOutcome::Completed(accumulated))
}

/// Buffers partial lines across byte chunks and decodes complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw text, returning every frame completed by this chunk.
    pub fn push(&mut self, input: &str) -> Vec<StreamChunk> {
        self.buffer.push_str(input);
        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(frame) = decode_frame_line(line.trim_end_matches(['\n', '\r'])) {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Decode one `data: <payload>` line. Returns `None` for blank lines,
/// non-data lines, empty deltas, and malformed payloads (logged, skipped).
fn decode_frame_line(line: &str) -> Option<StreamChunk> {
    let payload = line.strip_prefix("data: ")?;
    if payload == "[DONE]" {
        return Some(StreamChunk::Done);
    }
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(error) => {
            warn!(error = %error, "Skipping malformed stream frame");
            return None;
        }
    };
    let text = content_text(&value);
    if text.is_empty() {
        None
    } else {
        Some(StreamChunk::Delta(text))
    }
}

/// Extract delta text from a frame payload. `content` is either a plain
/// string or an array of fragments; a fragment contributes its `text` field
/// (a string, or an object with a string `value`), or itself when it is a
/// bare string.
fn content_text(value: &Value) -> String {
    match value.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(fragments)) => fragments.iter().map(fragment_text).collect(),
        _ => String::new(),
    }
}

fn fragment_text(fragment: &Value) -> String {
    if let Some(text) = fragment.as_str() {
        return text.to_string();
    }
    match fragment.get("text") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(inner)) => inner
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}
