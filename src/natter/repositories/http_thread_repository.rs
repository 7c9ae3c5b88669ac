use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::error::{RepositoryResult, StoreError};
use super::thread_repository::{BoxFuture, ThreadFile, ThreadRepository};
use crate::natter::models::{FileAttachment, Message, Role, Thread};

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Serialize)]
struct NameRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct AppendMessageRequest<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a FileAttachment>,
}

#[derive(Deserialize)]
struct MessageRow {
    id: String,
    role: String,
    content: String,
    file: Option<FileAttachment>,
    created_at: DateTime<Utc>,
}

fn message_from_row(row: MessageRow) -> RepositoryResult<Message> {
    let role: Role = row
        .role
        .parse()
        .map_err(|message| StoreError::InvalidData { message })?;
    Ok(Message::durable(
        row.id,
        role,
        row.content,
        row.file,
        row.created_at,
    ))
}

async fn ensure_success(response: reqwest::Response) -> RepositoryResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// HTTP implementation of the conversation store.
pub struct HttpThreadRepository {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpThreadRepository {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> RepositoryResult<Self> {
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

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

impl ThreadRepository for HttpThreadRepository {
    fn list_threads(&self) -> BoxFuture<'static, RepositoryResult<Vec<Thread>>> {
        let request = self.with_auth(self.http.get(format!("{}/threads", self.base_url)));

        Box::pin(async move {
            let response = ensure_success(request.send().await?).await?;
            let threads: Vec<Thread> = response.json().await?;
            Ok(threads)
        })
    }

    fn create_thread(&self, name: &str) -> BoxFuture<'static, RepositoryResult<Thread>> {
        let request = self.with_auth(
            self.http
                .post(format!("{}/threads", self.base_url))
                .json(&NameRequest { name }),
        );
        let name = name.to_string();

        Box::pin(async move {
            let response = ensure_success(request.send().await?).await?;
            let thread: Thread = response.json().await?;
            debug!(thread_id = %thread.id, name = %name, "Thread created");
            Ok(thread)
        })
    }

    fn rename_thread(&self, id: &str, name: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let request = self.with_auth(
            self.http
                .patch(format!("{}/threads/{}", self.base_url, id))
                .json(&NameRequest { name }),
        );

        Box::pin(async move {
            ensure_success(request.send().await?).await?;
            Ok(())
        })
    }

    fn delete_thread(&self, id: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let request = self.with_auth(
            self.http
                .delete(format!("{}/threads/{}", self.base_url, id)),
        );
        let id = id.to_string();

        Box::pin(async move {
            ensure_success(request.send().await?).await?;
            debug!(thread_id = %id, "Thread deleted");
            Ok(())
        })
    }

    fn list_messages(
        &self,
        thread_id: &str,
    ) -> BoxFuture<'static, RepositoryResult<Vec<Message>>> {
        let request = self.with_auth(
            self.http
                .get(format!("{}/threads/{}/messages", self.base_url, thread_id)),
        );

        Box::pin(async move {
            let response = ensure_success(request.send().await?).await?;
            let rows: Vec<MessageRow> = response.json().await?;
            rows.into_iter().map(message_from_row).collect()
        })
    }

    fn append_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
        file: Option<FileAttachment>,
    ) -> BoxFuture<'static, RepositoryResult<Message>> {
        let request = self.with_auth(
            self.http
                .post(format!("{}/threads/{}/messages", self.base_url, thread_id))
                .json(&AppendMessageRequest {
                    role,
                    content,
                    file: file.as_ref(),
                }),
        );
        let thread_id = thread_id.to_string();

        Box::pin(async move {
            let response = ensure_success(request.send().await?).await?;
            let row: MessageRow = response.json().await?;
            debug!(thread_id = %thread_id, message_id = %row.id, role = %row.role, "Message stored");
            message_from_row(row)
        })
    }

    fn list_files(
        &self,
        thread_id: &str,
    ) -> BoxFuture<'static, RepositoryResult<Vec<ThreadFile>>> {
        let request = self.with_auth(
            self.http
                .get(format!("{}/threads/{}/files", self.base_url, thread_id)),
        );

        Box::pin(async move {
            let response = ensure_success(request.send().await?).await?;
            let files: Vec<ThreadFile> = response.json().await?;
            Ok(files)
        })
    }
}
