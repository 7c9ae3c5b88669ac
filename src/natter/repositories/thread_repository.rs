use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::RepositoryResult;
use crate::natter::models::{FileAttachment, Message, Role, Thread};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A stored file record associated with a thread, deserialized with the
/// store's column names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadFile {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(rename = "created_at")]
    pub uploaded_at: DateTime<Utc>,
}

/// Repository trait for durable conversation persistence.
pub trait ThreadRepository: Send + Sync + 'static {
    /// List threads, most recent first.
    fn list_threads(&self) -> BoxFuture<'static, RepositoryResult<Vec<Thread>>>;

    /// Create a thread with the given display name.
    fn create_thread(&self, name: &str) -> BoxFuture<'static, RepositoryResult<Thread>>;

    /// Rename a thread.
    fn rename_thread(&self, id: &str, name: &str) -> BoxFuture<'static, RepositoryResult<()>>;

    /// Delete a thread together with its messages and file records.
    fn delete_thread(&self, id: &str) -> BoxFuture<'static, RepositoryResult<()>>;

    /// Ordered messages for a thread, oldest first.
    fn list_messages(&self, thread_id: &str)
    -> BoxFuture<'static, RepositoryResult<Vec<Message>>>;

    /// Append one message, returning the stored copy with its durable id
    /// and server timestamp.
    fn append_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
        file: Option<FileAttachment>,
    ) -> BoxFuture<'static, RepositoryResult<Message>>;

    /// File records attached to a thread.
    fn list_files(&self, thread_id: &str)
    -> BoxFuture<'static, RepositoryResult<Vec<ThreadFile>>>;
}
