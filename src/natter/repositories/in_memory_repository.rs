use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::{RepositoryResult, StoreError};
use super::thread_repository::{BoxFuture, ThreadFile, ThreadRepository};
use crate::natter::models::{FileAttachment, Message, Role, Thread};

#[derive(Default)]
struct StoreInner {
    threads: Vec<Thread>,
    messages: HashMap<String, Vec<Message>>,
    files: HashMap<String, Vec<ThreadFile>>,
    next_id: u64,
}

impl StoreInner {
    fn mint_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

fn unknown_thread(id: &str) -> StoreError {
    StoreError::InvalidData {
        message: format!("Unknown thread: {}", id),
    }
}

/// In-memory conversation store.
/// Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryThreadRepository {
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryThreadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file row the way the storage service's upload hook would.
    pub fn add_file(&self, thread_id: &str, file: ThreadFile) {
        self.inner
            .lock()
            .files
            .entry(thread_id.to_string())
            .or_default()
            .push(file);
    }
}

impl ThreadRepository for InMemoryThreadRepository {
    fn list_threads(&self) -> BoxFuture<'static, RepositoryResult<Vec<Thread>>> {
        let inner = self.inner.clone();

        Box::pin(async move {
            let store = inner.lock();
            // Most recent first
            Ok(store.threads.iter().rev().cloned().collect())
        })
    }

    fn create_thread(&self, name: &str) -> BoxFuture<'static, RepositoryResult<Thread>> {
        let inner = self.inner.clone();
        let name = name.to_string();

        Box::pin(async move {
            let mut store = inner.lock();
            let id = store.mint_id("thread");
            let thread = Thread::new(id.clone(), name);
            store.threads.push(thread.clone());
            store.messages.insert(id, Vec::new());
            Ok(thread)
        })
    }

    fn rename_thread(&self, id: &str, name: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let inner = self.inner.clone();
        let id = id.to_string();
        let name = name.to_string();

        Box::pin(async move {
            let mut store = inner.lock();
            match store.threads.iter_mut().find(|thread| thread.id == id) {
                Some(thread) => {
                    thread.name = name;
                    Ok(())
                }
                None => Err(unknown_thread(&id)),
            }
        })
    }

    fn delete_thread(&self, id: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        let inner = self.inner.clone();
        let id = id.to_string();

        Box::pin(async move {
            let mut store = inner.lock();
            let before = store.threads.len();
            store.threads.retain(|thread| thread.id != id);
            if store.threads.len() == before {
                return Err(unknown_thread(&id));
            }
            store.messages.remove(&id);
            store.files.remove(&id);
            Ok(())
        })
    }

    fn list_messages(
        &self,
        thread_id: &str,
    ) -> BoxFuture<'static, RepositoryResult<Vec<Message>>> {
        let inner = self.inner.clone();
        let thread_id = thread_id.to_string();

        Box::pin(async move {
            let store = inner.lock();
            Ok(store.messages.get(&thread_id).cloned().unwrap_or_default())
        })
    }

    fn append_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
        file: Option<FileAttachment>,
    ) -> BoxFuture<'static, RepositoryResult<Message>> {
        let inner = self.inner.clone();
        let thread_id = thread_id.to_string();
        let content = content.to_string();

        Box::pin(async move {
            let mut store = inner.lock();
            if !store.threads.iter().any(|thread| thread.id == thread_id) {
                return Err(unknown_thread(&thread_id));
            }
            let id = store.mint_id("msg");
            let message = Message::durable(id, role, content, file, Utc::now());
            store
                .messages
                .entry(thread_id)
                .or_default()
                .push(message.clone());
            Ok(message)
        })
    }

    fn list_files(
        &self,
        thread_id: &str,
    ) -> BoxFuture<'static, RepositoryResult<Vec<ThreadFile>>> {
        let inner = self.inner.clone();
        let thread_id = thread_id.to_string();

        Box::pin(async move {
            let store = inner.lock();
            Ok(store.files.get(&thread_id).cloned().unwrap_or_default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::natter::models::MessageKind;

    #[tokio::test]
    async fn test_create_and_list_newest_first() {
        let repo = InMemoryThreadRepository::new();
        repo.create_thread("first").await.unwrap();
        repo.create_thread("second").await.unwrap();

        let threads = repo.list_threads().await.unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].name, "second");
        assert_eq!(threads[1].name, "first");
    }

    #[tokio::test]
    async fn test_rename_round_trip() {
        let repo = InMemoryThreadRepository::new();
        let thread = repo.create_thread("New Chat").await.unwrap();

        repo.rename_thread(&thread.id, "Quarterly numbers")
            .await
            .unwrap();

        let threads = repo.list_threads().await.unwrap();
        assert_eq!(threads[0].name, "Quarterly numbers");

        assert!(repo.rename_thread("missing", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_removes_thread_and_messages() {
        let repo = InMemoryThreadRepository::new();
        let thread = repo.create_thread("doomed").await.unwrap();
        repo.append_message(&thread.id, Role::User, "hi", None)
            .await
            .unwrap();

        repo.delete_thread(&thread.id).await.unwrap();

        assert!(repo.list_threads().await.unwrap().is_empty());
        assert!(repo.list_messages(&thread.id).await.unwrap().is_empty());
        assert!(repo.delete_thread(&thread.id).await.is_err());
    }

    #[tokio::test]
    async fn test_append_assigns_durable_ids_and_keeps_order() {
        let repo = InMemoryThreadRepository::new();
        let thread = repo.create_thread("chat").await.unwrap();

        let first = repo
            .append_message(&thread.id, Role::User, "question", None)
            .await
            .unwrap();
        assert!(!first.is_provisional());

        let attachment = FileAttachment::new("a.txt", "text/plain", 4, "https://files.example/a.txt");
        let second = repo
            .append_message(&thread.id, Role::Assistant, "answer", Some(attachment))
            .await
            .unwrap();
        assert_eq!(second.kind, MessageKind::File);

        let messages = repo.list_messages(&thread.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "question");
        assert_eq!(messages[1].content, "answer");

        assert!(
            repo.append_message("missing", Role::User, "x", None)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_list_files_round_trip() {
        let repo = InMemoryThreadRepository::new();
        let thread = repo.create_thread("files").await.unwrap();
        repo.add_file(
            &thread.id,
            ThreadFile {
                name: "report.pdf".to_string(),
                url: "https://files.example/report.pdf".to_string(),
                media_type: "application/pdf".to_string(),
                uploaded_at: Utc::now(),
            },
        );

        let files = repo.list_files(&thread.id).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "report.pdf");
    }
}
