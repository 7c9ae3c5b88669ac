use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Oldest notices are evicted once the store holds this many.
const MAX_NOTICES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient user-facing status line. Notices never enter the transcript.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded FIFO store of notices, shared between the orchestrator and the
/// front end.
#[derive(Debug, Clone, Default)]
pub struct NoticeStore {
    inner: Arc<Mutex<VecDeque<Notice>>>,
}

impl NoticeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: NoticeLevel, title: impl Into<String>, detail: impl Into<String>) {
        let mut entries = self.inner.lock();
        entries.push_back(Notice {
            level,
            title: title.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        });
        while entries.len() > MAX_NOTICES {
            entries.pop_front();
        }
    }

    pub fn info(&self, title: impl Into<String>, detail: impl Into<String>) {
        self.push(NoticeLevel::Info, title, detail);
    }

    pub fn warning(&self, title: impl Into<String>, detail: impl Into<String>) {
        self.push(NoticeLevel::Warning, title, detail);
    }

    pub fn error(&self, title: impl Into<String>, detail: impl Into<String>) {
        self.push(NoticeLevel::Error, title, detail);
    }

    /// Remove and return every pending notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        self.inner.lock().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.inner
            .lock()
            .iter()
            .filter(|notice| notice.level == NoticeLevel::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_oldest_first_and_empties() {
        let store = NoticeStore::new();
        store.info("first", "");
        store.error("second", "boom");

        let drained = store.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].title, "first");
        assert_eq!(drained[1].title, "second");
        assert!(store.is_empty());
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let store = NoticeStore::new();
        for i in 0..(MAX_NOTICES + 5) {
            store.info(format!("notice {}", i), "");
        }
        let drained = store.drain();
        assert_eq!(drained.len(), MAX_NOTICES);
        assert_eq!(drained[0].title, "notice 5");
    }

    #[test]
    fn test_error_count_ignores_other_levels() {
        let store = NoticeStore::new();
        store.info("fyi", "");
        store.error("bad", "");
        store.warning("meh", "");
        assert_eq!(store.error_count(), 1);
    }
}
