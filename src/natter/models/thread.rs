use serde::{Deserialize, Serialize};

/// Default display name given to a thread created lazily on first send.
pub const DEFAULT_THREAD_NAME: &str = "New Chat";

/// A named, persisted conversation. The id is opaque and store-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub name: String,
}

impl Thread {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Case-insensitive name filter used by thread search.
pub fn filter_threads<'a>(threads: &'a [Thread], query: &str) -> Vec<&'a Thread> {
    let needle = query.to_lowercase();
    threads
        .iter()
        .filter(|thread| thread.name.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_threads() -> Vec<Thread> {
        vec![
            Thread::new("t1", "Weekly Report"),
            Thread::new("t2", "New Chat"),
            Thread::new("t3", "report drafts"),
        ]
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let threads = sample_threads();
        let hits = filter_threads(&threads, "REPORT");
        let names: Vec<&str> = hits.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Weekly Report", "report drafts"]);
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let threads = sample_threads();
        assert_eq!(filter_threads(&threads, "").len(), threads.len());
    }

    #[test]
    fn test_no_match_returns_empty() {
        let threads = sample_threads();
        assert!(filter_threads(&threads, "budget").is_empty());
    }
}
