pub mod error;
pub mod http_thread_repository;
pub mod in_memory_repository;
pub mod thread_repository;

pub use error::{RepositoryResult, StoreError};
pub use http_thread_repository::HttpThreadRepository;
pub use in_memory_repository::InMemoryThreadRepository;
pub use thread_repository::{ThreadFile, ThreadRepository};
