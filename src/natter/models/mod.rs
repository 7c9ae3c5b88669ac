pub mod message;
pub mod notice;
pub mod send_state;
pub mod thread;
pub mod transcript;

pub use message::{FileAttachment, Message, MessageId, MessageKind, Role};
pub use notice::{Notice, NoticeLevel, NoticeStore};
pub use send_state::{CancelHandle, PendingSend, SendPhase, SendState};
pub use thread::{DEFAULT_THREAD_NAME, Thread, filter_threads};
pub use transcript::Transcript;
