use std::future::Future;
use std::pin::Pin;

pub mod completion;
pub mod error;
pub mod extraction;
pub mod image_gen;
pub mod intent;
pub mod preprocessor;
pub mod storage;
pub mod title;
pub mod vision;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use completion::{
    ChatTurn, CompletionClient, HttpCompletionClient, ResponseStream, StreamChunk,
};
pub use error::{ServiceError, ServiceResult};
pub use extraction::{HttpTextExtractor, TextExtractor};
pub use image_gen::{HttpImageGenerator, ImageGenerator};
pub use intent::{Intent, IntentClassifier, classify_default};
pub use preprocessor::{AttachmentKind, SelectedFile, StagedAttachment};
pub use storage::{FileStorage, HttpFileStorage};
pub use title::derive_title;
pub use vision::{HttpVisionAnalyzer, VisionAnalyzer};
