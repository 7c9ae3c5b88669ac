//! Message-send orchestration
//!
//! Turns one submission (text and/or at most one attachment) into at most
//! one persisted user message, at most one persisted assistant message, and
//! a live-updating transcript. One send is admitted at a time; every exit
//! path resolves the pipeline back to idle.

use anyhow::{Context, Result};
use base64::Engine;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::natter::models::{
    DEFAULT_THREAD_NAME, FileAttachment, Message, NoticeStore, PendingSend, Role, SendState,
    Thread, Transcript, filter_threads,
};
use crate::natter::repositories::{ThreadFile, ThreadRepository};
use crate::natter::services::completion::{
    ChatTurn, CompletionClient, EMPTY_REPLY_FALLBACK, StreamOutcome, consume_stream,
};
use crate::natter::services::error::ServiceError;
use crate::natter::services::extraction::TextExtractor;
use crate::natter::services::image_gen::ImageGenerator;
use crate::natter::services::intent::{Intent, IntentClassifier, classify_default};
use crate::natter::services::preprocessor::{self, AttachmentKind, SelectedFile, StagedAttachment};
use crate::natter::services::storage::FileStorage;
use crate::natter::services::title::derive_title;
use crate::natter::services::vision::VisionAnalyzer;

/// Persisted as the assistant reply when image generation fails.
pub const IMAGE_GENERATION_FAILURE_REPLY: &str = "Failed to generate image.";

/// How a submission resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// User and assistant messages persisted.
    Completed,
    /// Stopped by the user; only the user message was persisted.
    Cancelled,
    /// Refused before any network call was made.
    Rejected,
    /// Aborted mid-branch; the notice store has the details.
    Failed,
}

/// The external services a send can touch.
pub struct Collaborators {
    pub completion: Arc<dyn CompletionClient>,
    pub storage: Arc<dyn FileStorage>,
    pub extraction: Arc<dyn TextExtractor>,
    pub vision: Arc<dyn VisionAnalyzer>,
    pub image_gen: Arc<dyn ImageGenerator>,
}

/// Receives assistant text as it is produced: streamed deltas during a
/// streaming reply, the whole reply at once for single-shot branches.
pub type DeltaSink = Arc<dyn Fn(&str) + Send + Sync>;

pub struct SendController {
    repo: Arc<dyn ThreadRepository>,
    collaborators: Collaborators,
    classify: IntentClassifier,
    streaming_enabled: bool,
    transcript: Mutex<Transcript>,
    send_state: Mutex<SendState>,
    active_thread: Mutex<Option<Thread>>,
    notices: NoticeStore,
    delta_sink: DeltaSink,
}

impl SendController {
    pub fn new(
        repo: Arc<dyn ThreadRepository>,
        collaborators: Collaborators,
        notices: NoticeStore,
    ) -> Self {
        Self {
            repo,
            collaborators,
            classify: classify_default,
            streaming_enabled: true,
            transcript: Mutex::new(Transcript::new()),
            send_state: Mutex::new(SendState::new()),
            active_thread: Mutex::new(None),
            notices,
            delta_sink: Arc::new(|_| {}),
        }
    }

    pub fn with_classifier(mut self, classify: IntentClassifier) -> Self {
        self.classify = classify;
        self
    }

    pub fn with_streaming(mut self, enabled: bool) -> Self {
        self.streaming_enabled = enabled;
        self
    }

    pub fn with_delta_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.delta_sink = Arc::new(sink);
        self
    }

    /// Submit one message. Errors are reported through the notice store;
    /// the returned outcome says how the send resolved.
    pub async fn send(&self, text: &str, attachment: Option<StagedAttachment>) -> SendOutcome {
        let text = text.trim().to_string();
        if text.is_empty() && attachment.is_none() {
            debug!("Empty submission, nothing to send");
            return SendOutcome::Rejected;
        }
        if let Some(staged) = &attachment {
            if let Err(validation) = preprocessor::validate(&staged.file) {
                warn!(file = %staged.file.name, error = %validation, "Attachment rejected");
                self.notices
                    .error("Attachment rejected", validation.to_string());
                return SendOutcome::Rejected;
            }
        }
        if !self.send_state.lock().try_begin() {
            debug!("A send is already in flight");
            self.notices.info(
                "Busy",
                "Wait for the current reply (or /stop it) before sending again.",
            );
            return SendOutcome::Rejected;
        }

        debug!(text = %text, has_attachment = attachment.is_some(), "Send admitted");
        let result = self.dispatch(text, attachment).await;
        self.send_state.lock().finish();

        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                error!(error = ?error, "Send aborted");
                self.notices.error("Send failed", format!("{:#}", error));
                SendOutcome::Failed
            }
        }
    }

    /// Ensures a thread exists, then routes the submission to its branch.
    /// When the thread is created here, the buffered submission is re-sent
    /// exactly once.
    async fn dispatch(
        &self,
        text: String,
        attachment: Option<StagedAttachment>,
    ) -> Result<SendOutcome> {
        let existing = self.active_thread.lock().clone();
        let thread = match existing {
            Some(thread) => thread,
            None => {
                debug!("No thread selected, creating one before the send");
                self.send_state
                    .lock()
                    .await_thread(PendingSend { text, attachment });
                let created = self
                    .repo
                    .create_thread(DEFAULT_THREAD_NAME)
                    .await
                    .context("Failed to create a thread")?;
                info!(thread_id = %created.id, "Thread created");
                *self.active_thread.lock() = Some(created.clone());

                let Some(pending) = self.send_state.lock().resume_pending() else {
                    debug!("Buffered submission vanished before resume");
                    return Ok(SendOutcome::Rejected);
                };
                return self.route(&created, pending.text, pending.attachment).await;
            }
        };
        self.route(&thread, text, attachment).await
    }

    async fn route(
        &self,
        thread: &Thread,
        text: String,
        attachment: Option<StagedAttachment>,
    ) -> Result<SendOutcome> {
        let prior = self.transcript.lock().committed();
        let had_no_history = prior.is_empty();

        match attachment {
            Some(staged) => {
                self.send_attachment(thread, &text, staged, prior, had_no_history)
                    .await
            }
            None => match (self.classify)(&text, false) {
                Intent::GenerateImage => {
                    self.send_image_generation(thread, &text, had_no_history)
                        .await
                }
                Intent::Conversation => {
                    self.send_plain(thread, &text, prior, had_no_history).await
                }
            },
        }
    }

    /// Plain text: persist the user message, then stream the reply.
    async fn send_plain(
        &self,
        thread: &Thread,
        text: &str,
        prior: Vec<Message>,
        had_no_history: bool,
    ) -> Result<SendOutcome> {
        debug!(thread_id = %thread.id, "Plain text send");

        let provisional = Message::user(text);
        let provisional_id = provisional.id.clone();
        if self.is_active(thread) {
            self.transcript.lock().push_provisional(provisional.clone());
        }

        let stored = self
            .repo
            .append_message(&thread.id, Role::User, text, None)
            .await;
        if stored.is_err() {
            self.transcript.lock().drop_provisional(&provisional_id);
        }
        stored.context("Failed to store the message")?;
        self.refresh_transcript(thread).await?;

        let mut history: Vec<ChatTurn> = prior.iter().map(ChatTurn::from_message).collect();
        history.push(ChatTurn::from_message(&provisional));

        match self.stream_reply(thread, history).await? {
            Some(reply) => {
                if had_no_history {
                    self.name_thread(thread, &reply).await;
                }
                Ok(SendOutcome::Completed)
            }
            None => Ok(SendOutcome::Cancelled),
        }
    }

    /// Image-generation intent: one request/response, no streaming. A
    /// generation failure becomes the fixed failure reply, not an abort.
    async fn send_image_generation(
        &self,
        thread: &Thread,
        prompt: &str,
        had_no_history: bool,
    ) -> Result<SendOutcome> {
        debug!(thread_id = %thread.id, "Image generation send");

        self.repo
            .append_message(&thread.id, Role::User, prompt, None)
            .await
            .context("Failed to store the image request")?;
        self.refresh_transcript(thread).await?;
        if had_no_history {
            self.name_thread(thread, prompt).await;
        }

        let reply = match self.collaborators.image_gen.generate(prompt).await {
            Ok(url) => {
                debug!(url = %url, "Image generated");
                url
            }
            Err(service_error) => {
                warn!(error = %service_error, "Image generation failed");
                IMAGE_GENERATION_FAILURE_REPLY.to_string()
            }
        };
        (self.delta_sink)(&reply);

        self.repo
            .append_message(&thread.id, Role::Assistant, &reply, None)
            .await
            .context("Failed to store the image reply")?;
        self.refresh_transcript(thread).await?;
        Ok(SendOutcome::Completed)
    }

    /// Attachment present: upload first, then dispatch on the attachment
    /// kind. An upload failure aborts the whole send with nothing persisted.
    async fn send_attachment(
        &self,
        thread: &Thread,
        text: &str,
        staged: StagedAttachment,
        prior: Vec<Message>,
        had_no_history: bool,
    ) -> Result<SendOutcome> {
        let file = &staged.file;
        debug!(
            thread_id = %thread.id,
            file = %file.name,
            size_bytes = file.size_bytes(),
            kind = ?file.kind(),
            "Attachment send"
        );

        let url = match self
            .collaborators
            .storage
            .upload(file.bytes.clone(), &file.name, &file.media_type)
            .await
        {
            Ok(url) => url,
            Err(service_error) => {
                error!(file = %file.name, error = %service_error, "Upload failed, send aborted");
                self.notices
                    .error("File upload failed", service_error.to_string());
                return Ok(SendOutcome::Failed);
            }
        };
        let record = FileAttachment::new(&file.name, &file.media_type, file.size_bytes(), url);

        if file.kind() == AttachmentKind::Image {
            return self
                .send_vision(thread, text, &staged, record, had_no_history)
                .await;
        }

        let extracted = match &staged.extracted_text {
            Some(text) => Some(text.clone()),
            None => self.extract_remote(file).await?,
        };
        let extracted = extracted.map(|text| preprocessor::truncate_extracted(&text));

        let display = format!("Attached file ({})\n{}", file.name, text);
        let mut provisional = Message::user(display.clone()).with_attachment(record.clone());
        if let Some(text) = &extracted {
            provisional = provisional.with_extracted_text(text);
        }
        let provisional_id = provisional.id.clone();
        if self.is_active(thread) {
            self.transcript.lock().push_provisional(provisional.clone());
        }

        let stored = self
            .repo
            .append_message(&thread.id, Role::User, &display, Some(record))
            .await;
        if stored.is_err() {
            self.transcript.lock().drop_provisional(&provisional_id);
        }
        stored.context("Failed to store the message")?;
        self.refresh_transcript(thread).await?;
        if had_no_history {
            self.name_thread(thread, &display).await;
        }

        // The refetched transcript loses the extracted text, so the wire
        // history is the pre-send snapshot plus the local copy of this turn.
        let mut history: Vec<ChatTurn> = prior.iter().map(ChatTurn::from_message).collect();
        history.push(ChatTurn::from_message(&provisional));

        match self.stream_reply(thread, history).await? {
            Some(_) => Ok(SendOutcome::Completed),
            None => Ok(SendOutcome::Cancelled),
        }
    }

    /// Image attachment: inline base64 to the vision service, then persist
    /// the exchange. Single-shot, both messages carry the file record.
    async fn send_vision(
        &self,
        thread: &Thread,
        text: &str,
        staged: &StagedAttachment,
        record: FileAttachment,
        had_no_history: bool,
    ) -> Result<SendOutcome> {
        let file = &staged.file;
        debug!(thread_id = %thread.id, file = %file.name, "Vision send");

        let encoded = base64::engine::general_purpose::STANDARD.encode(&file.bytes);
        let answer = self
            .collaborators
            .vision
            .analyze(encoded, text)
            .await
            .context("Vision analysis failed")?;
        (self.delta_sink)(&answer);

        let display = format!("Attached image ({})\n{}", file.name, text);
        self.repo
            .append_message(&thread.id, Role::User, &display, Some(record.clone()))
            .await
            .context("Failed to store the message")?;
        self.refresh_transcript(thread).await?;
        if had_no_history {
            self.name_thread(thread, &display).await;
        }

        self.repo
            .append_message(&thread.id, Role::Assistant, &answer, Some(record))
            .await
            .context("Failed to store the vision reply")?;
        self.refresh_transcript(thread).await?;
        Ok(SendOutcome::Completed)
    }

    /// Remote extraction for kinds the preprocessor left alone. An
    /// unsupported type degrades to no extracted text; any other failure
    /// aborts the send.
    async fn extract_remote(&self, file: &SelectedFile) -> Result<Option<String>> {
        debug!(file = %file.name, media_type = %file.media_type, "Requesting remote extraction");
        match self
            .collaborators
            .extraction
            .extract(file.bytes.clone(), &file.name, &file.media_type)
            .await
        {
            Ok(text) => Ok(Some(text)),
            Err(ServiceError::UnsupportedType(media_type)) => {
                warn!(file = %file.name, media_type = %media_type, "Extraction does not support this type");
                Ok(None)
            }
            Err(service_error) => Err(service_error).context("Text extraction failed"),
        }
    }

    /// Open the completion stream into a provisional assistant message.
    /// Returns the final reply text, or `None` when the user stopped it.
    async fn stream_reply(
        &self,
        thread: &Thread,
        history: Vec<ChatTurn>,
    ) -> Result<Option<String>> {
        let provisional = Message::assistant("");
        let provisional_id = provisional.id.clone();
        if self.is_active(thread) {
            self.transcript.lock().push_provisional(provisional);
        }

        let cancel = self.send_state.lock().start_streaming();
        debug!(
            thread_id = %thread.id,
            turns = history.len(),
            streaming = self.streaming_enabled,
            "Requesting completion"
        );

        let outcome = if self.streaming_enabled {
            match self
                .collaborators
                .completion
                .stream_chat(history, cancel.clone())
                .await
            {
                Ok(stream) => {
                    let mut accumulated = String::new();
                    consume_stream(stream, &cancel, |delta| {
                        accumulated.push_str(delta);
                        self.transcript
                            .lock()
                            .patch_provisional(&provisional_id, &accumulated);
                        (self.delta_sink)(delta);
                    })
                    .await
                }
                Err(service_error) => Err(service_error),
            }
        } else {
            match self.collaborators.completion.chat(history).await {
                Ok(text) => {
                    if cancel.is_cancelled() {
                        Ok(StreamOutcome::Cancelled)
                    } else {
                        let text = if text.is_empty() {
                            EMPTY_REPLY_FALLBACK.to_string()
                        } else {
                            text
                        };
                        self.transcript
                            .lock()
                            .patch_provisional(&provisional_id, &text);
                        (self.delta_sink)(&text);
                        Ok(StreamOutcome::Completed(text))
                    }
                }
                Err(service_error) => Err(service_error),
            }
        };

        match outcome {
            Ok(StreamOutcome::Completed(text)) => {
                let stored = self
                    .repo
                    .append_message(&thread.id, Role::Assistant, &text, None)
                    .await;
                self.transcript.lock().drop_provisional(&provisional_id);
                stored.context("Failed to store the assistant reply")?;
                self.refresh_transcript(thread).await?;
                Ok(Some(text))
            }
            Ok(StreamOutcome::Cancelled) => {
                self.transcript.lock().drop_provisional(&provisional_id);
                info!(thread_id = %thread.id, "Reply stopped by user");
                self.notices.info("Stopped", "AI response was stopped.");
                Ok(None)
            }
            Err(service_error) => {
                self.transcript.lock().drop_provisional(&provisional_id);
                Err(service_error).context("Completion request failed")
            }
        }
    }

    /// Replace the in-memory transcript with the store's canonical list,
    /// unless the user has switched away from this thread meanwhile.
    async fn refresh_transcript(&self, thread: &Thread) -> Result<()> {
        let messages = self
            .repo
            .list_messages(&thread.id)
            .await
            .context("Failed to refresh the transcript")?;
        if self.is_active(thread) {
            self.transcript.lock().replace_all(messages);
        }
        Ok(())
    }

    /// First-exchange naming side effect. Failure is logged, never fatal.
    async fn name_thread(&self, thread: &Thread, text: &str) {
        let name = derive_title(text);
        match self.repo.rename_thread(&thread.id, &name).await {
            Ok(()) => {
                debug!(thread_id = %thread.id, name = %name, "Thread named");
                if let Some(active) = self.active_thread.lock().as_mut() {
                    if active.id == thread.id {
                        active.name = name;
                    }
                }
            }
            Err(store_error) => {
                warn!(thread_id = %thread.id, error = %store_error, "Thread naming failed");
            }
        }
    }

    fn is_active(&self, thread: &Thread) -> bool {
        self.active_thread
            .lock()
            .as_ref()
            .map(|active| active.id == thread.id)
            .unwrap_or(false)
    }

    /// Request cancellation of the in-flight stream. Returns false when
    /// nothing is streaming.
    pub fn stop(&self) -> bool {
        let stopped = self.send_state.lock().request_cancel();
        if stopped {
            debug!("Cancel requested");
        } else {
            debug!("No stream to stop");
        }
        stopped
    }

    pub fn is_idle(&self) -> bool {
        self.send_state.lock().is_idle()
    }

    pub fn active_thread(&self) -> Option<Thread> {
        self.active_thread.lock().clone()
    }

    pub fn transcript_snapshot(&self) -> Vec<Message> {
        self.transcript.lock().messages().to_vec()
    }

    /// Clear the active thread; the next send creates a fresh one.
    pub fn new_chat(&self) {
        *self.active_thread.lock() = None;
        self.transcript.lock().clear();
        debug!("Active thread cleared");
    }

    pub async fn list_threads(&self) -> Result<Vec<Thread>> {
        self.repo.list_threads().await.context("Failed to list threads")
    }

    pub async fn search_threads(&self, query: &str) -> Result<Vec<Thread>> {
        let threads = self
            .repo
            .list_threads()
            .await
            .context("Failed to list threads")?;
        Ok(filter_threads(&threads, query).into_iter().cloned().collect())
    }

    pub async fn open_thread(&self, thread: &Thread) -> Result<()> {
        let messages = self
            .repo
            .list_messages(&thread.id)
            .await
            .context("Failed to load the thread")?;
        *self.active_thread.lock() = Some(thread.clone());
        self.transcript.lock().replace_all(messages);
        info!(thread_id = %thread.id, name = %thread.name, "Thread opened");
        Ok(())
    }

    pub async fn rename_active(&self, name: &str) -> Result<()> {
        let Some(thread) = self.active_thread.lock().clone() else {
            anyhow::bail!("No thread is open");
        };
        self.repo
            .rename_thread(&thread.id, name)
            .await
            .context("Failed to rename the thread")?;
        if let Some(active) = self.active_thread.lock().as_mut() {
            if active.id == thread.id {
                active.name = name.to_string();
            }
        }
        info!(thread_id = %thread.id, name = %name, "Thread renamed");
        Ok(())
    }

    pub async fn delete_active(&self) -> Result<()> {
        let Some(thread) = self.active_thread.lock().clone() else {
            anyhow::bail!("No thread is open");
        };
        self.repo
            .delete_thread(&thread.id)
            .await
            .context("Failed to delete the thread")?;
        self.new_chat();
        info!(thread_id = %thread.id, "Thread deleted");
        Ok(())
    }

    pub async fn list_active_files(&self) -> Result<Vec<ThreadFile>> {
        let Some(thread) = self.active_thread.lock().clone() else {
            anyhow::bail!("No thread is open");
        };
        self.repo
            .list_files(&thread.id)
            .await
            .context("Failed to list files")
    }
}
