use crate::natter::services::preprocessor::StagedAttachment;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Phase of the message-send pipeline. A new send is admitted only from
/// `Idle`; every exit path resolves back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    AwaitingThread,
    Sending,
    Streaming,
    Cancelling,
}

impl Default for SendPhase {
    fn default() -> Self {
        SendPhase::Idle
    }
}

/// Shared cooperative cancellation flag for one in-flight streaming call.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A submission buffered while thread creation is in flight.
#[derive(Debug)]
pub struct PendingSend {
    pub text: String,
    pub attachment: Option<StagedAttachment>,
}

/// Send-pipeline state: current phase, the cancel handle for the active
/// stream, and at most one buffered submission awaiting a new thread.
#[derive(Debug, Default)]
pub struct SendState {
    phase: SendPhase,
    cancel: Option<CancelHandle>,
    pending: Option<PendingSend>,
}

impl SendState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == SendPhase::Idle
    }

    /// Admit a new send. Returns false while another send is in flight.
    pub fn try_begin(&mut self) -> bool {
        if self.phase == SendPhase::Idle {
            self.phase = SendPhase::Sending;
            true
        } else {
            false
        }
    }

    /// Buffer a submission and wait for thread creation to complete.
    pub fn await_thread(&mut self, pending: PendingSend) {
        self.phase = SendPhase::AwaitingThread;
        self.pending = Some(pending);
    }

    /// Take the buffered submission after the thread exists, moving the
    /// pipeline back into `Sending`. Returns `None` if nothing was buffered.
    pub fn resume_pending(&mut self) -> Option<PendingSend> {
        let pending = self.pending.take();
        if pending.is_some() {
            self.phase = SendPhase::Sending;
        }
        pending
    }

    /// Enter the streaming phase, minting the cancel handle for this call.
    pub fn start_streaming(&mut self) -> CancelHandle {
        let handle = CancelHandle::new();
        self.cancel = Some(handle.clone());
        self.phase = SendPhase::Streaming;
        handle
    }

    /// Request cancellation of the active stream. Returns false when no
    /// stream is in flight.
    pub fn request_cancel(&mut self) -> bool {
        if self.phase != SendPhase::Streaming {
            return false;
        }
        if let Some(handle) = &self.cancel {
            handle.cancel();
        }
        self.phase = SendPhase::Cancelling;
        true
    }

    /// Resolve the pipeline back to `Idle`, clearing the cancel handle and
    /// any buffered submission. Called on every exit path.
    pub fn finish(&mut self) {
        self.phase = SendPhase::Idle;
        self.cancel = None;
        self.pending = None;
    }
}
