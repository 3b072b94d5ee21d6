//! Low-confidence notification sink
//!
//! Flows that trip the hallucination guard are pushed to an optionally
//! injected sink so an external channel (dashboard, chat, ticket) can pick
//! them up. Delivery is strictly best-effort.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::NotifyError;
use crate::types::LowConfidenceNotice;

/// Receiver for hallucination-guard notifications
#[async_trait]
pub trait LowConfidenceSink: Send + Sync {
    /// Deliver one notice. Failures are swallowed and logged by the caller.
    async fn notify(&self, notice: &LowConfidenceNotice) -> Result<(), NotifyError>;
}

/// Shared handle to a sink implementation.
pub type SharedNoticeSink = Arc<dyn LowConfidenceSink>;

/// In-memory sink for tests and embedding callers
#[derive(Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<LowConfidenceNotice>>,
    fail_all: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail, to exercise the swallow path.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::Relaxed);
    }

    pub fn notices(&self) -> Vec<LowConfidenceNotice> {
        self.notices.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.notices.lock().len()
    }
}

#[async_trait]
impl LowConfidenceSink for RecordingSink {
    async fn notify(&self, notice: &LowConfidenceNotice) -> Result<(), NotifyError> {
        if self.fail_all.load(Ordering::Relaxed) {
            return Err(NotifyError::new("scripted sink failure"));
        }
        self.notices.lock().push(notice.clone());
        Ok(())
    }
}
