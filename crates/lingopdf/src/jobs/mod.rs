//! Job orchestration: submission, progress, cancellation, retention.

mod orchestrator;

pub use orchestrator::{JobOrchestrator, PipelineClients};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{LingoError, Result};

/// Cooperative cancellation token shared by all sub-tasks of one job.
///
/// Stages poll it at every suspension point; in-flight HTTP calls may
/// still complete, their results are discarded.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Bail out with `CANCELLED` if the flag is set.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(LingoError::Cancelled)
        } else {
            Ok(())
        }
    }
}
