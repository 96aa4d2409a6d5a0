// src/progress.rs
//! Progress reporting channel shared by the orchestrator and the acquisition pipeline.

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::acquire::AcquisitionStatus;
use crate::types::AcquisitionMode;

/// Orchestration states. `Done` and `Errored` are terminal.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    RateLimitCheck,
    Acquiring,
    Prompting,
    Generating,
    Extracting,
    Done,
    Errored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    StageEntered(Stage),
    /// Emitted after each source, with the running totals.
    SourceProcessed {
        index: usize,
        url: String,
        mode: AcquisitionMode,
        status: AcquisitionStatus,
    },
}

/// Optional sender; a dropped receiver is not an error.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn none() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, ev: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(ev);
        }
    }
}
