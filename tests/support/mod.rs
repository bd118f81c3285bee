//! Shared test doubles for integration tests.

use std::sync::Mutex;

use async_trait::async_trait;

use dlbridge_core::{BrowserControl, BrowserError, ConflictPolicy, DownloadId};

/// Every control call the engine made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCall {
    Cancel(DownloadId),
    Erase(DownloadId),
    SuggestFilename(DownloadId, String, ConflictPolicy),
    OpenInNewTab(String),
}

/// Browser fake that records calls and always succeeds.
#[derive(Default)]
pub struct RecordingBrowser {
    supports_suggestion: bool,
    calls: Mutex<Vec<BrowserCall>>,
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host variant that exposes the pre-creation naming callback.
    pub fn with_filename_suggestion() -> Self {
        Self {
            supports_suggestion: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<BrowserCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn open_tab_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BrowserCall::OpenInNewTab(_)))
            .count()
    }

    pub fn cancel_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BrowserCall::Cancel(_)))
            .count()
    }

    fn record(&self, call: BrowserCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl BrowserControl for RecordingBrowser {
    fn supports_filename_suggestion(&self) -> bool {
        self.supports_suggestion
    }

    async fn cancel(&self, id: DownloadId) -> Result<(), BrowserError> {
        self.record(BrowserCall::Cancel(id));
        Ok(())
    }

    async fn erase(&self, id: DownloadId) -> Result<(), BrowserError> {
        self.record(BrowserCall::Erase(id));
        Ok(())
    }

    async fn suggest_filename(
        &self,
        id: DownloadId,
        name: &str,
        conflict: ConflictPolicy,
    ) -> Result<(), BrowserError> {
        self.record(BrowserCall::SuggestFilename(id, name.to_string(), conflict));
        Ok(())
    }

    async fn open_in_new_tab(&self, url: &str) -> Result<(), BrowserError> {
        self.record(BrowserCall::OpenInNewTab(url.to_string()));
        Ok(())
    }
}
