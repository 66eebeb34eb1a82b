use crate::clock::ClockHandle;
use crate::funding::monitor::FundingMonitorHandle;
use crate::funding::types::FundingStatusSnapshot;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// Top-level runtime state: task handles plus the shared funding status
/// store the UI layer reads for diagnostics.
pub struct AlerterState {
    pub started_at: Instant,
    pub funding_monitor: Mutex<Option<FundingMonitorHandle>>,
    pub clock: Mutex<Option<ClockHandle>>,
    pub funding_status: Arc<RwLock<FundingStatusSnapshot>>,
}

impl Default for AlerterState {
    fn default() -> Self {
        Self::new()
    }
}

impl AlerterState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            funding_monitor: Mutex::new(None),
            clock: Mutex::new(None),
            funding_status: Arc::new(RwLock::new(FundingStatusSnapshot::idle())),
        }
    }

    /// Stops both engines, awaiting their tasks.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.funding_monitor.lock().await.take() {
            handle.shutdown().await;
        }
        if let Some(handle) = self.clock.lock().await.take() {
            handle.shutdown().await;
        }
    }
}
