use crate::funding::types::{FundingAlertPayload, FundingStatusSnapshot};
use tokio::sync::mpsc;

/// Events crossing from worker tasks to the single-threaded consumer.
/// Workers never touch consumer-side state directly; everything rides this
/// channel.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Alert-grade funding match (exact minute target).
    FundingAlert(FundingAlertPayload),
    /// Informational threshold pass inside the log window.
    FundingLog(FundingAlertPayload),
    /// Per-cycle diagnostics summary.
    FundingStatus(FundingStatusSnapshot),
    /// Human-readable candle-close notification.
    CandleClose(String),
}

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
