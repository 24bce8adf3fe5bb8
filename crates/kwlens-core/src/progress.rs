//! Progress reporting for long research runs.
//!
//! Events flow over a bounded channel the caller subscribes to. A dropped
//! receiver doubles as the cancellation signal: the pipeline checks
//! [`ProgressSender::is_cancelled`] between enhancement items and stops
//! early instead of burning provider quota on output nobody will read.

use serde::Serialize;
use tokio::sync::mpsc;

/// Pipeline phase attached to every progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    Extraction,
    Aggregation,
    OpportunityMining,
    GapAnalysis,
    Enhancement,
    Complete,
}

/// One progress checkpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: ResearchPhase,
    pub message: String,
    /// Overall completion in [0, 100] at fixed per-phase checkpoints.
    pub percent: u8,
    /// Optional structured payload (e.g. the product just collected).
    pub payload: Option<serde_json::Value>,
}

/// Non-blocking sender side of the progress channel.
///
/// `None` inside means the caller did not subscribe; all sends become no-ops
/// and cancellation never triggers.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSender {
    #[must_use]
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sender that discards every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit a checkpoint. Never blocks: if the channel is full or closed the
    /// event is dropped — progress is advisory, not load-bearing.
    pub fn send(&self, phase: ResearchPhase, message: impl Into<String>, percent: u8) {
        self.send_with_payload(phase, message, percent, None);
    }

    pub fn send_with_payload(
        &self,
        phase: ResearchPhase,
        message: impl Into<String>,
        percent: u8,
        payload: Option<serde_json::Value>,
    ) {
        if let Some(tx) = &self.tx {
            let event = ProgressEvent {
                phase,
                message: message.into(),
                percent: percent.min(100),
                payload,
            };
            if let Err(e) = tx.try_send(event) {
                tracing::debug!(error = %e, "progress event dropped");
            }
        }
    }

    /// True when the subscriber hung up. Checked between enhancement items.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.tx.as_ref().is_some_and(mpsc::Sender::is_closed)
    }
}

/// Percent checkpoint for the per-product extraction range (5–45).
#[must_use]
pub fn extraction_percent(product_index: usize, product_count: usize) -> u8 {
    if product_count == 0 {
        return 5;
    }
    let done = product_index + 1;
    #[allow(clippy::cast_precision_loss)]
    let span = 40.0 * (done as f64 / product_count as f64);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (5.0 + span).round() as u8;
    pct.min(45)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_percent_spans_five_to_forty_five() {
        assert_eq!(extraction_percent(0, 4), 15);
        assert_eq!(extraction_percent(3, 4), 45);
        assert_eq!(extraction_percent(0, 1), 45);
    }

    #[test]
    fn disabled_sender_is_never_cancelled() {
        let sender = ProgressSender::disabled();
        sender.send(ResearchPhase::Extraction, "start", 0);
        assert!(!sender.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_receiver_reads_as_cancelled() {
        let (tx, rx) = mpsc::channel(8);
        let sender = ProgressSender::new(tx);
        assert!(!sender.is_cancelled());
        drop(rx);
        assert!(sender.is_cancelled());
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = ProgressSender::new(tx);
        sender.send(ResearchPhase::Extraction, "one", 5);
        sender.send(ResearchPhase::Extraction, "two", 10);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.message, "one");
        assert!(rx.try_recv().is_err(), "second event should have been dropped");
    }
}
