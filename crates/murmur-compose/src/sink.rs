use murmur_types::models::FinalizedMessagePayload;
use tokio::sync::mpsc;
use tracing::warn;

/// Outbound transport. Fire-and-forget: delivery and acknowledgement are the
/// transport's business.
pub trait MessageSink: Send + Sync {
    fn send_message(&self, payload: FinalizedMessagePayload);
}

/// Sink that forwards payloads into a tokio channel drained by the transport.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<FinalizedMessagePayload>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FinalizedMessagePayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn send_message(&self, payload: FinalizedMessagePayload) {
        if self.tx.send(payload).is_err() {
            warn!("Transport channel closed, message dropped");
        }
    }
}
