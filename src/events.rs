use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    CheckoutCompleted {
        order_id: Uuid,
        external_id: String,
    },
    CheckoutFailed {
        external_id: String,
        reason: String,
    },
    InvoiceUpdated {
        invoice_id: Uuid,
        status: String,
    },
    PaymentReceived {
        order_id: Uuid,
        invoice_id: Uuid,
    },
    CartCleared {
        user_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging instead of failing when the receiver is
    /// gone — event delivery is never on the request's critical path.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("failed to send event: {}", e);
        }
    }
}

/// Creates an event channel pair with a bounded buffer.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains events, logging each one. Notification fan-out (email/SMS sinks)
/// hangs off this loop in deployments that carry it.
pub async fn run_event_logger(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        info!(?event, "event");
    }
}
