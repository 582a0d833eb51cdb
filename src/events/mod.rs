//! Domain events emitted by the completion flow.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

pub mod commit_hooks;

pub use commit_hooks::CommitHooks;

/// Events published once the work that produced them has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    CheckoutCompleted {
        checkout_token: Uuid,
        order_id: Uuid,
    },
    PaymentProcessed {
        payment_id: Uuid,
        success: bool,
    },
    ReservationsCreated {
        checkout_token: Uuid,
        count: usize,
    },
    StockAllocated {
        order_id: Uuid,
        units: i64,
    },
    VoucherUsageIncreased {
        code: String,
    },
    VoucherUsageReleased {
        code: String,
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

    /// Sends an event; a closed consumer is reported as an error string so
    /// callers can decide whether losing the event matters.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {e}"))
    }
}

/// Creates a connected sender/receiver pair with the given buffer.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains events and logs them. Real deployments replace this with a
/// queue-backed consumer.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "order created");
            }
            Event::CheckoutCompleted {
                checkout_token,
                order_id,
            } => {
                info!(checkout_token = %checkout_token, order_id = %order_id, "checkout completed");
            }
            other => debug!(event = ?other, "event processed"),
        }
    }
}
