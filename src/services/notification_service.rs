//! # Notification Subscriber
//!
//! Prints every status update broadcast on the notifications fan-out. Each
//! subscriber gets its own exclusive queue, so updates published while it is
//! down are not seen.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::KitchenResult;
use crate::messaging::{MessageConsumer, MessageHandler, NotificationTopology, StatusUpdateMessage};

/// Writes one line per status update to `out`
pub struct NotificationService<W: Write + Send + 'static = std::io::Stdout> {
    out: Mutex<W>,
}

impl NotificationService<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> NotificationService<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Subscribe and print until `cancel`
    pub async fn run(
        self: Arc<Self>,
        consumer: &MessageConsumer,
        cancel: CancellationToken,
    ) -> KitchenResult<()> {
        let topology = NotificationTopology::default();
        info!(exchange = %topology.exchange, "🔔 Notification subscriber listening");
        consumer.consume(&topology, self, cancel).await
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send + 'static> MessageHandler for NotificationService<W> {
    async fn handle(
        &self,
        _routing_key: &str,
        payload: &[u8],
        _cancel: &CancellationToken,
    ) -> KitchenResult<()> {
        let update = match StatusUpdateMessage::from_bytes(payload) {
            Ok(update) => update,
            Err(e) => {
                // Auto-acked; nothing to reject
                warn!(error = %e, "Dropping unreadable status update");
                return Ok(());
            }
        };

        info!(
            order_number = %update.order_number,
            old_status = %update.old_status,
            new_status = %update.new_status,
            changed_by = %update.changed_by,
            "📣 Status update received"
        );

        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{}", update.describe()).and_then(|()| out.flush()) {
            warn!(error = %e, "Failed to write notification");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{OrderStatus, OrderTransition};
    use chrono::Utc;

    #[tokio::test]
    async fn test_prints_described_update() {
        let service = NotificationService::new(Vec::new());
        let transition =
            OrderTransition::new(OrderStatus::Received, OrderStatus::Cooking, "chef_anna", Utc::now())
                .unwrap();
        let payload = StatusUpdateMessage::from_transition("ORD_20240115_001", &transition)
            .to_bytes()
            .unwrap();

        let cancel = CancellationToken::new();
        service.handle("", &payload, &cancel).await.unwrap();
        service.handle("", b"garbage", &cancel).await.unwrap();

        let printed = String::from_utf8(service.into_inner()).unwrap();
        assert_eq!(
            printed,
            "Notification for order ORD_20240115_001: Status changed from 'received' to 'cooking' by chef_anna\n"
        );
    }
}
