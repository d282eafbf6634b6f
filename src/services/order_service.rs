//! # Order Intake
//!
//! Validates a request, persists the order with its initial log row, and
//! publishes it to the kitchen. An order that cannot be published fails the
//! request; the row stays `received` and a client retry creates a new order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::constants::actors;
use crate::database::OrderRepository;
use crate::error::KitchenResult;
use crate::logging::log_order_operation;
use crate::messaging::{MessagePublisher, OrderMessage};
use crate::models::{Order, OrderRequest};
use crate::utils::SharedClock;

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    publisher: Arc<MessagePublisher>,
    clock: SharedClock,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService")
            .field("publisher", &self.publisher)
            .finish()
    }
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        publisher: Arc<MessagePublisher>,
        clock: SharedClock,
    ) -> Self {
        Self {
            orders,
            publisher,
            clock,
        }
    }

    pub async fn create_order(
        &self,
        request: OrderRequest,
        cancel: &CancellationToken,
    ) -> KitchenResult<Order> {
        let draft = request.into_new_order()?;

        let now = self.clock.now();
        let number = self.orders.generate_order_number(now).await?;
        let order = self
            .orders
            .create_order(&Order::new(number, draft, now))
            .await?;

        log_order_operation(
            "create",
            &order.number,
            order.status.as_str(),
            Some(actors::ORDER_SERVICE),
            Some(&format!(
                "type={} priority={} total={:.2}",
                order.order_type, order.priority, order.total_amount
            )),
        );

        if let Err(e) = self
            .publisher
            .publish_order(&OrderMessage::from_order(&order), cancel)
            .await
        {
            error!(
                order_number = %order.number,
                classification = %e.failure_class(),
                error = %e,
                "Order persisted but not published"
            );
            return Err(e);
        }

        Ok(order)
    }
}
