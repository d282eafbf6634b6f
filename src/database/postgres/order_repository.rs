use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use crate::constants::actors;
use crate::database::repository::{format_order_number, utc_day_bounds, OrderRepository};
use crate::error::KitchenResult;
use crate::models::{Order, OrderItem, StatusLogEntry};
use crate::state_machine::{OrderStatus, OrderTransition};

const ORDER_COLUMNS: &str = "id, number, customer_name, type, table_number, delivery_address, \
     total_amount, priority, status, processed_by, created_at, updated_at, completed_at";

#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_id: i64) -> Result<Vec<OrderItem>, sqlx::Error> {
        sqlx::query_as::<_, OrderItem>(
            "SELECT name, quantity, price FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn generate_order_number(&self, now: DateTime<Utc>) -> KitchenResult<String> {
        let (start, end) = utc_day_bounds(now);
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE created_at >= $1 AND created_at < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(format_order_number(now, count + 1))
    }

    async fn create_order(&self, order: &Order) -> KitchenResult<Order> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                number, customer_name, type, table_number, delivery_address,
                total_amount, priority, status, processed_by,
                created_at, updated_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(&order.number)
        .bind(&order.customer_name)
        .bind(order.order_type.as_str())
        .bind(order.table_number)
        .bind(&order.delivery_address)
        .bind(order.total_amount)
        .bind(order.priority.value())
        .bind(order.status.as_str())
        .bind(&order.processed_by)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.completed_at)
        .fetch_one(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, name, quantity, price) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(position as i32)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO order_status_log (order_id, status, changed_by, changed_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(OrderStatus::Received.as_str())
        .bind(actors::ORDER_SERVICE)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(order_number = %order.number, order_id = id, "Order row inserted");
        Ok(Order {
            id,
            ..order.clone()
        })
    }

    async fn find_order_by_number(&self, number: &str) -> KitchenResult<Option<Order>> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE number = $1");
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        match order {
            Some(mut order) => {
                order.items = self.load_items(order.id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn update_order_status(
        &self,
        order: &Order,
        transition: &OrderTransition,
    ) -> KitchenResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, processed_by = $2, updated_at = $3, completed_at = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(transition.to.as_str())
        .bind(&order.processed_by)
        .bind(order.updated_at)
        .bind(order.completed_at)
        .bind(order.id)
        .bind(transition.from.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO order_status_log (order_id, status, changed_by, changed_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order.id)
        .bind(transition.to.as_str())
        .bind(&transition.changed_by)
        .bind(transition.at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_status_history(&self, order_id: i64) -> KitchenResult<Vec<StatusLogEntry>> {
        let entries = sqlx::query_as::<_, StatusLogEntry>(
            "SELECT id, order_id, status, changed_by, changed_at, notes \
             FROM order_status_log WHERE order_id = $1 ORDER BY changed_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
