use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::database::repository::WorkerRepository;
use crate::error::{KitchenError, KitchenResult};
use crate::models::{Worker, WorkerStatus};

const WORKER_COLUMNS: &str = "id, name, type, status, last_seen, orders_processed, created_at";

#[derive(Debug, Clone)]
pub struct PgWorkerRepository {
    pool: PgPool,
}

impl PgWorkerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkerRepository for PgWorkerRepository {
    async fn create_worker(&self, worker: &Worker) -> KitchenResult<Worker> {
        let query = format!(
            "INSERT INTO workers (name, type, status, last_seen, orders_processed, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {WORKER_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Worker>(&query)
            .bind(&worker.name)
            .bind(worker.specialization.to_string())
            .bind(worker.status.as_str())
            .bind(worker.last_seen)
            .bind(worker.orders_processed)
            .bind(worker.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn find_worker_by_name(&self, name: &str) -> KitchenResult<Option<Worker>> {
        let query = format!("SELECT {WORKER_COLUMNS} FROM workers WHERE name = $1");
        let worker = sqlx::query_as::<_, Worker>(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(worker)
    }

    async fn update_worker(&self, worker: &Worker) -> KitchenResult<()> {
        let updated = sqlx::query(
            "UPDATE workers SET type = $1, status = $2, last_seen = $3 WHERE name = $4",
        )
        .bind(worker.specialization.to_string())
        .bind(worker.status.as_str())
        .bind(worker.last_seen)
        .bind(&worker.name)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(KitchenError::WorkerNotFound(worker.name.clone()));
        }
        Ok(())
    }

    async fn touch_heartbeat(&self, name: &str, now: DateTime<Utc>) -> KitchenResult<()> {
        let updated = sqlx::query("UPDATE workers SET status = $1, last_seen = $2 WHERE name = $3")
            .bind(WorkerStatus::Online.as_str())
            .bind(now)
            .bind(name)
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(KitchenError::WorkerNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn list_workers(&self) -> KitchenResult<Vec<Worker>> {
        let query = format!("SELECT {WORKER_COLUMNS} FROM workers ORDER BY name");
        let workers = sqlx::query_as::<_, Worker>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(workers)
    }

    async fn increment_processed_count(&self, name: &str) -> KitchenResult<()> {
        let updated =
            sqlx::query("UPDATE workers SET orders_processed = orders_processed + 1 WHERE name = $1")
                .bind(name)
                .execute(&self.pool)
                .await?;

        if updated.rows_affected() == 0 {
            return Err(KitchenError::WorkerNotFound(name.to_string()));
        }
        Ok(())
    }
}
