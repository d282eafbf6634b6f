use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::constants::GENERAL_WORKER_TYPE;
use crate::error::{KitchenError, KitchenResult};
use crate::models::order::OrderType;

/// Worker liveness as stored in the `workers` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Online,
    Offline,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Invalid worker status: {s}")),
        }
    }
}

impl TryFrom<String> for WorkerStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Order types a worker accepts; empty means every type
///
/// Stored as `general` or as a comma-joined list such as `dine_in,takeout`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialization(BTreeSet<OrderType>);

impl Specialization {
    /// Accept every order type
    pub fn general() -> Self {
        Self::default()
    }

    pub fn only(types: impl IntoIterator<Item = OrderType>) -> Self {
        Self(types.into_iter().collect())
    }

    pub fn accepts(&self, order_type: OrderType) -> bool {
        self.0.is_empty() || self.0.contains(&order_type)
    }

    pub fn is_general(&self) -> bool {
        self.0.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = OrderType> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for Specialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_general() {
            return f.write_str(GENERAL_WORKER_TYPE);
        }
        let joined = self
            .types()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

impl std::str::FromStr for Specialization {
    type Err = String;

    /// Parse `--order-types` style input: blank or `general` means all types
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == GENERAL_WORKER_TYPE {
            return Ok(Self::general());
        }

        trimmed
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<OrderType>)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }
}

impl TryFrom<String> for Specialization {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Kitchen worker identity and liveness
///
/// Maps to the `workers` table. One row per operator-assigned name, reused
/// across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Worker {
    pub id: i64,
    pub name: String,
    #[sqlx(rename = "type", try_from = "String")]
    pub specialization: Specialization,
    #[sqlx(try_from = "String")]
    pub status: WorkerStatus,
    pub last_seen: DateTime<Utc>,
    pub orders_processed: i64,
    pub created_at: DateTime<Utc>,
}

impl Worker {
    /// Register a new worker, online as of `now`
    pub fn new(
        name: impl Into<String>,
        specialization: Specialization,
        now: DateTime<Utc>,
    ) -> KitchenResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(KitchenError::validation("worker_name", "worker name is required"));
        }

        Ok(Self {
            id: 0,
            name,
            specialization,
            status: WorkerStatus::Online,
            last_seen: now,
            orders_processed: 0,
            created_at: now,
        })
    }

    /// Bring an existing row back online for a restarting process
    ///
    /// Fails if the stored status is still `online`: two live processes may
    /// not share a name.
    pub fn reactivate(
        &mut self,
        specialization: Specialization,
        now: DateTime<Utc>,
    ) -> KitchenResult<()> {
        if self.status == WorkerStatus::Online {
            return Err(KitchenError::WorkerAlreadyOnline(self.name.clone()));
        }
        self.status = WorkerStatus::Online;
        self.specialization = specialization;
        self.last_seen = now;
        Ok(())
    }

    pub fn record_heartbeat(&mut self, now: DateTime<Utc>) {
        self.status = WorkerStatus::Online;
        self.last_seen = now;
    }

    pub fn mark_offline(&mut self) {
        self.status = WorkerStatus::Offline;
    }

    /// Status as observers should see it
    ///
    /// A stored `online` whose heartbeat is older than `offline_after` is
    /// reported `offline`; the process most likely died without shutting down.
    pub fn effective_status(&self, now: DateTime<Utc>, offline_after: Duration) -> WorkerStatus {
        if self.status == WorkerStatus::Offline {
            return WorkerStatus::Offline;
        }
        let stale = chrono::Duration::from_std(offline_after)
            .map(|threshold| now.signed_duration_since(self.last_seen) > threshold)
            .unwrap_or(false);
        if stale {
            WorkerStatus::Offline
        } else {
            WorkerStatus::Online
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specialization_parsing() {
        assert!("".parse::<Specialization>().unwrap().is_general());
        assert!("general".parse::<Specialization>().unwrap().is_general());

        let spec: Specialization = "delivery, takeout".parse().unwrap();
        assert!(spec.accepts(OrderType::Delivery));
        assert!(spec.accepts(OrderType::Takeout));
        assert!(!spec.accepts(OrderType::DineIn));
        assert_eq!(spec.to_string(), "takeout,delivery");

        assert!("delivery,pizza".parse::<Specialization>().is_err());
    }

    #[test]
    fn test_general_accepts_everything() {
        let spec = Specialization::general();
        for order_type in OrderType::ALL {
            assert!(spec.accepts(order_type));
        }
        assert_eq!(spec.to_string(), "general");
    }

    #[test]
    fn test_reactivate_rejects_online_worker() {
        let now = Utc::now();
        let mut worker = Worker::new("chef_anna", Specialization::general(), now).unwrap();
        assert!(matches!(
            worker.reactivate(Specialization::general(), now),
            Err(KitchenError::WorkerAlreadyOnline(_))
        ));

        worker.mark_offline();
        worker
            .reactivate(Specialization::only([OrderType::Delivery]), now)
            .unwrap();
        assert_eq!(worker.status, WorkerStatus::Online);
        assert_eq!(worker.specialization.to_string(), "delivery");
    }

    #[test]
    fn test_effective_status_applies_liveness_threshold() {
        let now = Utc::now();
        let mut worker = Worker::new("chef_anna", Specialization::general(), now).unwrap();
        let threshold = Duration::from_secs(60);

        assert_eq!(worker.effective_status(now, threshold), WorkerStatus::Online);

        worker.last_seen = now - chrono::Duration::seconds(61);
        assert_eq!(worker.status, WorkerStatus::Online);
        assert_eq!(worker.effective_status(now, threshold), WorkerStatus::Offline);

        worker.record_heartbeat(now);
        worker.mark_offline();
        assert_eq!(worker.effective_status(now, threshold), WorkerStatus::Offline);
    }

    #[test]
    fn test_worker_requires_name() {
        assert!(Worker::new("  ", Specialization::general(), Utc::now()).is_err());
    }
}
