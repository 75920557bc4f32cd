//! Activity store doubles

use async_trait::async_trait;
use relay_core::StoreError;
use relay_store::{ActivityRecord, ActivityStore, LogRecord};
use std::sync::Mutex;
use std::time::Duration;

/// Store double that keeps every row in memory.
#[derive(Default)]
pub struct MemoryStore {
    activities: Mutex<Vec<ActivityRecord>>,
    logs: Mutex<Vec<LogRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activities(&self) -> Vec<ActivityRecord> {
        self.activities.lock().expect("activities lock").clone()
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.logs.lock().expect("logs lock").clone()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn record_activity(&self, activity: ActivityRecord) -> Result<(), StoreError> {
        self.activities.lock().expect("activities lock").push(activity);
        Ok(())
    }

    async fn record_log(&self, log: LogRecord) -> Result<(), StoreError> {
        self.logs.lock().expect("logs lock").push(log);
        Ok(())
    }

    async fn health_check(&self) -> Result<Duration, StoreError> {
        Ok(Duration::from_micros(10))
    }
}

/// Store double that silently drops everything, for tests running with
/// the log disabled.
#[derive(Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl ActivityStore for NullStore {
    async fn record_activity(&self, _activity: ActivityRecord) -> Result<(), StoreError> {
        Ok(())
    }

    async fn record_log(&self, _log: LogRecord) -> Result<(), StoreError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<Duration, StoreError> {
        Ok(Duration::ZERO)
    }
}

/// Store double simulating a hard outage: every call fails.
#[derive(Default, Clone, Copy)]
pub struct FailingStore;

#[async_trait]
impl ActivityStore for FailingStore {
    async fn record_activity(&self, _activity: ActivityRecord) -> Result<(), StoreError> {
        Err(StoreError::InsertFailed {
            table: "activities",
            reason: "simulated outage".to_string(),
        })
    }

    async fn record_log(&self, _log: LogRecord) -> Result<(), StoreError> {
        Err(StoreError::InsertFailed {
            table: "logs",
            reason: "simulated outage".to_string(),
        })
    }

    async fn health_check(&self) -> Result<Duration, StoreError> {
        Err(StoreError::HealthCheckFailed {
            reason: "simulated outage".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::MessageKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_keeps_rows() {
        let store = MemoryStore::new();
        store
            .record_activity(ActivityRecord::new(
                "human",
                "chatter",
                MessageKind::Question,
                json!({"content": "hi"}),
            ))
            .await
            .expect("insert");
        assert_eq!(store.activities().len(), 1);
        assert_eq!(store.activities()[0].from_agent, "human");
    }

    #[tokio::test]
    async fn test_failing_store_always_errors() {
        let store = FailingStore;
        assert!(store.health_check().await.is_err());
        assert!(store
            .record_log(LogRecord::new("x", relay_store::LogLevel::Info, "m"))
            .await
            .is_err());
    }
}
