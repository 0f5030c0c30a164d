//! Device liveness stamping.
//!
//! Best effort: a failure here is logged and dropped, never returned.

use chrono::{DateTime, Utc};
use roll_core::store::AttendanceStore;
use uuid::Uuid;

/// Record that `device_id` performed a scan at `at`.
pub async fn stamp<S>(store: &S, device_id: Uuid, at: DateTime<Utc>)
where
  S: AttendanceStore,
{
  if let Err(e) = store.touch_device(device_id, at).await {
    tracing::warn!(%device_id, error = %e, "failed to update device last_seen");
  }
}

#[cfg(test)]
mod tests {
  use roll_core::endpoint::{DeviceKind, NewDevice};
  use roll_store_sqlite::SqliteStore;

  use super::*;

  #[tokio::test]
  async fn stamp_updates_last_seen() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let device = store
      .add_device(NewDevice {
        device_code: "DEV001".into(),
        device_name: "Gate scanner".into(),
        kind:        DeviceKind::Scanner,
      })
      .await
      .unwrap();

    stamp(&store, device.device_id, Utc::now()).await;

    let device = store.find_device("DEV001").await.unwrap().unwrap();
    assert!(device.last_seen.is_some());
  }

  #[tokio::test]
  async fn stamp_swallows_store_errors() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    // The store rejects unknown devices; the stamp must still return.
    stamp(&store, Uuid::new_v4(), Utc::now()).await;
  }
}
