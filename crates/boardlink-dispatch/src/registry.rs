//! Device registry: identity, credential verification, liveness.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use boardlink_core::error::{Error, Result};
use boardlink_storage::{DeviceRecord, DispatchStore};

/// Digest compared against when the device id is unknown, so that path
/// performs the same work as a real mismatch.
const DUMMY_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Owns device rows: registration, per-call credential checks, and the
/// `last_seen` / `last_request_time` liveness timestamps.
#[derive(Clone)]
pub struct DeviceRegistry {
    store: Arc<DispatchStore>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<DispatchStore>) -> Self {
        Self { store }
    }

    /// Hash a device secret for storage. Device secrets are high-entropy
    /// shared keys checked on every poll, so a single sha-256 pass is the
    /// right cost; operator passwords go through bcrypt instead.
    pub fn hash_secret(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Register a new device. Fails with `Conflict` when the id is taken,
    /// leaving the existing row untouched.
    pub fn register(&self, device_id: &str, secret: &str, owner: &str) -> Result<DeviceRecord> {
        let now = chrono::Utc::now().timestamp();
        let record = DeviceRecord {
            device_id: device_id.to_string(),
            secret_hash: Self::hash_secret(secret),
            owner: owner.to_string(),
            created_at: now,
            last_seen: now,
            last_request_time: None,
        };
        self.store.create_device(&record)?;
        tracing::info!(device_id, owner, "Device registered");
        Ok(record)
    }

    /// Check device credentials. Returns `false` -- never an error -- for
    /// both an unknown device and a wrong secret; the two cases are
    /// indistinguishable in shape and in timing (the unknown path still
    /// compares against a dummy digest).
    pub fn authenticate(&self, device_id: &str, secret: &str) -> Result<bool> {
        let device = self.store.get_device(device_id)?;
        let candidate = Self::hash_secret(secret);
        match device {
            Some(record) => Ok(constant_time_eq(
                candidate.as_bytes(),
                record.secret_hash.as_bytes(),
            )),
            None => {
                let _ = constant_time_eq(candidate.as_bytes(), DUMMY_HASH.as_bytes());
                Ok(false)
            }
        }
    }

    /// Update `last_seen`, and `last_request_time` when `requested` is set.
    /// Idempotent; unknown device is a no-op.
    pub fn touch(&self, device_id: &str, seen: i64, requested: Option<i64>) -> Result<bool> {
        Ok(self.store.touch_device(device_id, seen, requested)?)
    }

    pub fn get(&self, device_id: &str) -> Result<Option<DeviceRecord>> {
        Ok(self.store.get_device(device_id)?)
    }

    pub fn list(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self.store.list_devices()?)
    }

    /// Devices whose last check-in falls at or after `cutoff`.
    pub fn active_since(&self, cutoff: i64) -> Result<Vec<DeviceRecord>> {
        let mut devices = self.store.list_devices()?;
        devices.retain(|d| d.last_seen >= cutoff);
        Ok(devices)
    }

    /// Lookup that maps absence to `NotFound`, for admin endpoints.
    pub fn require(&self, device_id: &str) -> Result<DeviceRecord> {
        self.get(device_id)?
            .ok_or_else(|| Error::not_found(format!("device {}", device_id)))
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
