//! Quota accounting and upload admission.
//!
//! Usage is always recomputed from the metadata store so that uploads and
//! deletes are visible to the very next check.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::db::Database;
use crate::{FilehostError, Result};

use super::metadata::FileRepository;
use super::{format_bytes, BYTES_PER_GB, FULL_THRESHOLD, WARNING_THRESHOLD};

/// How uploads are admitted against the quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionMode {
    /// Check a fresh snapshot only. Concurrent uploads may jointly overshoot
    /// capacity by at most the sizes of the uploads in flight.
    #[default]
    Snapshot,
    /// Serialize admission and reserve the declared size until the upload
    /// finishes, so in-flight uploads are counted against capacity.
    Reserved,
}

/// Bytes reserved by in-flight uploads in `Reserved` mode.
#[derive(Debug, Default)]
struct AdmissionGate {
    lock: Mutex<()>,
    reserved: AtomicU64,
}

/// Immutable quota settings shared by every component.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    capacity_bytes: u64,
    admission: AdmissionMode,
    gate: Option<Arc<AdmissionGate>>,
}

impl QuotaPolicy {
    /// Create a policy with a capacity in bytes.
    pub fn new(capacity_bytes: u64, admission: AdmissionMode) -> Self {
        let gate = match admission {
            AdmissionMode::Snapshot => None,
            AdmissionMode::Reserved => Some(Arc::new(AdmissionGate::default())),
        };

        Self {
            capacity_bytes,
            admission,
            gate,
        }
    }

    /// Create a policy with a capacity in binary gigabytes.
    pub fn from_gigabytes(gigabytes: u64, admission: AdmissionMode) -> Self {
        Self::new(gigabytes.saturating_mul(BYTES_PER_GB), admission)
    }

    /// Total capacity in bytes.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Admission mode.
    pub fn admission(&self) -> AdmissionMode {
        self.admission
    }

    /// Bytes currently reserved by in-flight uploads.
    pub fn reserved_bytes(&self) -> u64 {
        self.gate
            .as_ref()
            .map(|gate| gate.reserved.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

/// Point-in-time view of storage usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaSnapshot {
    /// Configured capacity in bytes.
    pub total_space: u64,
    /// Sum of the sizes of all live files.
    pub used_space: u64,
    /// Capacity minus used space. Negative when over capacity.
    pub available_space: i64,
    /// Used / capacity, or 0 when capacity is 0.
    pub usage_ratio: f64,
    /// Number of live files.
    pub file_count: u64,
}

impl QuotaSnapshot {
    fn new(total_space: u64, used_space: u64, file_count: u64) -> Self {
        let capacity = i64::try_from(total_space).unwrap_or(i64::MAX);
        let used = i64::try_from(used_space).unwrap_or(i64::MAX);
        let usage_ratio = if total_space == 0 {
            0.0
        } else {
            used_space as f64 / total_space as f64
        };

        Self {
            total_space,
            used_space,
            available_space: capacity.saturating_sub(used),
            usage_ratio,
            file_count,
        }
    }

    /// Usage as a percentage.
    pub fn usage_percentage(&self) -> f64 {
        self.usage_ratio * 100.0
    }

    /// Usage is at or above the warning threshold.
    pub fn is_warning(&self) -> bool {
        self.usage_ratio >= WARNING_THRESHOLD
    }

    /// Usage is at or above the full threshold.
    pub fn is_full(&self) -> bool {
        self.usage_ratio >= FULL_THRESHOLD
    }

    /// Check whether `size` more bytes fit within capacity.
    pub fn can_admit(&self, size: u64) -> bool {
        self.can_admit_with_reserved(size, 0)
    }

    fn can_admit_with_reserved(&self, size: u64, reserved: u64) -> bool {
        u128::from(self.used_space) + u128::from(reserved) + u128::from(size)
            <= u128::from(self.total_space)
    }

    pub fn formatted_total(&self) -> String {
        format_bytes(i64::try_from(self.total_space).unwrap_or(i64::MAX))
    }

    pub fn formatted_used(&self) -> String {
        format_bytes(i64::try_from(self.used_space).unwrap_or(i64::MAX))
    }

    pub fn formatted_available(&self) -> String {
        format_bytes(self.available_space)
    }
}

/// Permission to write an upload of a given size.
///
/// In `Reserved` mode the bytes stay counted against capacity until this
/// value is dropped.
#[derive(Debug)]
pub struct Admission {
    bytes: u64,
    gate: Option<Arc<AdmissionGate>>,
}

impl Admission {
    /// Size that was admitted.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if let Some(gate) = &self.gate {
            gate.reserved.fetch_sub(self.bytes, Ordering::AcqRel);
        }
    }
}

/// Computes usage and decides whether uploads fit.
pub struct QuotaAccountant<'a> {
    db: &'a Database,
    policy: &'a QuotaPolicy,
}

impl<'a> QuotaAccountant<'a> {
    /// Create a new QuotaAccountant.
    pub fn new(db: &'a Database, policy: &'a QuotaPolicy) -> Self {
        Self { db, policy }
    }

    /// Read current usage from the metadata store.
    pub async fn snapshot(&self) -> Result<QuotaSnapshot> {
        let repo = FileRepository::new(self.db.pool());
        let used = repo.total_size().await?;
        let count = repo.count().await?;

        Ok(QuotaSnapshot::new(
            self.policy.capacity_bytes,
            u64::try_from(used).unwrap_or(0),
            u64::try_from(count).unwrap_or(0),
        ))
    }

    /// Check whether an upload of `size` bytes fits right now.
    ///
    /// Advisory only: nothing is reserved.
    pub async fn can_admit(&self, size: u64) -> Result<bool> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.can_admit_with_reserved(size, self.policy.reserved_bytes()))
    }

    /// Admit an upload of `size` bytes or fail with `QuotaExceeded`.
    pub async fn admit(&self, size: u64) -> Result<Admission> {
        let Some(gate) = &self.policy.gate else {
            let snapshot = self.snapshot().await?;
            if !snapshot.can_admit(size) {
                return Err(self.rejected(size, &snapshot, 0));
            }
            return Ok(Admission {
                bytes: size,
                gate: None,
            });
        };

        // Held only for the check and the reservation, never for the write.
        // Reservations are read before usage: an upload that finishes in
        // between is then counted twice rather than not at all.
        let _guard = gate.lock.lock().await;
        let reserved = gate.reserved.load(Ordering::Acquire);
        let snapshot = self.snapshot().await?;

        if !snapshot.can_admit_with_reserved(size, reserved) {
            return Err(self.rejected(size, &snapshot, reserved));
        }

        gate.reserved.fetch_add(size, Ordering::AcqRel);
        debug!(size, reserved = reserved + size, "Reserved upload quota");

        Ok(Admission {
            bytes: size,
            gate: Some(Arc::clone(gate)),
        })
    }

    fn rejected(&self, size: u64, snapshot: &QuotaSnapshot, reserved: u64) -> FilehostError {
        let reserved = i64::try_from(reserved).unwrap_or(i64::MAX);
        let available = snapshot.available_space.saturating_sub(reserved);
        warn!(
            requested = size,
            available,
            used = snapshot.used_space,
            "Upload rejected: storage limit exceeded"
        );
        FilehostError::QuotaExceeded {
            requested: size,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::metadata::NewStoredFile;

    async fn insert(db: &Database, name: &str, size: i64) -> i64 {
        FileRepository::new(db.pool())
            .create(&NewStoredFile {
                original_name: name.to_string(),
                stored_name: name.to_string(),
                file_path: format!("/data/{name}"),
                file_size: size,
                content_type: None,
            })
            .await
            .unwrap()
            .id
    }

    #[test]
    fn test_from_gigabytes() {
        let policy = QuotaPolicy::from_gigabytes(10, AdmissionMode::Snapshot);
        assert_eq!(policy.capacity_bytes(), 10_737_418_240);
        assert_eq!(policy.admission(), AdmissionMode::Snapshot);
        assert_eq!(policy.reserved_bytes(), 0);
    }

    #[test]
    fn test_snapshot_zero_capacity() {
        let snapshot = QuotaSnapshot::new(0, 0, 0);
        assert_eq!(snapshot.usage_ratio, 0.0);
        assert!(!snapshot.is_warning());
        assert!(snapshot.can_admit(0));
        assert!(!snapshot.can_admit(1));
    }

    #[test]
    fn test_thresholds() {
        assert!(!QuotaSnapshot::new(100, 79, 1).is_warning());
        assert!(QuotaSnapshot::new(100, 80, 1).is_warning());
        assert!(!QuotaSnapshot::new(100, 80, 1).is_full());
        assert!(QuotaSnapshot::new(100, 95, 1).is_full());
        assert_eq!(QuotaSnapshot::new(200, 50, 1).usage_percentage(), 25.0);
    }

    #[test]
    fn test_negative_available_space() {
        let snapshot = QuotaSnapshot::new(100, 150, 2);
        assert_eq!(snapshot.available_space, -50);
        assert!(snapshot.is_full());
        assert!(!snapshot.can_admit(0));
        assert_eq!(snapshot.formatted_available(), "-50.0 B");
    }

    #[tokio::test]
    async fn test_snapshot_reflects_records() {
        let db = Database::open_in_memory().await.unwrap();
        let policy = QuotaPolicy::new(1000, AdmissionMode::Snapshot);
        let accountant = QuotaAccountant::new(&db, &policy);

        let empty = accountant.snapshot().await.unwrap();
        assert_eq!(empty.used_space, 0);
        assert_eq!(empty.available_space, 1000);
        assert_eq!(empty.file_count, 0);

        let id = insert(&db, "a", 300).await;
        insert(&db, "b", 200).await;
        let snapshot = accountant.snapshot().await.unwrap();
        assert_eq!(snapshot.used_space, 500);
        assert_eq!(snapshot.available_space, 500);
        assert_eq!(snapshot.file_count, 2);
        assert_eq!(snapshot.usage_ratio, 0.5);

        FileRepository::new(db.pool()).delete(id).await.unwrap();
        assert_eq!(accountant.snapshot().await.unwrap().used_space, 200);
    }

    #[tokio::test]
    async fn test_can_admit_boundaries() {
        let db = Database::open_in_memory().await.unwrap();
        let policy = QuotaPolicy::new(1000, AdmissionMode::Snapshot);
        let accountant = QuotaAccountant::new(&db, &policy);
        insert(&db, "a", 600).await;

        assert!(accountant.can_admit(400).await.unwrap());
        assert!(!accountant.can_admit(401).await.unwrap());
        assert!(accountant.can_admit(0).await.unwrap());
    }

    #[tokio::test]
    async fn test_admit_snapshot_mode() {
        let db = Database::open_in_memory().await.unwrap();
        let policy = QuotaPolicy::new(1000, AdmissionMode::Snapshot);
        let accountant = QuotaAccountant::new(&db, &policy);
        insert(&db, "a", 900).await;

        let admission = accountant.admit(100).await.unwrap();
        assert_eq!(admission.bytes(), 100);

        // Nothing is reserved, so a second admission still passes.
        assert!(accountant.admit(100).await.is_ok());

        match accountant.admit(101).await {
            Err(FilehostError::QuotaExceeded {
                requested,
                available,
            }) => {
                assert_eq!(requested, 101);
                assert_eq!(available, 100);
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_admit_reserved_mode() {
        let db = Database::open_in_memory().await.unwrap();
        let policy = QuotaPolicy::new(1000, AdmissionMode::Reserved);
        let accountant = QuotaAccountant::new(&db, &policy);

        let first = accountant.admit(600).await.unwrap();
        assert_eq!(policy.reserved_bytes(), 600);
        assert!(!accountant.can_admit(500).await.unwrap());

        let second = accountant.admit(500).await;
        assert!(matches!(
            second,
            Err(FilehostError::QuotaExceeded { available: 400, .. })
        ));

        let third = accountant.admit(400).await.unwrap();
        assert_eq!(policy.reserved_bytes(), 1000);

        drop(first);
        drop(third);
        assert_eq!(policy.reserved_bytes(), 0);
        assert!(accountant.admit(1000).await.is_ok());
    }

    #[test]
    fn test_admission_mode_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: AdmissionMode,
        }

        let w: Wrapper = toml::from_str("mode = \"reserved\"").unwrap();
        assert_eq!(w.mode, AdmissionMode::Reserved);
        let w: Wrapper = toml::from_str("mode = \"snapshot\"").unwrap();
        assert_eq!(w.mode, AdmissionMode::Snapshot);
        assert!(toml::from_str::<Wrapper>("mode = \"strict\"").is_err());
    }
}
