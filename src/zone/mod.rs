//! DNS record persistence per zone ("zonefiles").
//!
//! Each zone's complete record set is serialized as one JSON array under a
//! storage key derived from the canonicalized zone name. Read-modify-write
//! sequences on a zonefile are serialized by a per-zone lock, so concurrent
//! ACME operations on the same zone never lose updates while operations on
//! different zones proceed in parallel.
//!
//! [`ZoneStore`] implements the three operations an ACME DNS-01 solver needs:
//! append, delete, and get. Within one zone at most one record may exist per
//! `id` and per `(name, type)` pair; append silently retains existing records
//! on conflict, and delete matches by the same keys.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::InMemoryStorage;

/// `DynStorage` is a shareable handle to a [`Storage`] backend.
pub type DynStorage = Arc<dyn Storage>;

/// Generic whole-blob storage, keyed by string. Backends may be file-based
/// ([`FileStorage`]) or in-memory ([`InMemoryStorage`]).
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Load the blob stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] if nothing is stored under the key;
    /// any other error is a real load failure.
    async fn load(&self, key: &str) -> Result<Vec<u8>, Error>;

    /// Store `value` under `key`, replacing any previous blob.
    async fn store(&self, key: &str, value: Vec<u8>) -> Result<(), Error>;
}

/// A generic DNS resource record as managed by ACME clients. Only `TXT`
/// records are ever synthesized on the wire; other types are carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    pub ttl: u32,
}

/// True if `existing` occupies the slot `target` addresses: same non-empty
/// `id`, or same `(name, type)` pair.
fn records_match(existing: &DnsRecord, target: &DnsRecord) -> bool {
    (!target.id.is_empty() && existing.id == target.id)
        || (existing.name == target.name && existing.record_type == target.record_type)
}

/// Append/delete/get for per-zone record sets, backed by a [`Storage`]
/// implementation. Cloning shares the backend and the lock map.
#[derive(Clone)]
pub struct ZoneStore {
    storage: DynStorage,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ZoneStore {
    #[must_use]
    pub fn new(storage: DynStorage) -> Self {
        Self {
            storage,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Append the records that don't conflict with existing ones, returning
    /// exactly the subset that was newly created. Appending an already
    /// present record is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the zonefile cannot be loaded (absence is not an
    /// error), decoded, or stored.
    pub async fn append_records(
        &self,
        zone: &str,
        new_records: &[DnsRecord],
    ) -> Result<Vec<DnsRecord>, Error> {
        let lock = self.zone_lock(zone).await;
        let result = {
            let _guard = lock.lock().await;
            self.append_locked(zone, new_records).await
        };
        drop(lock);
        self.release_zone_lock(zone).await;
        result
    }

    async fn append_locked(
        &self,
        zone: &str,
        new_records: &[DnsRecord],
    ) -> Result<Vec<DnsRecord>, Error> {
        let mut records = self.load_zonefile(zone).await?;
        let mut created = Vec::new();
        for candidate in new_records {
            if records.iter().any(|existing| records_match(existing, candidate)) {
                continue;
            }
            records.push(candidate.clone());
            created.push(candidate.clone());
        }

        self.store_zonefile(zone, &records).await?;
        Ok(created)
    }

    /// Remove every stored record matching a target by `id` or by
    /// `(name, type)`, returning the records actually removed. Unrelated
    /// records persist unchanged, exactly once.
    ///
    /// # Errors
    ///
    /// Returns an error if the zonefile cannot be loaded, decoded, or stored.
    pub async fn delete_records(
        &self,
        zone: &str,
        targets: &[DnsRecord],
    ) -> Result<Vec<DnsRecord>, Error> {
        let lock = self.zone_lock(zone).await;
        let result = {
            let _guard = lock.lock().await;
            self.delete_locked(zone, targets).await
        };
        drop(lock);
        self.release_zone_lock(zone).await;
        result
    }

    async fn delete_locked(
        &self,
        zone: &str,
        targets: &[DnsRecord],
    ) -> Result<Vec<DnsRecord>, Error> {
        let records = self.load_zonefile(zone).await?;
        let mut kept = Vec::with_capacity(records.len());
        let mut deleted = Vec::new();
        for existing in records {
            if targets.iter().any(|target| records_match(&existing, target)) {
                deleted.push(existing);
            } else {
                kept.push(existing);
            }
        }

        self.store_zonefile(zone, &kept).await?;
        Ok(deleted)
    }

    /// Return the zone's records; a zone with no zonefile yet yields an empty
    /// set, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing zonefile cannot be loaded or decoded.
    pub async fn get_records(&self, zone: &str) -> Result<Vec<DnsRecord>, Error> {
        let lock = self.zone_lock(zone).await;
        let result = {
            let _guard = lock.lock().await;
            self.load_zonefile(zone).await
        };
        drop(lock);
        self.release_zone_lock(zone).await;
        result
    }

    /// The advisory lock for a zone. Derived from the canonical zone name, so
    /// different spellings of the same zone serialize while distinct zones
    /// don't contend.
    async fn zone_lock(&self, zone: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(canonical_zone(zone)).or_default().clone()
    }

    /// Drop a zone's lock entry once no task holds a handle to it. Query
    /// names reach this store from the wire, so the map must stay bounded by
    /// in-flight operations, not by the set of names ever seen.
    async fn release_zone_lock(&self, zone: &str) {
        let key = canonical_zone(zone);
        let mut locks = self.locks.lock().await;
        if locks.get(&key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&key);
        }
    }

    async fn load_zonefile(&self, zone: &str) -> Result<Vec<DnsRecord>, Error> {
        match self.storage.load(&storage_key(zone)).await {
            Ok(zonefile) => Ok(serde_json::from_slice(&zonefile)?),
            Err(Error::KeyNotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    async fn store_zonefile(&self, zone: &str, records: &[DnsRecord]) -> Result<(), Error> {
        let zonefile = serde_json::to_vec(records)?;
        self.storage.store(&storage_key(zone), zonefile).await
    }
}

fn canonical_zone(zone: &str) -> String {
    zone.trim_end_matches('.').to_ascii_lowercase()
}

fn storage_key(zone: &str) -> String {
    format!("dns/{}", canonical_zone(zone))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ZoneStore {
        ZoneStore::new(Arc::new(InMemoryStorage::default()))
    }

    fn txt(id: &str, name: &str, value: &str) -> DnsRecord {
        DnsRecord {
            id: id.to_string(),
            name: name.to_string(),
            record_type: "TXT".to_string(),
            value: value.to_string(),
            ttl: 0,
        }
    }

    #[tokio::test]
    async fn append_is_idempotent() {
        let store = store();
        let rec = txt("", "_acme-challenge", "v1");

        let created = store.append_records("example.com.", &[rec.clone()]).await.unwrap();
        assert_eq!(created, vec![rec.clone()]);

        let created = store.append_records("example.com.", &[rec.clone()]).await.unwrap();
        assert!(created.is_empty());

        assert_eq!(store.get_records("example.com.").await.unwrap(), vec![rec]);
    }

    #[tokio::test]
    async fn append_retains_existing_record_on_name_type_conflict() {
        let store = store();
        let first = txt("", "_acme-challenge", "old");
        let second = txt("", "_acme-challenge", "new");

        store.append_records("z.test", &[first.clone()]).await.unwrap();
        let created = store.append_records("z.test", &[second]).await.unwrap();

        assert!(created.is_empty());
        assert_eq!(store.get_records("z.test").await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn append_matches_by_id_as_well() {
        let store = store();
        let first = txt("rec-1", "a", "1");
        let same_id = txt("rec-1", "b", "2");

        store.append_records("z.test", &[first.clone()]).await.unwrap();
        let created = store.append_records("z.test", &[same_id]).await.unwrap();

        assert!(created.is_empty());
        assert_eq!(store.get_records("z.test").await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn delete_removes_only_matching_records() {
        let store = store();
        let keep = txt("", "keep", "k");
        let by_name = txt("", "gone", "g");
        store
            .append_records("z.test", &[keep.clone(), by_name.clone()])
            .await
            .unwrap();

        let deleted = store
            .delete_records("z.test", &[txt("", "gone", "ignored-value")])
            .await
            .unwrap();

        assert_eq!(deleted, vec![by_name]);
        assert_eq!(store.get_records("z.test").await.unwrap(), vec![keep]);
    }

    #[tokio::test]
    async fn deleting_multiple_records_keeps_unrelated_records_once() {
        // Regression: a multi-candidate delete must not duplicate surviving
        // records.
        let store = store();
        let keep_a = txt("", "keep-a", "1");
        let keep_b = txt("", "keep-b", "2");
        let gone_a = txt("", "gone-a", "3");
        let gone_b = txt("", "gone-b", "4");
        store
            .append_records(
                "z.test",
                &[keep_a.clone(), gone_a.clone(), keep_b.clone(), gone_b.clone()],
            )
            .await
            .unwrap();

        let deleted = store
            .delete_records("z.test", &[gone_a.clone(), gone_b.clone()])
            .await
            .unwrap();

        assert_eq!(deleted, vec![gone_a, gone_b]);
        assert_eq!(
            store.get_records("z.test").await.unwrap(),
            vec![keep_a, keep_b]
        );
    }

    #[tokio::test]
    async fn unknown_zone_yields_empty_set() {
        let store = store();
        assert!(store.get_records("never-seen.test.").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zone_names_are_canonicalized() {
        let store = store();
        let rec = txt("", "_acme-challenge", "v");
        store.append_records("Example.COM.", &[rec.clone()]).await.unwrap();
        assert_eq!(store.get_records("example.com").await.unwrap(), vec![rec]);
    }

    #[tokio::test]
    async fn concurrent_appends_on_one_zone_lose_no_update() {
        let store = store();
        let mut tasks = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let rec = txt("", &format!("name-{i}"), "v");
                store.append_records("busy.test", &[rec]).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.get_records("busy.test").await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn zone_locks_do_not_accumulate_across_queries() {
        // Query names arrive from the wire, so the lock map must not retain
        // an entry per distinct zone ever asked about.
        let store = store();
        for i in 0..1_000 {
            store
                .get_records(&format!("spray-{i}.oast.example.com."))
                .await
                .unwrap();
        }
        store
            .append_records("kept.test", &[txt("", "a", "1")])
            .await
            .unwrap();

        assert!(store.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn contended_zone_lock_survives_until_all_holders_finish() {
        let store = store();
        let mut tasks = Vec::new();
        for i in 0..25 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .append_records("busy.test", &[txt("", &format!("n-{i}"), "v")])
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.get_records("busy.test").await.unwrap().len(), 25);
        assert!(store.locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn distinct_zones_do_not_share_records() {
        let store = store();
        store
            .append_records("one.test", &[txt("", "a", "1")])
            .await
            .unwrap();
        assert!(store.get_records("two.test").await.unwrap().is_empty());
    }
}
