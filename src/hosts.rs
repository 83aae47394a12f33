//! Ephemeral hosts and capture ingestion.
//!
//! A host is a randomly minted subdomain of the configured base hostname.
//! Inbound HTTP traffic addressed to a host's hostname is recorded verbatim as
//! a capture-log entry attributed to that host; traffic for hostnames nobody
//! owns is dropped.

use crate::error::Error;
use crate::id::IdGenerator;
use crate::store::DynDatabase;
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use std::fmt::Write;
use std::sync::Arc;
use ulid::Ulid;

/// Number of random bytes appended (hex-encoded) to generated hostnames.
const HOST_HASH_LENGTH: usize = 4;

/// Accepted batch size for host creation.
pub const MAX_HOSTS_PER_BATCH: i64 = 50;

/// Maximum number of host IDs a single capture-log listing may filter by.
pub const MAX_LIST_HOST_IDS: usize = 20;

/// An ephemeral host. Both fields are immutable once created, and the
/// hostname maps to exactly one ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: Ulid,
    pub hostname: String,
}

/// One captured HTTP request/response pair, attributed to a host.
///
/// The wire bytes are stored exactly as captured and are never normalized at
/// write time, so storage integrity does not depend on a parser's fidelity.
/// The ID doubles as the creation timestamp.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureEntry {
    pub id: Ulid,
    pub host_id: Ulid,
    #[serde_as(as = "Base64")]
    pub raw_request: Vec<u8>,
    #[serde_as(as = "Base64")]
    pub raw_response: Vec<u8>,
}

/// Orchestrates hostname generation and capture ingestion on top of the
/// record store. Holds no state of its own; everything round-trips through
/// the database.
pub struct HostService {
    base_hostname: String,
    database: DynDatabase,
    ids: Arc<IdGenerator>,
}

impl HostService {
    #[must_use]
    pub fn new(base_hostname: String, database: DynDatabase, ids: Arc<IdGenerator>) -> Self {
        Self {
            base_hostname,
            database,
            ids,
        }
    }

    /// Create `amount` hosts (1..=50), each with a unique
    /// `<two-word-slug>-<hex>.<base-hostname>` hostname.
    ///
    /// The batch-so-far is persisted after every host, so partial progress is
    /// durable if a later iteration fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHostAmount`] for an out-of-range amount,
    /// before any storage mutation.
    pub async fn create_hosts(&self, amount: i64) -> Result<Vec<Host>, Error> {
        if !(1..=MAX_HOSTS_PER_BATCH).contains(&amount) {
            return Err(Error::InvalidHostAmount(amount));
        }

        #[allow(clippy::cast_sign_loss)]
        let mut hosts = Vec::with_capacity(amount as usize);
        for _ in 0..amount {
            let rand_bytes: [u8; HOST_HASH_LENGTH] = rand::random();
            let slug = petname::petname(2, "-").ok_or(Error::HostnameGeneration)?;
            let hostname = format!(
                "{}-{}.{}",
                slug,
                hex_encode(&rand_bytes),
                self.base_hostname
            );

            hosts.push(Host {
                id: self.ids.generate()?,
                hostname,
            });
            self.database.store_hosts(&hosts).await?;
        }

        Ok(hosts)
    }

    /// Record a captured HTTP exchange for the host owning `hostname`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostNotFound`] (writing nothing) if no host owns the
    /// hostname.
    pub async fn store_capture_entry(
        &self,
        hostname: &str,
        raw_request: Vec<u8>,
        raw_response: Vec<u8>,
    ) -> Result<CaptureEntry, Error> {
        let hostname = hostname.split(':').next().unwrap_or(hostname);
        let host = self.database.find_host_by_hostname(hostname).await?;

        let entry = CaptureEntry {
            id: self.ids.generate()?,
            host_id: host.id,
            raw_request,
            raw_response,
        };
        self.database.store_capture_entry(&entry).await?;

        tracing::info!(
            id = %entry.id,
            host_id = %entry.host_id,
            %hostname,
            "stored capture entry"
        );

        Ok(entry)
    }

    /// List capture entries for 1..=20 host IDs. Duplicate IDs are collapsed,
    /// preserving first-occurrence order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHostIdCount`] when given no IDs or more than
    /// twenty.
    pub async fn list_capture_entries(
        &self,
        host_ids: &[Ulid],
    ) -> Result<Vec<CaptureEntry>, Error> {
        if host_ids.is_empty() || host_ids.len() > MAX_LIST_HOST_IDS {
            return Err(Error::InvalidHostIdCount(host_ids.len()));
        }

        let mut unique: Vec<Ulid> = Vec::with_capacity(host_ids.len());
        for id in host_ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }

        self.database.list_capture_entries(&unique).await
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
