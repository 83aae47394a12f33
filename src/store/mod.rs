//! Durable storage for hosts and captured HTTP interactions.
//!
//! All records live in a single flat, byte-ordered key space inside one
//! embedded transactional store. The first key byte packs two nibbles: the
//! high nibble selects the entity kind, the low nibble selects the primary
//! record (`0x0`) or one of its secondary indexes. The rest of the key is the
//! entity's 16-byte ULID for primary records, or the indexed field bytes
//! followed by the ULID for index entries, so that a prefix scan over the
//! indexed field enumerates matching IDs in order.
//!
//! Secondary-index maintenance is this layer's responsibility: a primary
//! record and its index entries are always written in one transaction, and
//! reads run inside one snapshot, so no observer ever sees one without the
//! other.

use crate::error::Error;
use crate::hosts::{CaptureEntry, Host};
use ulid::Ulid;

pub mod redb;

pub use self::redb::RedbDatabase;

use std::sync::Arc;

/// `DynDatabase` is a shareable handle to a [`Database`] implementation,
/// passed to every listener task.
pub type DynDatabase = Arc<dyn Database>;

pub(crate) const HOST_KEY_PREFIX: u8 = 0x00;
pub(crate) const HOST_HOSTNAME_INDEX: u8 = 0x01;

pub(crate) const CAPTURE_KEY_PREFIX: u8 = 0x10;
pub(crate) const CAPTURE_HOST_ID_INDEX: u8 = 0x11;

/// Secondary index keys use the last 4 bits of the first key byte.
pub(crate) const INDEX_KEY_MASK: u8 = 0x0F;

/// Separator between the hostname bytes and the host ID in hostname-index
/// keys.
pub(crate) const HOSTNAME_INDEX_SEPARATOR: u8 = b'#';

/// Typed CRUD over the record store.
#[async_trait::async_trait]
pub trait Database: Send + Sync {
    /// Store one or more hosts, each with its hostname-index entry, in a
    /// single atomic transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHostBatch`] for an empty batch, or a storage
    /// error if encoding or the transaction fails.
    async fn store_hosts(&self, hosts: &[Host]) -> Result<(), Error>;

    /// Look up a host by its primary key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostNotFound`] if no such host exists.
    async fn find_host_by_id(&self, host_id: Ulid) -> Result<Host, Error>;

    /// Look up a host through the hostname index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostNotFound`] if no host owns the hostname.
    async fn find_host_by_hostname(&self, hostname: &str) -> Result<Host, Error>;

    /// Store a capture-log entry and its host-ID index entry atomically.
    async fn store_capture_entry(&self, entry: &CaptureEntry) -> Result<(), Error>;

    /// List capture-log entries for the given host IDs.
    ///
    /// Results are grouped per requested host ID, in the order the IDs were
    /// supplied; within one host ID, entries come back in insertion order. No
    /// ordering is promised across different host IDs beyond that grouping.
    async fn list_capture_entries(&self, host_ids: &[Ulid]) -> Result<Vec<CaptureEntry>, Error>;
}

/// Build a record key: one packed prefix/index byte followed by the payload.
pub(crate) fn entry_key(prefix: u8, index: u8, payload: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + payload.len());
    key.push(prefix | (index & INDEX_KEY_MASK));
    key.extend_from_slice(payload);
    key
}

/// Payload of a hostname-index key: `hostname + "#" + id`.
pub(crate) fn hostname_index_payload(hostname: &str, id: Ulid) -> Vec<u8> {
    let mut payload = Vec::with_capacity(hostname.len() + 1 + 16);
    payload.extend_from_slice(hostname.as_bytes());
    payload.push(HOSTNAME_INDEX_SEPARATOR);
    payload.extend_from_slice(&id.to_bytes());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_packs_prefix_and_index_nibbles() {
        let key = entry_key(CAPTURE_KEY_PREFIX, CAPTURE_HOST_ID_INDEX, b"abc");
        assert_eq!(key[0], 0x11);
        assert_eq!(&key[1..], b"abc");

        let key = entry_key(HOST_KEY_PREFIX, 0, b"xyz");
        assert_eq!(key[0], 0x00);
    }

    #[test]
    fn index_selector_is_masked_to_low_nibble() {
        let key = entry_key(HOST_KEY_PREFIX, 0xF1, &[]);
        assert_eq!(key[0], 0x01);
    }

    #[test]
    fn hostname_index_payload_embeds_separator_and_id() {
        let id = Ulid::from_bytes([0xAA; 16]);
        let payload = hostname_index_payload("a.example.com", id);
        assert_eq!(&payload[..13], b"a.example.com");
        assert_eq!(payload[13], b'#');
        assert_eq!(&payload[14..], &[0xAA; 16]);
    }
}
