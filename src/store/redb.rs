//! redb-backed implementation of the [`Database`] trait.
//!
//! One table maps raw byte keys to JSON-encoded record values; secondary
//! index entries carry an empty value. Writes run in a single write
//! transaction per operation, reads in a single snapshot.

use crate::error::Error;
use crate::hosts::{CaptureEntry, Host};
use crate::store::{
    entry_key, hostname_index_payload, Database, CAPTURE_HOST_ID_INDEX, CAPTURE_KEY_PREFIX,
    HOST_HOSTNAME_INDEX, HOST_KEY_PREFIX,
};
use redb::{ReadableTable, TableDefinition};
use std::path::Path;
use ulid::Ulid;

const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

const EMPTY_VALUE: &[u8] = &[];

pub struct RedbDatabase {
    db: redb::Database,
}

impl RedbDatabase {
    /// Open (or create) the record database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = redb::Database::create(path)?;

        // Make sure the table exists so later read snapshots can open it.
        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    fn get_host(table: &impl ReadableTable<&'static [u8], &'static [u8]>, id_bytes: &[u8]) -> Result<Host, Error> {
        let key = entry_key(HOST_KEY_PREFIX, 0, id_bytes);
        let Some(value) = table.get(key.as_slice())? else {
            return Err(Error::HostNotFound);
        };
        Ok(serde_json::from_slice(value.value())?)
    }

    /// Collect all index keys sharing `prefix`, in key order.
    fn scan_prefix(
        table: &impl ReadableTable<&'static [u8], &'static [u8]>,
        prefix: &[u8],
    ) -> Result<Vec<Vec<u8>>, Error> {
        let mut keys = Vec::new();
        for item in table.range::<&[u8]>(prefix..)? {
            let (key, _value) = item?;
            if !key.value().starts_with(prefix) {
                break;
            }
            keys.push(key.value().to_vec());
        }
        Ok(keys)
    }
}

fn ulid_from_key_suffix(suffix: &[u8]) -> Result<Ulid, Error> {
    let bytes: [u8; 16] = suffix.try_into().map_err(|_| Error::MalformedIndexEntry)?;
    Ok(Ulid::from_bytes(bytes))
}

#[async_trait::async_trait]
impl Database for RedbDatabase {
    async fn store_hosts(&self, hosts: &[Host]) -> Result<(), Error> {
        if hosts.is_empty() {
            return Err(Error::EmptyHostBatch);
        }

        // Encode everything up front; encode errors are permanent and must
        // not leave a half-written transaction behind.
        let mut entries = Vec::with_capacity(hosts.len() * 2);
        for host in hosts {
            let value = serde_json::to_vec(host)?;
            // Host itself.
            entries.push((entry_key(HOST_KEY_PREFIX, 0, &host.id.to_bytes()), value));
            // Hostname index.
            entries.push((
                entry_key(
                    HOST_KEY_PREFIX,
                    HOST_HOSTNAME_INDEX,
                    &hostname_index_payload(&host.hostname, host.id),
                ),
                Vec::new(),
            ));
        }

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS)?;
            for (key, value) in &entries {
                table.insert(key.as_slice(), value.as_slice())?;
            }
        }
        txn.commit()?;

        Ok(())
    }

    async fn find_host_by_id(&self, host_id: Ulid) -> Result<Host, Error> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;
        Self::get_host(&table, &host_id.to_bytes())
    }

    async fn find_host_by_hostname(&self, hostname: &str) -> Result<Host, Error> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;

        let mut prefix = Vec::with_capacity(hostname.len() + 1);
        prefix.extend_from_slice(hostname.as_bytes());
        prefix.push(super::HOSTNAME_INDEX_SEPARATOR);
        let prefix = entry_key(HOST_KEY_PREFIX, HOST_HOSTNAME_INDEX, &prefix);

        let index_keys = Self::scan_prefix(&table, &prefix)?;
        let Some(index_key) = index_keys.first() else {
            return Err(Error::HostNotFound);
        };

        // The host ID is the part of the index key after the prefix.
        let host_id = ulid_from_key_suffix(&index_key[prefix.len()..])?;
        Self::get_host(&table, &host_id.to_bytes())
    }

    async fn store_capture_entry(&self, entry: &CaptureEntry) -> Result<(), Error> {
        let value = serde_json::to_vec(entry)?;

        let primary_key = entry_key(CAPTURE_KEY_PREFIX, 0, &entry.id.to_bytes());
        let mut index_payload = Vec::with_capacity(32);
        index_payload.extend_from_slice(&entry.host_id.to_bytes());
        index_payload.extend_from_slice(&entry.id.to_bytes());
        let index_key = entry_key(CAPTURE_KEY_PREFIX, CAPTURE_HOST_ID_INDEX, &index_payload);

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS)?;
            // Capture entry itself, then its host-ID index.
            table.insert(primary_key.as_slice(), value.as_slice())?;
            table.insert(index_key.as_slice(), EMPTY_VALUE)?;
        }
        txn.commit()?;

        Ok(())
    }

    async fn list_capture_entries(&self, host_ids: &[Ulid]) -> Result<Vec<CaptureEntry>, Error> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RECORDS)?;

        let mut entries = Vec::new();
        for host_id in host_ids {
            let prefix = entry_key(
                CAPTURE_KEY_PREFIX,
                CAPTURE_HOST_ID_INDEX,
                &host_id.to_bytes(),
            );
            for index_key in Self::scan_prefix(&table, &prefix)? {
                // The entry ID starts after the prefix byte and the 16-byte
                // host ID.
                let entry_id = ulid_from_key_suffix(&index_key[17..])?;
                let key = entry_key(CAPTURE_KEY_PREFIX, 0, &entry_id.to_bytes());
                let Some(value) = table.get(key.as_slice())? else {
                    return Err(Error::MalformedIndexEntry);
                };
                entries.push(serde_json::from_slice(value.value())?);
            }
        }

        Ok(entries)
    }
}
