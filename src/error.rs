//! Error types.

use trust_dns_server::proto::error::ProtoError;

/// Error enumerates the possible Lurebox error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a host lookup by ID or hostname finds nothing. This is an
    /// expected outcome, distinct from storage failures: the capture path uses
    /// it to fail closed for hostnames nobody owns.
    #[error("host not found")]
    HostNotFound,

    /// Returned when [`Database::store_hosts`][crate::store::Database::store_hosts]
    /// is called with an empty batch.
    #[error("host batch cannot be empty")]
    EmptyHostBatch,

    /// Returned when a create-hosts request asks for an amount outside 1..=50.
    #[error("amount must be between 1 and 50, got {0}")]
    InvalidHostAmount(i64),

    /// Returned when a capture-log listing supplies no host IDs, or more
    /// than 20.
    #[error("between 1 and 20 host IDs are required, got {0}")]
    InvalidHostIdCount(usize),

    /// Returned when a `hostId` query parameter is not a valid ULID.
    #[error("invalid host ID: {0}")]
    InvalidHostId(String),

    /// Returned when the petname dictionary produces no slug.
    #[error("failed to generate hostname slug")]
    HostnameGeneration,

    /// Returned when the monotonic ULID generator overflows its random
    /// component within one millisecond.
    #[error("ULID generation overflowed")]
    IdGeneration,

    /// Returned when a zonefile (or other blob) does not exist under the given
    /// storage key. Callers that treat an absent zonefile as an empty record
    /// set absorb this; every other load failure is fatal.
    #[error("no value found in storage for key {0:?}")]
    KeyNotFound(String),

    /// Returned when a secondary-index key does not decode back to a ULID.
    /// Indicates on-disk corruption; never retried.
    #[error("malformed secondary-index entry")]
    MalformedIndexEntry,

    /// Returned when captured wire bytes cannot be re-parsed as a complete
    /// HTTP message.
    #[error("captured HTTP message is incomplete")]
    MalformedCapture,

    /// Returned when captured wire bytes fail HTTP parsing outright.
    #[error("failed to parse captured HTTP message")]
    CaptureParse(#[from] httparse::Error),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    Io(#[from] std::io::Error),

    /// Returned when encoding or decoding a stored record or zonefile fails.
    /// Permanent: indicates data corruption or a schema mismatch.
    #[error("invalid JSON")]
    InvalidJson(#[from] serde_json::Error),

    /// Returned when reading an inbound HTTP request body fails.
    #[error("failed to read request body")]
    Body(#[from] hyper::Error),

    /// Returned when the DNS responder encounters a generic protocol error.
    #[error("DNS error")]
    Dns(#[from] ProtoError),

    #[error("failed to open database")]
    DatabaseOpen(#[from] redb::DatabaseError),

    #[error("database transaction failed")]
    Transaction(#[from] redb::TransactionError),

    #[error("failed to open database table")]
    Table(#[from] redb::TableError),

    #[error("database read/write failed")]
    Storage(#[from] redb::StorageError),

    #[error("failed to commit database transaction")]
    Commit(#[from] redb::CommitError),

    /// Returned when an entry ID does not carry a representable timestamp.
    #[error("invalid timestamp in entry ID")]
    Timestamp(#[from] time::error::ComponentRange),

    #[error("failed to format timestamp")]
    TimeFormat(#[from] time::error::Format),
}
