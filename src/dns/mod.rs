//! Authoritative DNS responder.
//!
//! The server answers for the configured base hostname and everything below
//! it, over UDP and TCP. Each inbound message is handled independently; no
//! state is kept between queries.
//!
//! # Synthesized records
//!
//! `SOA` and `NS` queries for in-zone names are answered with a single
//! synthesized record naming `ns1.<base-hostname>` as primary nameserver
//! (and `hostmaster.<base-hostname>` as the responsible mailbox for SOA).
//! No zone transfer is supported.
//!
//! # Dynamic TXT records
//!
//! Any other query type for an in-zone name is answered from the
//! [`ZoneStore`][crate::zone::ZoneStore]: every stored record of a
//! recognized type (currently `TXT`) is converted to a wire answer carrying
//! its value verbatim. This is the serving half of the ACME DNS-01 exchange:
//! the ACME client publishes a challenge record through the zone store, and
//! the CA's resolver reads it back here.
//!
//! Queries for names outside the zone receive an empty, non-authoritative
//! reply; the responder never answers for zones it does not own.

mod handlers;
pub mod server;

pub use server::new;
