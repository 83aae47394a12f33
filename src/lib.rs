//! Lurebox
//!
//! A self-hosted server for capturing out-of-band application security
//! testing (OAST) interactions. It mints ephemeral hostnames under a base
//! domain it is authoritative for, answers DNS queries for that zone, and
//! records every HTTP request aimed at a minted hostname so testers can
//! retrieve the interaction later through a small JSON API.
//!
//! DNS TXT records under the zone can be managed programmatically, which is
//! enough to solve [RFC-8555][RFC-8555] [DNS-01] challenges for certificate
//! issuance on the captured domains.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod dns;
pub mod error;
pub mod hosts;
pub mod id;
pub mod store;
pub mod zone;

pub use api::new as new_http;
pub use config::{Config, SharedConfig};
pub use dns::new as new_dns;
pub use hosts::HostService;
pub use store::RedbDatabase;
pub use zone::file::FileStorage;
pub use zone::memory::InMemoryStorage;
pub use zone::ZoneStore;
