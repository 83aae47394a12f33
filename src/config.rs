use crate::error::Error;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub type SharedConfig = Arc<Config>;

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Base hostname the server is authoritative for. Ephemeral hostnames are
    /// minted as subdomains of it.
    pub hostname: String,
    pub http_bind_addr: SocketAddr,
    pub dns_udp_bind_addr: SocketAddr,
    pub dns_tcp_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_dns_tcp_timeout")]
    pub dns_tcp_timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_api_timeout")]
    pub api_timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,
    /// Directory holding the record database and per-zone zonefiles.
    pub data_dir: PathBuf,
}

fn default_dns_tcp_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Config {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        Ok(conf)
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("records.redb")
    }

    #[must_use]
    pub fn zones_dir(&self) -> PathBuf {
        self.data_dir.join("zones")
    }
}
