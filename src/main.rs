use anyhow::{anyhow, Result};
use lurebox::error::Error;
use lurebox::id::IdGenerator;
use lurebox::{Config, FileStorage, HostService, RedbDatabase, SharedConfig, ZoneStore};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let mut first_args = std::env::args().take(2);
    let (program_name, config_file) = (
        first_args.next().unwrap_or("lurebox".to_string()),
        first_args.next(),
    );
    let config = config_init(&program_name, config_file)?;

    let database = Arc::new(RedbDatabase::open(config.db_path())?);
    let zones = ZoneStore::new(Arc::new(FileStorage::new(config.zones_dir())));
    let hosts = Arc::new(HostService::new(
        config.hostname.clone(),
        database,
        Arc::new(IdGenerator::new()),
    ));

    tracing::info!("DNS listening on UDP {}", &config.dns_udp_bind_addr);
    tracing::info!("DNS listening on TCP {}", &config.dns_tcp_bind_addr);
    let dns_server = lurebox::new_dns(config.clone(), zones).await?;
    let mut dns_handle = tokio::spawn(dns_server.block_until_done());

    tracing::info!("HTTP listening on {}", &config.http_bind_addr);
    let (api_shutdown, api_shutdown_rx) = oneshot::channel();
    let api_server = lurebox::new_http(config.clone(), hosts, api_shutdown_rx);
    let mut api_handle = tokio::spawn(api_server);

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("quitting from signal");
        },
        dns_res = &mut dns_handle => {
            dns_res
                .map_err(|err| anyhow!("DNS task failed: {err}"))?
                .map_err(Error::Dns)?;
            return Err(anyhow!("DNS server exited unexpectedly"));
        }
        api_res = &mut api_handle => {
            api_res.map_err(|err| anyhow!("API task failed: {err}"))??;
            return Err(anyhow!("API server exited unexpectedly"));
        }
    }

    // Drain in-flight API requests within a bounded window, then stop the
    // DNS listeners outright.
    let mut errors: Vec<anyhow::Error> = Vec::new();
    let _ = api_shutdown.send(());
    match timeout(config.shutdown_timeout, &mut api_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => errors.push(err.into()),
        Ok(Err(err)) => errors.push(anyhow!("API task failed: {err}")),
        Err(_) => {
            api_handle.abort();
            errors.push(anyhow!(
                "API server did not drain within {:?}",
                config.shutdown_timeout
            ));
        }
    }

    dns_handle.abort();
    if let Ok(Err(err)) = dns_handle.await {
        errors.push(Error::Dns(err).into());
    }

    if let Some(err) = errors.pop() {
        for extra in errors {
            tracing::error!("additional shutdown error: {extra:?}");
        }
        return Err(err);
    }
    tracing::info!("goodbye");
    Ok(())
}

fn tracing_init() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lurebox=info".into()),
        )
        .init();
}

fn config_init(program_name: &str, config_file: Option<String>) -> Result<SharedConfig> {
    match config_file {
        None => Err(anyhow!("usage: {program_name} /path/to/config.json")),
        Some(config_file) => {
            let config = Config::try_from_file(&config_file)?;
            tracing::debug!("loaded config from {config_file}");
            Ok(Arc::new(config))
        }
    }
}
