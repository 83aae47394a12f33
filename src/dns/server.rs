use crate::config::SharedConfig;
use crate::dns::handlers::Handler;
use crate::error::Error;
use crate::zone::ZoneStore;
use tokio::net::{TcpListener, UdpSocket};
use trust_dns_server::ServerFuture;

pub async fn new(
    config: SharedConfig,
    zones: ZoneStore,
) -> Result<ServerFuture<Handler>, Error> {
    let dns_handler = Handler::new(&config.hostname, zones)?;
    let mut dns_server = ServerFuture::new(dns_handler);
    dns_server.register_socket(UdpSocket::bind(config.dns_udp_bind_addr).await?);
    dns_server.register_listener(
        TcpListener::bind(config.dns_tcp_bind_addr).await?,
        config.dns_tcp_timeout,
    );
    Ok(dns_server)
}
