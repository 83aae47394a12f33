use crate::api::routes;
use crate::config::SharedConfig;
use crate::hosts::HostService;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Clone)]
pub(super) struct AppState {
    pub config: SharedConfig,
    pub hosts: Arc<HostService>,
}

pub fn new(
    config: SharedConfig,
    hosts: Arc<HostService>,
    shutdown: oneshot::Receiver<()>,
) -> impl Future<Output = hyper::Result<()>> {
    axum::Server::bind(&config.http_bind_addr)
        .serve(
            routes::new(AppState {
                config: config.clone(),
                hosts,
            })
            .into_make_service(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
        })
}
