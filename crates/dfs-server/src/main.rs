mod service;
mod topology;
mod wiring;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dfs_config::ServerFlags;
use dfs_notice::{InMemoryNotice, Notice};
use dfs_proto::dfs_server::DfsServer;
use dfs_transfer::TransferContext;
use tokio::signal::unix;

use service::{DfsService, RegisteredServer};
use topology::TopologyConfig;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter("info")
        .json()
        .flatten_event(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let flags = Arc::new(ServerFlags::parse());
    tracing::info!(server_id = %flags.server_id, listen_addr = %flags.listen_addr, "dfs-server starting");

    let topology = TopologyConfig::load(&flags.topology_path)?;
    let wiring::Wiring { selector, features, aux, cache_recovery } = wiring::build(&topology, &flags)?;

    let audit = aux.clone() as Arc<dyn dfs_meta::AuditStore>;
    let ctx = Arc::new(TransferContext::new(selector.clone(), features, audit, flags.clone()));

    // Notice service: a real deployment points `--notice-uri` at ZooKeeper
    // or etcd. `InMemoryNotice` stands in here since `dfs-server` doesn't
    // yet carry a client for either -- this server only registers itself
    // and answers `GetDfsServers` peer discovery, it never watches the
    // topology notice paths for live shard/segment updates (those are
    // loaded once, from `--topology-path`, at boot).
    let notice: Arc<dyn Notice> = Arc::new(InMemoryNotice::new());
    let registration = serde_json::to_vec(&RegisteredServer { id: flags.server_id.clone(), uri: flags.registration_uri.clone() })
        .expect("RegisteredServer always serializes");
    let self_node = notice.register(&format!("{}/n", dfs_notice::SHARD_DFS_PATH), registration).await.context("registering with notice service")?;

    if let Some(loop_) = &cache_recovery {
        loop_.clone().spawn_pending_drain();
        loop_.clone().spawn_compaction_sweep();
    }

    let recovery_selector = selector.clone();
    let recovery_batch_size = flags.recovery_batch_size as usize;
    let recovery_interval = flags.recovery_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(recovery_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = recovery_selector.dispatch_recovery_event(recovery_batch_size, Duration::from_secs(5)).await {
                tracing::warn!(error = %e, "recovery event dispatch failed, will retry next tick");
            }
        }
    });

    let metrics_handle = dfs_metrics::install_recorder();
    let metrics_router = dfs_metrics::build_router(metrics_handle, &flags.metrics_path);
    let metrics_addr = flags.metrics_addr.clone();
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(&metrics_addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(error = %e, addr = %metrics_addr, "failed to bind metrics listener");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, metrics_router).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });

    let grpc_addr = flags.listen_addr.parse().with_context(|| format!("parsing listen address {}", flags.listen_addr))?;
    let dfs_service = DfsServer::new(DfsService::new(ctx, notice.clone()));

    let mut sigint = unix::signal(unix::SignalKind::interrupt())?;
    let mut sigterm = unix::signal(unix::SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => (),
        }
        tracing::info!("caught signal to exit");
    };

    tracing::info!(addr = %flags.listen_addr, "serving gRPC");
    tonic::transport::Server::builder()
        .add_service(dfs_service)
        .serve_with_shutdown(grpc_addr, shutdown)
        .await?;

    notice.unregister(&self_node).await.ok();
    Ok(())
}
