// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use axum::{routing::get, Router};
use registrar::{
    config::RegistrarConfig,
    constants::{
        METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, METRICS_SERVER_PORT,
        TOKIO_WORKER_THREADS,
    },
    ingress::OwnershipIndex,
    metrics,
    registrar::Registrar,
    resolver::UdpCnameResolver,
    route53::Route53Zone,
    watcher::IngressWatcher,
    zone::DnsZone,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("registrar")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting ingress CNAME registrar");
}

/// Start the Prometheus metrics HTTP server
///
/// Serves metrics on the configured port and path (default: 0.0.0.0:8080/metrics)
/// along with `/live` and `/ready` probes.
fn start_metrics_server() -> tokio::task::JoinHandle<()> {
    info!(
        bind_address = METRICS_SERVER_BIND_ADDRESS,
        port = METRICS_SERVER_PORT,
        path = METRICS_SERVER_PATH,
        "Starting Prometheus metrics HTTP server"
    );

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(metrics_text) => metrics_text,
                Err(e) => {
                    error!("Failed to gather metrics: {}", e);
                    String::from("# Error gathering metrics\n")
                }
            }
        }

        async fn probe_handler() -> &'static str {
            "ok"
        }

        let app = Router::new()
            .route(METRICS_SERVER_PATH, get(metrics_handler))
            .route("/live", get(probe_handler))
            .route("/ready", get(probe_handler));

        let bind_addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{METRICS_SERVER_PORT}");
        let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind metrics server to {bind_addr}: {e}");
                return;
            }
        };

        info!("Metrics server listening on http://{bind_addr}{METRICS_SERVER_PATH}");

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {e}");
        }
    })
}

/// Block until SIGINT or SIGTERM arrives.
async fn wait_for_shutdown() -> Result<()> {
    tokio::select! {
        // Monitor for SIGINT (Ctrl+C)
        result = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            result.map_err(anyhow::Error::from)
        }

        // Monitor for SIGTERM (Kubernetes sends this when deleting pods)
        result = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                sigterm.recv().await;
                Ok::<(), anyhow::Error>(())
            }
            #[cfg(not(unix))]
            {
                // On non-Unix platforms, just wait forever
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            }
        } => {
            info!("Received SIGTERM (pod termination), initiating graceful shutdown...");
            result
        }
    }
}

async fn async_main() -> Result<()> {
    initialize_logging();

    let config = RegistrarConfig::from_env()?;
    debug!(?config, "loaded configuration");
    if config.dry_run {
        info!("dry-run mode enabled, the zone will not be mutated");
    }

    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;
    let route53_client = aws_sdk_route53::Client::new(&aws_config);
    let zone = Route53Zone::discover(route53_client, &config.route53_zone_id).await?;
    info!("set up route53 zone {}", zone.domain());
    let zone: Arc<dyn DnsZone> = Arc::new(zone);

    let kube_client = kube::Client::try_default().await?;
    info!("set up kubernetes client");

    let ownership = Arc::new(OwnershipIndex::new());
    let resolver = Arc::new(UdpCnameResolver::new());
    let (registrar, queue_rx) =
        Registrar::with_config(&config, zone, resolver, ownership.clone())?;

    let _metrics_handle = start_metrics_server();

    let (stop_tx, stop_rx) = watch::channel(false);
    let watcher = IngressWatcher::new(
        kube_client,
        ownership,
        config.target_label_name.clone(),
        config.resync_period,
        stop_rx.clone(),
    );

    let reconciler = tokio::spawn(registrar.clone().process_update_queue(queue_rx, stop_rx));
    let watcher_task = tokio::spawn(watcher.run(registrar));

    wait_for_shutdown().await?;

    let _ = stop_tx.send(true);
    watcher_task.await?;
    reconciler.await?;

    info!("Graceful shutdown completed successfully");
    Ok(())
}
