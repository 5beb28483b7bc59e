#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use genserve_core::{ActionSet, Capability, FormatRegistry, GenerationCache, JsonFormat, Policy};
use server::config::{CliArgs, ServerConfig};
use server::face::run_udp_ingress;
use server::publisher::{StatusMessage, StatusSource, run_publisher};
use server::service::{
    content::ContentService,
    handler::RequestHandler,
    observer::{LogObserver, ObserverList},
};
use server::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let mut formats = FormatRegistry::new();
    formats.register::<StatusMessage>(Arc::new(JsonFormat::<StatusMessage>::new()));

    let source = Arc::new(StatusSource::new(
        config.node_name.clone(),
        config.status_padding,
    ));
    let mut handler = RequestHandler::new(
        config.channel.clone(),
        Arc::new(GenerationCache::new(config.cache_capacity)),
        formats.resolve::<StatusMessage>()?,
        Arc::new(ObserverList::new().with(Arc::new(LogObserver))),
    );
    if config.lazy_latest {
        handler = handler.with_latest_provider(source.clone());
    }

    let policy = Policy::new().grant(Capability::new(
        config.subject.clone(),
        config.channel.prefix.clone(),
        ActionSet::ALL,
    ));
    let service = ContentService::start(handler, config.pool, Arc::new(policy), &config.subject)?;

    let socket = Arc::new(UdpSocket::bind(&config.server_addr).await?);
    log_startup_info(&config);

    let token = CancellationToken::new();
    let ingress = tokio::spawn(run_udp_ingress(socket, service.clone(), token.clone()));
    let publisher = config.publish_interval.map(|period| {
        tokio::spawn(run_publisher(
            service.clone(),
            source,
            config.subject.clone(),
            period,
            token.clone(),
        ))
    });

    shutdown_signal().await;

    // 1. Stop ingress and publishing
    token.cancel();
    match ingress.await {
        Ok(Err(_e)) => {
            #[cfg(feature = "tracing")]
            tracing::error!("UDP ingress failed: {_e}");
        }
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::error!("UDP ingress task panicked: {_e}");
        }
        Ok(Ok(())) => {}
    }
    if let Some(publisher) = publisher {
        let _ = publisher.await;
    }

    // 2. Drain and stop the workers
    if let Err(_e) = service.shutdown(&config.subject).await {
        #[cfg(feature = "tracing")]
        tracing::error!("Error during service shutdown: {:?}", _e);
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Service shut down successfully");

    providers.shutdown();
    Ok(())
}

fn log_startup_info(_config: &ServerConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Serving {} on udp://{} with full config: {:#?}",
            _config.channel.prefix,
            _config.server_addr,
            _config
        );
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Serving {} on udp://{} with {} workers",
            _config.channel.prefix,
            _config.server_addr,
            _config.pool.num_workers
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to install SIGTERM handler: {_e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to install Ctrl+C handler: {_e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, terminating gracefully...");
}
