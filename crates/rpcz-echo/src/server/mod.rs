//! Server wiring: listeners, the tonic router and graceful shutdown.
//!
//! ## Structure
//!
//! - [`service`] - the tonic adapter around a [`Handler`] (`EchoService`).
//!
//! The router carries the echo service, the standard gRPC health service and
//! gRPC-Web support (with a permissive CORS layer) so browser clients can call
//! it directly.

pub mod service;

pub use service::EchoService;

use crate::config::{Address, ServerConfig};
use core::future::Future;
use rpcz_echo_core::{DeadlineEcho, Handler, proto::echo_server::EchoServer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_stream::{Stream, wrappers::TcpListenerStream};
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_health::server::HealthReporter;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Binds the configured address and serves a [`DeadlineEcho`] until `signal`
/// resolves.
pub async fn serve<F>(config: ServerConfig, signal: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let service = EchoService::new(DeadlineEcho::new(config.max_timeout));

    match &config.address {
        Address::Tcp(addr) => {
            let tcp = TcpListener::bind(addr).await?;
            log_startup_info(&config);
            serve_with_incoming(TcpListenerStream::new(tcp), service, signal).await
        }
        #[cfg(unix)]
        Address::Uds(path) => {
            use tokio::net::UnixListener;
            use tokio_stream::wrappers::UnixListenerStream;

            let uds = UnixListener::bind(path)?;
            log_startup_info(&config);
            let res = serve_with_incoming(UnixListenerStream::new(uds), service, signal).await;
            // Best effort: a panic can still leave the socket file behind.
            let _ = std::fs::remove_file(path);
            res
        }
        #[cfg(not(unix))]
        Address::Uds(_) => {
            anyhow::bail!("Unix domain sockets are not supported on this platform");
        }
    }
}

/// Serves `service` on an already-accepted connection stream until `signal`
/// resolves, then shuts down gracefully.
pub async fn serve_with_incoming<H, I, IO, IE, F>(
    incoming: I,
    service: EchoService<H>,
    signal: F,
) -> anyhow::Result<()>
where
    H: Handler,
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<EchoServer<EchoService<H>>>()
        .await;

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(build_echo_service(service.clone()))
        .serve_with_incoming_shutdown(incoming, shutdown(signal, service, health_reporter))
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting echo service on {} with full config: {:#?}",
            config.address,
            config
        );
    } else {
        tracing::info!(
            "Starting echo service on {} with a {:?} ceiling",
            config.address,
            config.max_timeout
        );
    }
}

fn build_echo_service<H: Handler>(service: EchoService<H>) -> EchoServer<EchoService<H>> {
    EchoServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}

async fn shutdown<H, F>(signal: F, service: EchoService<H>, health_reporter: HealthReporter)
where
    H: Handler,
    F: Future<Output = ()>,
{
    signal.await;
    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    health_reporter
        .set_not_serving::<EchoServer<EchoService<H>>>()
        .await;

    // 2. Cancel in-flight calls and refuse new ones
    service.shutdown();
}
