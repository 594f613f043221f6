//! Channel setup for the echo client, over TCP or a Unix domain socket.

use crate::config::Address;
use rpcz_echo_core::proto::echo_client::EchoClient;
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

/// Connects to the echo server at `address`.
///
/// # Errors
///
/// Fails if the address is not a valid endpoint or the server cannot be
/// reached.
pub async fn connect(address: &Address) -> anyhow::Result<EchoClient<Channel>> {
    let channel = match address {
        Address::Tcp(addr) => Endpoint::from_shared(format!("http://{addr}"))?.connect().await?,
        #[cfg(unix)]
        Address::Uds(path) => {
            use hyper_util::rt::TokioIo;
            use tokio::net::UnixStream;
            use tonic::transport::Uri;

            let path = path.clone();
            // The URI is required by the endpoint but ignored by the connector.
            Endpoint::try_from("http://[::]:50051")?
                .connect_with_connector(tower::service_fn(move |_: Uri| {
                    let path = path.clone();
                    async move {
                        Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?))
                    }
                }))
                .await?
        }
        #[cfg(not(unix))]
        Address::Uds(_) => {
            anyhow::bail!("Unix domain sockets are not supported on this platform");
        }
    };

    tracing::debug!("Connected to {address}");
    Ok(EchoClient::new(channel)
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd))
}
