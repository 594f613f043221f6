use clap::Parser;
use rpcz_echo::{
    config::{ServerArgs, ServerConfig},
    server,
    signal::shutdown_signal,
    telemetry::init_telemetry,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = ServerArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry("echo-server")?;
    let res = server::serve(config, shutdown_signal()).await;
    providers.shutdown();
    res
}
