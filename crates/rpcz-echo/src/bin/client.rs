use clap::Parser;
use rpcz_echo::{
    client,
    config::{ClientArgs, ClientConfig},
    signal::shutdown_signal,
    telemetry::init_telemetry,
};
use rpcz_echo_core::{Context, Dispatcher};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = ClientArgs::parse();
    let config = ClientConfig::try_from(args)?;

    let providers = init_telemetry("echo-client")?;
    let client = client::connect(&config.address).await?;

    let ctx = match config.deadline {
        Some(deadline) => Context::background().with_timeout(deadline),
        None => Context::background().child(),
    };

    // Ctrl+C abandons whatever is still in flight; the batch still reports.
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        interrupt.cancel();
    });

    let summary = Dispatcher::new(client, config.requests, config.mode)
        .with_delay(config.delay)
        .run(&ctx)
        .await;

    if summary.failed > 0 {
        tracing::warn!("{} of {} requests failed", summary.failed, summary.total);
    }

    providers.shutdown();
    Ok(())
}
