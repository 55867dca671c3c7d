use telemetry::tracing::init_tracing;

mod core;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    core::start_loader().await
}
