use beekit::bootstrap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init_tracing();
    beekit::cli::run().await
}
