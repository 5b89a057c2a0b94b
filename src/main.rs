#[tokio::main]
async fn main() -> anyhow::Result<()> {
    popnet_harness::cli::run_cli().await
}
