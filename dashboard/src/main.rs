#[tokio::main]
async fn main() -> anyhow::Result<()> {
    greenhouse_dashboard::host::run().await
}
