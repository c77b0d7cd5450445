use anyhow::Result;
use radar_cli::app;

#[tokio::main]
async fn main() -> Result<()> {
    app::run().await
}
