use anyhow::Result;

use tutor::run_cli;

#[tokio::main]
async fn main() -> Result<()> {
    run_cli().await
}
