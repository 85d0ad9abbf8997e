use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    concord_cli::main_entry().await
}
