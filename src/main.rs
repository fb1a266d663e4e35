use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    if rne_cli::cli::app::run().await.is_err() {
        std::process::exit(1);
    }
    Ok(())
}
