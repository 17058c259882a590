//! tastemap command-line entry point.

use env_logger::Env;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Credentials may live in a local .env file
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    cli::run().await?;

    Ok(())
}
