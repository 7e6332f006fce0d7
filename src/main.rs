use anyhow::{Context, Result};
use tracing::info;

use jwt_token_store::{Config, Database};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jwt_token_store=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("jwt-token-store v{}", env!("CARGO_PKG_VERSION"));

    let options = config
        .storage_options()
        .context("Invalid token store configuration")?;

    let database = Database::connect(&options)
        .await
        .context("Failed to connect to the token database")?;
    database
        .migrate()
        .await
        .context("Token schema migration failed")?;

    let stored = database
        .token_count()
        .await
        .context("Failed to count stored tokens")?;
    info!("Token store ready ✓ ({stored} refresh tokens stored)");

    database.close().await;
    Ok(())
}
