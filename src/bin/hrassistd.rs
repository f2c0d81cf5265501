use std::sync::Arc;

use clap::Parser;
use tracing::{event, Level};

use hrassist::config::Config;
use hrassist::db::DbStore;
use hrassist::http::server::Server;
use hrassist::provider::OAuth2Client;

async fn hrassistd(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(DbStore::acquire(&config.database_url)?);
    store.migrate()?;

    let client = OAuth2Client::new(config.provider.provider_config()?, store.clone(), store)?
        .with_session_secret(config.session_secret);

    event!(Level::INFO, addr = %config.bind_addr, "Listening");
    let server = Server::new(Arc::new(client), config.landing_path, config.cookie_secure);
    server.serve(config.bind_addr).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    hrassistd(config).await
}
