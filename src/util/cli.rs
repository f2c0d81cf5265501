use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::auth::AuthError;
use crate::config::ProviderArgs;
use crate::db::{DbStore, StoreError};
use crate::provider::OAuth2Client;

#[derive(Parser)]
#[clap(
    name = "hrassist-util",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect and manage the stored Zoho connection"
)]
pub struct Options {
    #[clap(long, env = "DATABASE_URL", default_value = "hrassist.db")]
    database_url: String,
    #[clap(flatten)]
    provider: ProviderArgs,
    #[clap(subcommand)]
    command: SubCommand,
}

#[derive(Subcommand)]
enum SubCommand {
    /// Show whether a mailbox is connected and when its token expires.
    Status,
    /// Trade the stored refresh token for a new access token.
    Refresh,
    /// Forget the stored tokens.
    Disconnect,
    /// Delete expired authorization attempts.
    PurgeFlows,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid provider URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("could not encode status: {0}")]
    Json(#[from] serde_json::Error),
}

fn get_client(opts: &Options) -> Result<OAuth2Client, CliError> {
    let store = Arc::new(DbStore::acquire(&opts.database_url)?);
    store.migrate()?;
    let client = OAuth2Client::new(opts.provider.provider_config()?, store.clone(), store)?;
    Ok(client)
}

async fn status(client: &OAuth2Client) -> Result<(), CliError> {
    let status = client.connection_status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn refresh(client: &OAuth2Client) -> Result<(), CliError> {
    client.refresh_current().await?;
    if let Some(expires_at) = client.connection_status().await.expires_at {
        println!("Refreshed, valid until {}", expires_at);
    } else {
        println!("Refreshed");
    }
    Ok(())
}

async fn disconnect(client: &OAuth2Client) -> Result<(), CliError> {
    client.disconnect().await?;
    println!("Disconnected");
    Ok(())
}

async fn purge_flows(client: &OAuth2Client) -> Result<(), CliError> {
    let removed = client.purge_flows().await?;
    println!("Removed {} expired entries", removed);
    Ok(())
}

pub async fn run_cli_action(opts: Options) -> Result<(), CliError> {
    use SubCommand::*;

    let client = get_client(&opts)?;

    match &opts.command {
        Status => status(&client).await,
        Refresh => refresh(&client).await,
        Disconnect => disconnect(&client).await,
        PurgeFlows => purge_flows(&client).await,
    }
}
