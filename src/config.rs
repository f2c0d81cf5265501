use std::net::SocketAddr;
use std::time::Duration;

use clap::{Args, Parser};

use crate::core::types::{ClientId, ClientSecret, RedirectUri, Scope};
use crate::provider::ProviderConfig;

/// Registration with the provider and how to reach it.
#[derive(Debug, Clone, Args)]
pub struct ProviderArgs {
    #[clap(long, env = "ZOHO_CLIENT_ID")]
    pub client_id: String,
    #[clap(long, env = "ZOHO_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,
    #[clap(long, env = "ZOHO_REDIRECT_URI")]
    pub redirect_uri: String,
    #[clap(
        long,
        env = "ZOHO_SCOPES",
        default_value = "ZohoMail.accounts.READ ZohoMail.messages.READ"
    )]
    pub scopes: String,
    #[clap(long, env = "ZOHO_ACCOUNTS_URL", default_value = "https://accounts.zoho.com")]
    pub accounts_url: String,
    #[clap(long, env = "HTTP_TIMEOUT_SECS", default_value = "30")]
    pub http_timeout_secs: u64,
    #[clap(long, env = "FLOW_TTL_SECS", default_value = "900")]
    pub flow_ttl_secs: i64,
}

impl ProviderArgs {
    pub fn provider_config(&self) -> Result<ProviderConfig, url::ParseError> {
        let mut config = ProviderConfig::from_accounts_url(
            &self.accounts_url,
            ClientId(self.client_id.clone()),
            ClientSecret(self.client_secret.clone()),
            RedirectUri(self.redirect_uri.clone()),
            Scope::from_delimited_parts(&self.scopes),
        )?;
        config.http_timeout = Duration::from_secs(self.http_timeout_secs);
        config.flow_ttl = chrono::Duration::seconds(self.flow_ttl_secs);
        Ok(config)
    }
}

#[derive(Debug, Parser)]
#[clap(
    name = "hrassistd",
    version = env!("CARGO_PKG_VERSION"),
    about = "Connects the HR assistant to a Zoho Mail account"
)]
pub struct Config {
    #[clap(flatten)]
    pub provider: ProviderArgs,
    #[clap(long, env = "DATABASE_URL", default_value = "hrassist.db")]
    pub database_url: String,
    /// Keys session ids before they are used as storage keys.
    #[clap(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: String,
    #[clap(long, env = "BIND_ADDR", default_value = "127.0.0.1:8001")]
    pub bind_addr: SocketAddr,
    /// Where the browser lands after a successful connection.
    #[clap(long, env = "LANDING_PATH", default_value = "/dashboard")]
    pub landing_path: String,
    #[clap(long, env = "COOKIE_SECURE")]
    pub cookie_secure: bool,
}
