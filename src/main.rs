//! realm-gate - Keycloak bearer-token protected API

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use realm_gate::{
    api::ApiServer,
    auth::{Discovery, ProviderMetadata},
    cli::{Cli, Command},
    client::{ApiClient, OidcClientSettings, StaticSession, new_state},
    config::Config,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::Probe) => run_probe(&config).await,
        Some(Command::Get { endpoint, token }) => run_get(&config, &endpoint, token).await,
        Some(Command::LoginUrl { redirect_uri }) => run_login_url(&config, redirect_uri).await,
        Some(Command::LogoutUrl {
            post_logout_redirect_uri,
        }) => run_logout_url(&config, post_logout_redirect_uri).await,
        Some(Command::Config) => run_print_config(&config),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

/// Load configuration and apply CLI overrides
fn load_config(cli: &Cli) -> realm_gate::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    if let Some(ref url) = cli.api_url {
        config.client.base_url = url.clone();
    }
    Ok(config)
}

/// Probe the API's public endpoint
async fn run_probe(config: &Config) -> ExitCode {
    let client = match ApiClient::from_config(&config.client, Arc::new(StaticSession::anonymous()))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Failed to create client: {e}");
            return ExitCode::FAILURE;
        }
    };

    if client.test_connection().await {
        println!("✅ {} is reachable", client.base_url());
        ExitCode::SUCCESS
    } else {
        eprintln!("❌ {} is not reachable", client.base_url());
        ExitCode::FAILURE
    }
}

/// Call one endpoint and print the raw response
async fn run_get(config: &Config, endpoint: &str, token: Option<String>) -> ExitCode {
    let token = token.or_else(|| config.client.resolve_access_token());
    let client = match ApiClient::from_config(&config.client, Arc::new(StaticSession::new(token)))
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Failed to create client: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("{}", client.get_raw(endpoint).await);
    ExitCode::SUCCESS
}

/// Print the authorization URL for the configured client
async fn run_login_url(config: &Config, redirect_uri: Option<String>) -> ExitCode {
    let Some(redirect_uri) = redirect_uri.or_else(|| config.client.redirect_uri.clone()) else {
        eprintln!("❌ No redirect URI: pass --redirect-uri or set client.redirect_uri");
        return ExitCode::FAILURE;
    };

    let metadata = match discover_metadata(config).await {
        Ok(md) => md,
        Err(e) => {
            eprintln!("❌ Discovery failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let state = new_state();
    match OidcClientSettings::from_config(&config.client).authorization_url(
        &metadata,
        &redirect_uri,
        &state,
    ) {
        Ok(url) => {
            println!("{url}");
            println!("\nstate: {state}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

/// Print the end-session URL for the configured client
async fn run_logout_url(config: &Config, post_logout_redirect_uri: Option<String>) -> ExitCode {
    let metadata = match discover_metadata(config).await {
        Ok(md) => md,
        Err(e) => {
            eprintln!("❌ Discovery failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut settings = OidcClientSettings::from_config(&config.client);
    if post_logout_redirect_uri.is_some() {
        settings.post_logout_redirect_uri = post_logout_redirect_uri;
    }

    match settings.end_session_url(&metadata) {
        Ok(url) => {
            println!("{url}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

/// Fetch the identity provider's metadata document
async fn discover_metadata(config: &Config) -> realm_gate::Result<ProviderMetadata> {
    let kc = &config.keycloak;
    Discovery::new(kc.metadata_timeout, kc.require_https_metadata)?
        .metadata(&kc.authority)
        .await
}

/// Print the effective configuration
fn run_print_config(config: &Config) -> ExitCode {
    match serde_yaml::to_string(config) {
        Ok(yaml) => {
            print!("{yaml}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Failed to serialize configuration: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the API server
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        authority = %config.keycloak.authority,
        policies = config.policies.len(),
        "Starting realm-gate"
    );

    let server = match ApiServer::new(config).await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}
