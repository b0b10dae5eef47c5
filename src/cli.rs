//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keycloak bearer-token protected API and client
#[derive(Parser, Debug)]
#[command(name = "realm-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "REALM_GATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "REALM_GATE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "REALM_GATE_HOST")]
    pub host: Option<String>,

    /// Base URL of the API (client commands)
    #[arg(long, env = "REALM_GATE_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "REALM_GATE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "REALM_GATE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the API server (default)
    Serve,

    /// Check that the API's public endpoint is reachable
    Probe,

    /// Call an API endpoint with the configured or given access token
    Get {
        /// Endpoint path, e.g. `/api/user/profile`
        #[arg(required = true)]
        endpoint: String,

        /// Access token (overrides `client.access_token`)
        #[arg(short, long, env = "REALM_GATE_ACCESS_TOKEN")]
        token: Option<String>,
    },

    /// Print the identity provider login URL for the configured client
    LoginUrl {
        /// Redirect URI (overrides `client.redirect_uri`)
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Print the identity provider logout URL for the configured client
    LogoutUrl {
        /// Post-logout redirect URI (overrides `client.post_logout_redirect_uri`)
        #[arg(long)]
        post_logout_redirect_uri: Option<String>,
    },

    /// Print the effective configuration as YAML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_server_mode() {
        let cli = Cli::try_parse_from(["realm-gate"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn parses_get_with_token() {
        let cli =
            Cli::try_parse_from(["realm-gate", "get", "/api/user/profile", "--token", "abc"])
                .unwrap();
        match cli.command {
            Some(Command::Get { endpoint, token }) => {
                assert_eq!(endpoint, "/api/user/profile");
                assert_eq!(token.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_login_url() {
        let cli = Cli::try_parse_from([
            "realm-gate",
            "login-url",
            "--redirect-uri",
            "https://app.example.com/cb",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::LoginUrl { redirect_uri: Some(_) })
        ));
    }

    #[test]
    fn parses_logout_url() {
        let cli = Cli::try_parse_from(["realm-gate", "logout-url"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::LogoutUrl { post_logout_redirect_uri: None })
        ));
    }
}
