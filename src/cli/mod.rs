pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use client::ApiClient;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "portalctl")]
#[command(about = "Portal tenancy CLI - operator interface for tenant lifecycle management")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "PORTAL_API_URL",
        default_value = DEFAULT_SERVER_URL,
        help = "Base URL of the portal API"
    )]
    pub server: String,

    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Tenant lifecycle management")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "Check server health from the /health endpoint")]
    Health,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let client = ApiClient::new(&cli.server)?;

    match cli.command {
        Commands::Tenant { cmd } => commands::tenant::handle(cmd, &client, output_format).await,
        Commands::Health => commands::health::handle(&client, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::tenant::TenantCommands;

    #[test]
    fn parses_tenant_create_with_settings() {
        let cli = Cli::try_parse_from([
            "portalctl",
            "--json",
            "tenant",
            "create",
            "acme",
            "--settings",
            r#"{"plan":"pro"}"#,
            "--wait",
        ])
        .unwrap();

        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Commands::Tenant {
                cmd: TenantCommands::Create { slug, settings, wait, .. },
            } => {
                assert_eq!(slug, "acme");
                assert_eq!(settings.as_deref(), Some(r#"{"plan":"pro"}"#));
                assert!(wait);
            }
            _ => panic!("expected tenant create"),
        }
    }

    #[test]
    fn server_flag_overrides_default() {
        let cli = Cli::try_parse_from(["portalctl", "--server", "http://10.0.0.5:8080", "health"]).unwrap();
        assert_eq!(cli.server, "http://10.0.0.5:8080");
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Text));
    }

    #[test]
    fn list_accepts_status_filter() {
        let cli = Cli::try_parse_from(["portalctl", "tenant", "list", "--status", "suspended"]).unwrap();
        match cli.command {
            Commands::Tenant {
                cmd: TenantCommands::List { status },
            } => assert_eq!(status.as_deref(), Some("suspended")),
            _ => panic!("expected tenant list"),
        }
    }
}
