//! Cinder collector CLI
//!
//! A command-line tool for listing and collecting OpenStack block storage
//! metrics through the collector agent.

use anyhow::Result;
use cinder_cli::{client, commands, config, output};
use clap::{Parser, Subcommand};
use commands::{metrics, status};

/// Cinder collector CLI
#[derive(Parser)]
#[command(name = "cinderctl")]
#[command(author, version, about = "CLI for the Cinder metrics collector", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via CINDERCTL_API_URL env var)
    #[arg(long, env = "CINDERCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the connection settings the collector accepts
    Schema,

    /// List collectable metric paths
    Discover {
        /// Only list paths of this tenant
        #[arg(long, short)]
        tenant: Option<String>,
    },

    /// Collect metric values
    Collect {
        /// Metric paths to collect
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        paths: Vec<String>,

        /// Collect every discovered path
        #[arg(long)]
        all: bool,

        /// With --all, only collect paths of this tenant
        #[arg(long, short, requires = "all")]
        tenant: Option<String>,
    },

    /// Show agent health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    // Initialize client
    let client = client::ApiClient::new(&config.api_url(cli.api_url.as_deref()))?;

    // Execute command
    match cli.command {
        Commands::Schema => {
            metrics::show_schema(&client, cli.format).await?;
        }
        Commands::Discover { tenant } => {
            let tenant = config.tenant(tenant);
            metrics::discover(&client, tenant.as_deref(), cli.format).await?;
        }
        Commands::Collect { paths, all, tenant } => {
            let tenant = config.tenant(tenant);
            metrics::collect(&client, paths, all, tenant.as_deref(), cli.format).await?;
        }
        Commands::Status => {
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
