//! Fivetran Import - connector lineage from the Fivetran REST API
//!
//! Main entry point for the fivetran-import CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use fivetran_client::{CancellationToken, RestApi};
use fivetran_import::config::{validate_config_result, ImportConfig};
use fivetran_import::connection::{ConnectionDetails, ConnectionSupport, ConsoleInput};
use fivetran_import::lineage;
use futures::TryStreamExt;
use std::path::PathBuf;
use std::process;

/// Fivetran Import - list groups and connectors, and report table lineage
#[derive(Parser, Debug)]
#[command(name = "fivetran-import")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/fivetran-import/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fivetran API key (prompted when absent)
    #[arg(long, env = "FIVETRAN_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Fivetran API secret (prompted when absent)
    #[arg(long, env = "FIVETRAN_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,

    /// API root URL
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List groups visible to the API key
    Groups,

    /// List connectors of a group
    Connectors {
        /// Group ID
        group_id: String,
    },

    /// Show the schema and table mapping of one connector
    Schemas {
        /// Connector ID
        connector_id: String,

        /// Print the raw schema configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print source -> destination mappings for every connector in a group
    Lineage {
        /// Group ID (interactive selection when omitted)
        #[arg(short, long)]
        group: Option<String>,

        /// Print mappings as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    if let Err(e) = fivetran_import::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Init { force } = cli.command {
        return handle_init_command(cli.config.as_deref(), force);
    }

    let mut config = ImportConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(ref base_url) = cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    validate_config_result(&config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding requests");
            on_interrupt.cancel();
        }
    });

    let support =
        ConnectionSupport::new(ConsoleInput::new(), config).with_cancellation(cancel.clone());
    let details = resolve_details(&support, cli.api_key, cli.api_secret)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("Init is handled before connecting"),

        Commands::Groups => {
            let api = support.open_api(&details)?;
            let mut groups = api.groups(cancel.clone());
            let mut count = 0;
            while let Some(group) = groups.try_next().await? {
                count += 1;
                println!("{}. {} (ID: {})", count, group.name, group.id);
            }
            if count == 0 {
                println!("No groups found for this API key.");
            }
        }

        Commands::Connectors { group_id } => {
            let api = support.open_api(&details)?;
            let mut connectors = api.connectors(&group_id, cancel.clone());
            let mut count = 0;
            while let Some(connector) = connectors.try_next().await? {
                count += 1;
                let paused = if connector.paused == Some(true) {
                    " [paused]"
                } else {
                    ""
                };
                println!(
                    "{}  {}  {}{}",
                    connector.id, connector.service, connector.schema, paused
                );
            }
            if count == 0 {
                println!("No connectors found in the selected group ({}).", group_id);
            }
        }

        Commands::Schemas { connector_id, json } => {
            let api = support.open_api(&details)?;
            let schemas = api.connector_schemas(&connector_id, &cancel).await?;
            match schemas {
                Some(schemas) if json => println!("{}", serde_json::to_string_pretty(&schemas)?),
                Some(schemas) => {
                    let mappings = lineage::mappings_for(&connector_id, &schemas);
                    if mappings.is_empty() {
                        println!("No tables configured for connector {}.", connector_id);
                    }
                    for mapping in mappings {
                        println!("{}", mapping);
                    }
                }
                None => println!("No schema data for connector {}.", connector_id),
            }
        }

        Commands::Lineage { group, json } => {
            let group_id = match group {
                Some(group_id) => group_id,
                None => support.select_to_import(&details).await?,
            };

            let session = support.connect(&details, &group_id)?;
            let result = support.run_import(&session).await;
            support.close(&session);
            let mappings = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&mappings)?);
            } else if mappings.is_empty() {
                println!("No mappings found in the selected group ({}).", group_id);
            } else {
                println!("Mappings for group {}:", group_id);
                for mapping in &mappings {
                    println!("{}", mapping);
                }
            }
        }
    }

    Ok(())
}

fn handle_init_command(path: Option<&std::path::Path>, force: bool) -> anyhow::Result<()> {
    let path = path
        .map(PathBuf::from)
        .unwrap_or_else(ImportConfig::default_path);

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    ImportConfig::new()
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {}", path.display());
    println!();
    println!("Set your credentials with:");
    println!("  export FIVETRAN_API_KEY=<key>");
    println!("  export FIVETRAN_API_SECRET=<secret>");
    Ok(())
}

/// Flags and environment first, then the configured env vars, then prompts
fn resolve_details(
    support: &ConnectionSupport<ConsoleInput>,
    api_key: Option<String>,
    api_secret: Option<String>,
) -> fivetran_import::Result<ConnectionDetails> {
    let (env_key, env_secret) = support.config().env_credentials();
    let timeout = support.config().timeout();

    match (api_key.or(env_key), api_secret.or(env_secret)) {
        (Some(key), Some(secret)) => ConnectionDetails::new(key, secret, timeout),
        _ => support.connection_details(),
    }
}
