//! shaperd — the cpushaper daemon.
//!
//! # Usage
//!
//! ```text
//! shaperd run --config /etc/cpushaper/shaperd.toml --resource-id ocid1.instance...
//! shaperd check-config --config /etc/cpushaper/shaperd.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shaperd::ShaperConfig;

#[derive(Parser)]
#[command(name = "shaperd", about = "CPU allocation feedback controller", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller and its status endpoint.
    Run {
        /// Path to shaperd.toml.
        #[arg(long)]
        config: PathBuf,

        /// Instance to govern; overrides controller.resource_id.
        #[arg(long)]
        resource_id: Option<String>,

        /// Status listen address; overrides status.listen.
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },
    /// Validate a config file and print the effective settings.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            resource_id,
            listen,
            log_json,
        } => {
            init_tracing(log_json);
            let mut cfg = ShaperConfig::from_file(&config)?;
            if let Some(id) = resource_id {
                cfg.controller.resource_id = id;
            }
            if let Some(addr) = listen {
                cfg.status.listen = addr.to_string();
            }
            run(cfg).await
        }
        Command::CheckConfig { config } => {
            let cfg = ShaperConfig::from_file(&config)?;
            cfg.validate()?;
            print!("{}", cfg.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,shaperd=debug,shaper=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cfg: ShaperConfig) -> anyhow::Result<()> {
    info!(resource = %cfg.controller.resource_id, "cpushaper daemon starting");

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr()?).await?;

    shaperd::serve(cfg, listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install CTRL+C handler");
        }
    })
    .await?;
    Ok(())
}
