#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use klaxon::{
    auth::{TokenIdentityProvider, token_digest},
    config::{KlaxonConfig, find_config_file},
    controller,
};

#[derive(Parser, Debug)]
#[command(name = "klaxon")]
#[command(about = "Push alarm dispatcher", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $KLAXON_CONFIG, ./klaxon.config.ron,
    /// then /etc/klaxon/klaxon.config.ron)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the alarm API (the default)
    Run,

    /// Load and validate the configuration, then exit
    Check,

    /// Print the digest to put in `api.callers` for a bearer token
    HashToken {
        token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = load(cli.config)?;
            controller::run(config).await
        }
        Commands::Check => {
            let config = load(cli.config)?;
            config.channel.build()?;
            let callers = TokenIdentityProvider::from_config(&config.api.callers)?;
            println!(
                "Configuration OK: {} caller(s), authentication {}",
                callers.len(),
                if config.dispatch.require_authentication {
                    "required"
                } else {
                    "optional"
                }
            );
            Ok(())
        }
        Commands::HashToken { token } => {
            println!("{}", token_digest(&token));
            Ok(())
        }
    }
}

fn load(explicit: Option<PathBuf>) -> anyhow::Result<KlaxonConfig> {
    let path = find_config_file(explicit)?;
    KlaxonConfig::load(&path)
}
