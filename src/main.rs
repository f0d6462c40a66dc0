//! cert-chain - issue an X.509 chain from a profile file
//!
//! ```bash
//! cert-chain cert --role root --config ca.yaml
//! cert-chain cert --role intermediate --config ca.yaml
//! cert-chain cert --role server --config ca.yaml --force
//! cert-chain chain --config ca.yaml
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use cert_chain::Role;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cert-chain",
    version,
    about = "Issue an X.509 certificate chain from a profile file"
)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the private key of a profile
    Key(ProfileArgs),
    /// Generate the certificate signing request of a profile
    Csr(ProfileArgs),
    /// Issue the certificate of a profile
    Cert(ProfileArgs),
    /// Issue root, intermediate, server and client in order
    Chain(ChainArgs),
}

#[derive(Args)]
struct ProfileArgs {
    /// root, intermediate, server or client
    #[arg(long)]
    role: Role,
    #[command(flatten)]
    common: ChainArgs,
}

#[derive(Args)]
struct ChainArgs {
    /// Profile file (YAML, or TOML when it ends in .toml)
    #[arg(long, short = 'c')]
    config: PathBuf,
    /// Replace files that already exist
    #[arg(long, short = 'f')]
    force: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Key(ProfileArgs { role, common }) => {
            commands::create_key::handle_create_key(&common.config, role, common.force)
        }
        Command::Csr(ProfileArgs { role, common }) => {
            commands::create_csr::handle_create_csr(&common.config, role, common.force)
        }
        Command::Cert(ProfileArgs { role, common }) => {
            commands::sign_cert::handle_sign_cert(&common.config, role, common.force)
        }
        Command::Chain(args) => commands::sign_cert::handle_sign_chain(&args.config, args.force),
    }
}
