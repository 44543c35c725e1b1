use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "tkl")]
#[command(about = "Asset registry reconciliation and verification", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (base -> network -> local)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    /// Registry document (overrides registry.path)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Source directory, one JSON file per asset (overrides registry.assets_dir)
    #[arg(long = "assets-dir", global = true)]
    assets_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile and verify without writing anything. Fails on any violation.
    Verify {
        /// Skip the removal guards.
        #[arg(long, default_value_t = false)]
        allow_mass_removal: bool,
    },

    /// Reconcile, verify, rewrite the registry on change, then run admission hooks.
    Merge {
        /// Acknowledge that this run may remove many registry entries.
        #[arg(long, default_value_t = false)]
        allow_mass_removal: bool,
    },

    /// Write every registry asset to <out>/<contract>.json
    Export {
        /// Target directory (defaults to the assets dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Create a new empty registry document. Never overwrites.
    Init {
        #[arg(long)]
        name: String,

        /// Network tag stored in the metadata (e.g. mainnet, testnet)
        #[arg(long, default_value = "mainnet")]
        network: String,

        #[arg(long = "logo-uri")]
        logo_uri: Option<String>,

        /// Repeatable
        #[arg(long = "keyword")]
        keywords: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = commands::Context::load(&cli.config_paths, cli.registry, cli.assets_dir)?;

    match cli.cmd {
        Commands::Verify { allow_mass_removal } => {
            commands::pipeline::verify(&ctx, allow_mass_removal).await?;
        }
        Commands::Merge { allow_mass_removal } => {
            commands::pipeline::merge(&ctx, allow_mass_removal).await?;
        }
        Commands::Export { out } => {
            commands::registry::export(&ctx, out)?;
        }
        Commands::Init {
            name,
            network,
            logo_uri,
            keywords,
        } => {
            commands::registry::init(
                &ctx,
                tkl_store::InitOptions {
                    name,
                    network,
                    logo_uri,
                    keywords,
                },
            )?;
        }
        Commands::ConfigHash => {
            println!("config_hash={}", ctx.loaded.config_hash);
            println!("{}", ctx.loaded.canonical_json);
        }
    }

    Ok(())
}
