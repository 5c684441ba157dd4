mod seed;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Canteiro quality-control tracking service.
#[derive(Parser)]
#[command(
    name = "canteiro",
    version,
    about = "Canteiro construction-site quality-control tracking service"
)]
struct Cli {
    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP JSON API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "3000")]
        port: u16,
        /// Address to bind (use 0.0.0.0 to accept non-local connections)
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// SQLite database URL (default: $CANTEIRO_DATABASE_URL, then sqlite://canteiro.db)
        #[arg(long)]
        database: Option<String>,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Provision the demo activities for a work (idempotent)
    Seed {
        /// SQLite database URL (default: $CANTEIRO_DATABASE_URL, then sqlite://canteiro.db)
        #[arg(long)]
        database: Option<String>,
        /// Work to seed
        #[arg(long, default_value = "1")]
        work_id: i64,
    },
}

/// Database URL resolution: flag, then env, then the local default file.
fn resolve_database_url(flag: Option<String>) -> String {
    flag.or_else(|| {
        std::env::var("CANTEIRO_DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
    })
    .unwrap_or_else(|| "sqlite://canteiro.db".to_string())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("canteiro=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            bind,
            database,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                eprintln!("error: --tls-cert and --tls-key must both be provided");
                process::exit(1);
            }
            let database_url = resolve_database_url(database);
            let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            if let Err(e) = rt.block_on(serve::start_server(
                port,
                bind,
                database_url,
                tls_cert,
                tls_key,
            )) {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
        Commands::Seed { database, work_id } => {
            let database_url = resolve_database_url(database);
            let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
            if let Err(e) = rt.block_on(seed::run_seed(&database_url, work_id, cli.quiet)) {
                eprintln!("Seed error: {}", e);
                process::exit(1);
            }
        }
    }
}
