//! depscope CLI entry point

use clap::{Parser, Subcommand};
use depscope_core::RecompileReason;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "depscope")]
#[command(about = "Explain why one compilation unit recompiles when another changes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root path (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Manifest path, overriding `manifest` in depscope.toml
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every unit with its edges and recompile dependencies as JSON
    Summary {
        /// Only print units whose path fuzzy-matches this term
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Print the causal chain explaining a recompile dependency as JSON
    Explain {
        /// Unit that recompiles
        source: String,
        /// Unit whose change triggers it
        sink: String,
        /// compile, exports_then_compile, exports or compile_then_runtime
        reason: RecompileReason,

        /// Context lines around each highlighted cause
        #[arg(short, long)]
        padding: Option<usize>,
    },
    /// Fuzzy search unit paths
    Search {
        term: String,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("depscope={}", log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("depscope v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Project root: {}", cli.root.display());

    let options = commands::Options {
        root: cli.root,
        manifest: cli.manifest,
    };

    match cli.command {
        Commands::Summary { filter } => {
            commands::summary(options, filter).await
        }
        Commands::Explain { source, sink, reason, padding } => {
            commands::explain(options, source, sink, reason, padding).await
        }
        Commands::Search { term } => {
            commands::search(options, term).await
        }
        Commands::Version => {
            println!("depscope v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
