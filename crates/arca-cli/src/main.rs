//! Arca CLI — command-line client for the arca API.
//!
//! Set ARCA_API_URL when the service is not on the default port.

use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use arca_cli::{init_tracing, ApiClient};

#[derive(Parser)]
#[command(name = "arca", about = "Arca archive appliance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show runtime flags and entity counts
    Status,
    /// Enqueue downloads for one or more URLs
    Download {
        urls: Vec<String>,
        /// Downloader to use instead of automatic selection
        #[arg(long)]
        downloader: Option<String>,
        /// Repeat every N seconds (recurring download)
        #[arg(long)]
        frequency: Option<i64>,
        /// Destination directory relative to the media root
        #[arg(long)]
        destination: Option<String>,
    },
    /// List downloads
    Downloads,
    /// Kill a download
    Kill { id: Uuid },
    /// Requeue every failed download
    RetryFailed,
    /// Refresh the media root, or specific paths under it
    Refresh { paths: Vec<String> },
    /// List collections, optionally by kind (domain, channel, manual)
    Collections {
        #[arg(long)]
        kind: Option<String>,
    },
    /// Show the recent event feed
    Events,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let client = ApiClient::from_env()?;

    let value = match cli.command {
        Commands::Status => client.status().await?,
        Commands::Download {
            urls,
            downloader,
            frequency,
            destination,
        } => {
            if urls.is_empty() {
                anyhow::bail!("Provide at least one URL");
            }
            client
                .create_downloads(
                    &urls,
                    downloader.as_deref(),
                    frequency,
                    destination.as_deref(),
                )
                .await?
        }
        Commands::Downloads => client.list_downloads().await?,
        Commands::Kill { id } => client.kill_download(id).await?,
        Commands::RetryFailed => client.retry_failed().await?,
        Commands::Refresh { paths } => client.refresh(&paths).await?,
        Commands::Collections { kind } => client.list_collections(kind.as_deref()).await?,
        Commands::Events => client.events().await?,
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
