//! # Image catalog CLI (`imgcat`)
//!
//! ## Usage
//!
//! ```bash
//! imgcat --config ./config/imgcat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `imgcat init` | Create the SQLite database, schema and image directory |
//! | `imgcat serve` | Start the HTTP server |
//! | `imgcat list` | List all images with their tags |
//! | `imgcat get <id>` | Show one image record |
//! | `imgcat upload <file>` | Ingest a local image file |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `img_catalog=info,tower_http=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use img_catalog::{config, ingest, migrate, query, server};

/// Image catalog: upload, list and serve tagged images.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Missing files fall back to defaults; `IMG_SQLITE_PATH`,
/// `IMAGE_PATH` and `IMGCAT_BIND` override individual settings.
#[derive(Parser)]
#[command(name = "imgcat", version, about = "Image catalog: upload, list and serve tagged images")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/imgcat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and image directory.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// List all images with their captions and tags.
    List,

    /// Show one image record by id.
    Get {
        /// Image id.
        id: i64,
    },

    /// Ingest a local image file.
    ///
    /// Prints the stored record (including its path and URL) as JSON.
    Upload {
        /// Path to the image file.
        path: PathBuf,

        /// Caption stored with the image.
        #[arg(long)]
        caption: Option<String>,

        /// Tag to attach; repeat for several tags.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Content type to record instead of guessing from the filename.
        #[arg(long)]
        content_type: Option<String>,
    },
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "img_catalog=info,tower_http=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::List => {
            query::run_list(&cfg).await?;
        }
        Commands::Get { id } => {
            query::run_get(&cfg, id).await?;
        }
        Commands::Upload {
            path,
            caption,
            tags,
            content_type,
        } => {
            ingest::run_upload(&cfg, &path, caption, tags, content_type).await?;
        }
    }

    Ok(())
}
