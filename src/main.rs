//! CLI entry point for micropub-rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "micropub-rs")]
#[command(version = "0.1.0")]
#[command(about = "A Micropub server that stores posts in a git repository", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create the content repository
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a new post
    New {
        /// Title of the new post
        title: Option<String>,

        /// Post body
        #[arg(short = 'm', long)]
        content: String,

        /// Category, may be repeated
        #[arg(short = 't', long = "category")]
        categories: Vec<String>,
    },

    /// Delete a post by identifier or URL
    Delete {
        /// Identifier, path or URL of the post
        url: String,
    },

    /// Start the Micropub server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to bind to (defaults to server.ip)
        #[arg(short, long)]
        ip: Option<String>,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "micropub_rs=debug,info"
    } else {
        "micropub_rs=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            tracing::info!("Initializing micropub-rs in {:?}", target_dir);
            let app = micropub_rs::commands::init::init_dir(&target_dir)?;
            println!("Initialized content repository in {:?}", app.repo_dir);
        }

        Commands::New {
            title,
            content,
            categories,
        } => {
            let app = micropub_rs::Micropub::new(&base_dir)?;
            tracing::info!("Creating new post");
            micropub_rs::commands::new::create_post(&app, title.as_deref(), &content, &categories)?;
        }

        Commands::Delete { url } => {
            let app = micropub_rs::Micropub::new(&base_dir)?;
            app.delete_post(&url)?;
        }

        Commands::Serve { port, ip } => {
            let app = micropub_rs::Micropub::new(&base_dir)?;
            let ip = ip.unwrap_or_else(|| app.config.server.ip.clone());
            let port = port.unwrap_or(app.config.server.port);

            tracing::info!("Starting server at http://{}:{}", ip, port);
            micropub_rs::server::start(&app, &ip, port).await?;
        }

        Commands::Version => {
            println!("micropub-rs version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
