mod api;
mod block;
mod commands;
mod config;
mod error;
mod lookup;
mod scan;
mod storage;


use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use tracing_subscriber::EnvFilter;

/// Read-more links between posts, and the tools to find them
#[derive(Debug, Parser)]
#[command(name = "read-more", version)]
struct Cli {
    /// Database URL, overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search published posts in a date range for the read-more block
    Search {
        /// Last publish day to include (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date_before: Option<String>,

        /// First publish day to include (YYYY-MM-DD), defaults to 30 days ago
        #[arg(long)]
        date_after: Option<String>,

        /// Literal content to look for instead of the block delimiter
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Serve the posts REST endpoint
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },

    /// Store a new post
    Publish {
        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        content: String,

        /// Publish date, YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS"; defaults to now
        #[arg(long)]
        date: Option<String>,

        #[arg(long, default_value = "publish")]
        status: String,
    },

    /// Append a read-more block linking `post` to `target`
    Attach {
        /// Post that receives the block
        #[arg(long)]
        post: i64,

        /// Post the block links to
        #[arg(long)]
        target: i64,

        #[arg(long)]
        align: Option<String>,

        #[arg(long)]
        background_color: Option<String>,
    },

    /// Interactive post lookup against the REST endpoint, driven from stdin
    Lookup {
        /// Endpoint base URL, overrides READ_MORE_API_URL
        #[arg(long)]
        api_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    match cli.command {
        Command::Search {
            date_before,
            date_after,
            pattern,
        } => {
            commands::search(
                &config,
                date_after.as_deref(),
                date_before.as_deref(),
                pattern.as_deref(),
            )
            .await
        }
        Command::Serve { port } => {
            if let Some(port) = port {
                config.api_port = port;
            }
            commands::serve(&config).await
        }
        Command::Publish {
            title,
            content,
            date,
            status,
        } => commands::publish(&config, title, content, date.as_deref(), &status).await,
        Command::Attach {
            post,
            target,
            align,
            background_color,
        } => commands::attach(&config, post, target, align, background_color).await,
        Command::Lookup { api_url } => {
            if let Some(api_url) = api_url {
                config.api_url = api_url.trim_end_matches('/').to_string();
            }
            commands::lookup(&config).await
        }
    }
}
