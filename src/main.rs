use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use groundwork::config::load_config;
use groundwork::generation::create_summarizer;
use groundwork::pipeline;
use groundwork::{db, embed_cmd, ingest, migrate, server, store};

#[derive(Parser)]
#[command(name = "gwk", version, about = "Retrieval-augmented site recommendation service")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "./config/groundwork.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Walk the configured source directory and load site records
    Ingest {
        /// Report what would be ingested without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Stop after this many items
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Embed documents that have no up-to-date vector
    Embed {
        /// Override the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,
        /// Count pending documents without calling the provider
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one query through the full pipeline and print the answer
    Query {
        /// The question to answer
        query: String,
        /// Print the raw response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show index counts
    Status,
    /// Start the HTTP server
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&config).await?;
            println!("initialized {}", config.db.path.display());
        }
        Commands::Ingest { dry_run, limit } => {
            migrate::run_migrations(&config).await?;
            ingest::run_ingest(&config, dry_run, limit).await?;
        }
        Commands::Embed {
            batch_size,
            dry_run,
        } => {
            migrate::run_migrations(&config).await?;
            embed_cmd::run_embed_pending(&config, batch_size, dry_run).await?;
        }
        Commands::Query { query, json } => {
            let query = query.trim().to_string();
            if query.is_empty() {
                anyhow::bail!("query must not be empty");
            }
            migrate::run_migrations(&config).await?;
            let pool = db::connect(&config).await?;
            let summarizer = create_summarizer(&config.generation)?;
            let response =
                pipeline::answer_query(&config, &pool, summarizer.as_ref(), &query).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.summary);
                if !response.results.is_empty() {
                    println!();
                    for result in &response.results {
                        println!(
                            "  [{:.3}] {} ({})",
                            result.relevance_score, result.name, result.location
                        );
                    }
                }
            }
        }
        Commands::Status => {
            migrate::run_migrations(&config).await?;
            let pool = db::connect(&config).await?;
            let (docs, vectors) = store::index_counts(&pool).await?;
            println!("documents: {}", docs);
            println!("vectors: {}", vectors);
        }
        Commands::Serve => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info,tower_http=debug".into()),
                )
                .init();
            server::run_server(&config).await?;
        }
    }

    Ok(())
}
