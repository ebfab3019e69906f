mod config;
mod plan_cmd;
mod serve_cmd;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use forge_db::pool;

use config::ForgeConfig;

#[derive(Parser)]
#[command(name = "forge", about = "Plan digital products from a creator's existing content")]
struct Cli {
    /// Database URL (overrides FORGE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a forge config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = forge_db::config::DbConfig::DEFAULT_URL)]
        db_url: String,
        /// OpenAI-compatible API root
        #[arg(long)]
        llm_base_url: Option<String>,
        /// Model used for synthesis (and reranking unless configured otherwise)
        #[arg(long)]
        llm_model: Option<String>,
        /// Embedding model for semantic retrieval
        #[arg(long, default_value = config::DEFAULT_EMBEDDING_MODEL)]
        embedding_model: String,
        /// Leave the embedding model unset (lexical retrieval only)
        #[arg(long, conflicts_with = "embedding_model")]
        no_embeddings: bool,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the forge database (requires config file or env vars)
    DbInit,
    /// Plan a product from a creator's content and print the outcome
    Plan {
        /// Creator (owner) ID
        #[arg(long)]
        owner: String,
        /// course, mini_course, guide, checklist or lead_magnet
        #[arg(long)]
        product_type: String,
        /// What the product should be about
        #[arg(long)]
        brief: String,
        /// Target audience
        #[arg(long)]
        audience: Option<String>,
        /// Tone override
        #[arg(long)]
        tone: Option<String>,
        /// Mood override
        #[arg(long)]
        mood: Option<String>,
    },
    /// Serve the planning API over HTTP
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}


/// Execute the `forge init` command: write config file.
fn cmd_init(
    db_url: &str,
    llm_base_url: Option<String>,
    llm_model: Option<String>,
    embedding_model: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut llm = config::LlmSection::default();
    if let Some(base_url) = llm_base_url {
        llm.base_url = base_url;
    }
    if let Some(model) = llm_model {
        llm.model = model;
    }
    llm.embedding_model = embedding_model;

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        llm,
        ..config::ConfigFile::default()
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  llm.base_url = {}", cfg.llm.base_url);
    println!("  llm.model = {}", cfg.llm.model);
    if let Some(model) = &cfg.llm.embedding_model {
        println!("  llm.embedding_model = {model}");
    }
    println!();
    println!("Set FORGE_LLM_API_KEY (or llm.api_key in the file) before planning.");
    println!("Next: run `forge db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `forge db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = ForgeConfig::resolve(cli_db_url)?;

    println!("Initializing forge database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("forge db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            llm_base_url,
            llm_model,
            embedding_model,
            no_embeddings,
            force,
        } => {
            let embedding_model = (!no_embeddings).then_some(embedding_model);
            cmd_init(&db_url, llm_base_url, llm_model, embedding_model, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Plan {
            owner,
            product_type,
            brief,
            audience,
            tone,
            mood,
        } => {
            let resolved = ForgeConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let pipeline = plan_cmd::build_pipeline(&resolved, db_pool.clone());
            let args = plan_cmd::PlanArgs {
                owner,
                product_type,
                brief,
                audience,
                tone,
                mood,
            };
            let result = plan_cmd::run_plan(&pipeline, args).await;
            db_pool.close().await;
            if !result? {
                std::process::exit(1);
            }
        }
        Commands::Serve { bind, port } => {
            let resolved = ForgeConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let pipeline = Arc::new(plan_cmd::build_pipeline(&resolved, db_pool.clone()));
            let result = serve_cmd::run_serve(pipeline, &bind, port).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
