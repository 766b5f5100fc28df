mod config;
mod generate_cmd;
mod serve_cmd;
mod task_cmds;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};

use cram_core::plan::DEFAULT_DAILY_HOURS;
use cram_core::planner::StudyPlanner;
use cram_db::config::DbConfig;
use cram_db::pool;

use config::CramConfig;

#[derive(Parser)]
#[command(name = "cram", about = "Turn a syllabus into a day-by-day study checklist")]
struct Cli {
    /// Database URL (overrides CRAM_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a cram config file (no database required)
    Init {
        /// SQLite connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// API key for the generation service
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the task database and run migrations
    DbInit,
    /// Serve the study planner web form
    Serve {
        /// Address to bind (overrides [server] bind)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides [server] port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate a study plan and replace the checklist with its tasks
    Generate {
        /// Exam date (YYYY-MM-DD)
        #[arg(long)]
        exam_date: NaiveDate,
        /// Available study hours per day (1-24)
        #[arg(long, default_value_t = DEFAULT_DAILY_HOURS)]
        hours: u32,
        /// Syllabus file; `.pdf` files are text-extracted, others read as UTF-8
        #[arg(long, conflicts_with = "text")]
        syllabus: Option<PathBuf>,
        /// Syllabus text given inline
        #[arg(long)]
        text: Option<String>,
    },
    /// List the current checklist
    Tasks,
    /// Mark a task done
    Done {
        /// Task ID
        id: i64,
    },
    /// Mark a task pending again
    Undo {
        /// Task ID
        id: i64,
    },
    /// Delete every task
    Reset,
    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Execute the `cram init` command: write config file.
fn cmd_init(db_url: &str, api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        generator: config::GeneratorSection {
            api_key,
            ..Default::default()
        },
        server: config::ServerSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if has_key {
        println!("  generator.api_key = <set>");
    } else {
        println!("  generator.api_key not set; export CRAM_API_KEY or edit the file.");
    }
    println!();
    println!("Next: run `cram db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `cram db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = CramConfig::resolve(cli_db_url)?;

    println!("Initializing cram database...");

    let db_pool = pool::open(&resolved.db_config).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("cram db-init complete.");
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
            api_key,
            force,
        } => {
            cmd_init(&db_url, api_key, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = CramConfig::resolve(cli.database_url.as_deref())?;
            let generator = resolved.generator.build_generator()?;
            let db_pool = pool::open(&resolved.db_config).await?;
            let planner = Arc::new(StudyPlanner::new(db_pool.clone(), generator));
            let bind = bind.unwrap_or(resolved.server.bind);
            let port = port.unwrap_or(resolved.server.port);
            let result = serve_cmd::run_serve(planner, &bind, port).await;
            db_pool.close().await;
            result?;
        }
        Commands::Generate {
            exam_date,
            hours,
            syllabus,
            text,
        } => {
            let resolved = CramConfig::resolve(cli.database_url.as_deref())?;
            let generator = resolved.generator.build_generator()?;
            let db_pool = pool::open(&resolved.db_config).await?;
            let planner = StudyPlanner::new(db_pool.clone(), generator);
            let args = generate_cmd::GenerateArgs {
                exam_date,
                hours,
                syllabus,
                text,
            };
            let result = generate_cmd::run_generate(&planner, args).await;
            db_pool.close().await;
            result?;
        }
        Commands::Tasks => {
            let resolved = CramConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::open(&resolved.db_config).await?;
            let result = task_cmds::run_list(&db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Done { id } => {
            let resolved = CramConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::open(&resolved.db_config).await?;
            let result = task_cmds::run_set_done(&db_pool, id, true).await;
            db_pool.close().await;
            result?;
        }
        Commands::Undo { id } => {
            let resolved = CramConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::open(&resolved.db_config).await?;
            let result = task_cmds::run_set_done(&db_pool, id, false).await;
            db_pool.close().await;
            result?;
        }
        Commands::Reset => {
            let resolved = CramConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::open(&resolved.db_config).await?;
            let result = task_cmds::run_reset(&db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "cram", &mut std::io::stdout());
        }
    }

    Ok(())
}
