use std::path::PathBuf;

use clap::{Parser, Subcommand};
use game_memory::commands::{ask, build_index, inspect_index, list_files, search_files};
use game_memory::config::{resolve_data_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "game-memory")]
#[command(about = "Semantic memory over a game's source files, answering questions with an LLM")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the saved index
    #[arg(long, global = true, env = "GAME_MEMORY_HOME")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the provider, index and assistant settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Embed every game source file and save the index
    Build {
        /// Root of the game source tree
        #[arg(default_value = "src/")]
        source_dir: PathBuf,
    },
    /// Ask a question about the game; starts an interactive session when no
    /// question is given
    Ask {
        question: Option<String>,
    },
    /// Show the files nearest to a query
    Search {
        query: String,
        /// Number of files to return (defaults to the configured top_k)
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// List every indexed file
    List,
    /// Print statistics for a sample of stored vectors
    Inspect {
        /// Number of vectors to sample
        #[arg(long, default_value_t = 5)]
        sample: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&data_dir)?;
            } else {
                run_interactive_config(&data_dir)?;
            }
        }
        Commands::Build { source_dir } => {
            build_index(&data_dir, &source_dir).await?;
        }
        Commands::Ask { question } => {
            ask(&data_dir, question.as_deref())?;
        }
        Commands::Search { query, top_k } => {
            search_files(&data_dir, &query, top_k)?;
        }
        Commands::List => {
            list_files(&data_dir)?;
        }
        Commands::Inspect { sample } => {
            inspect_index(&data_dir, sample)?;
        }
    }

    Ok(())
}
