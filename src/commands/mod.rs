
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::MemoryError;
use crate::config::Config;
use crate::index::VectorStats;
use crate::ledger::SourceReference;
use crate::providers::{Credentials, OpenAiClient};
use crate::retrieval::{RetrievalOptions, RetrievalService};
use crate::sources::discover_sources;
use crate::store::{KnowledgeBase, ScoredReference};

/// Build a retrieval service backed by the configured OpenAI-compatible
/// endpoint. The API key comes from the environment variable named in the
/// config.
#[inline]
pub fn connect(config: &Config) -> Result<RetrievalService> {
    let credentials = Credentials::from_env(&config.provider.api_key_env)?;
    let client = Arc::new(OpenAiClient::new(&config.provider, credentials)?);

    Ok(RetrievalService::new(
        Arc::clone(&client) as _,
        client,
        RetrievalOptions::from(config),
    ))
}

/// Scan `source_dir`, embed every matching file and save the index
#[inline]
pub async fn build_index(data_dir: &Path, source_dir: &Path) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;

    let sources = discover_sources(source_dir, &config.index.extensions)?;
    if sources.is_empty() {
        println!(
            "{}",
            style(format!(
                "❌ No game files found in {} (extensions: {})",
                source_dir.display(),
                config.index.extensions.join(", ")
            ))
            .red()
        );
        return Ok(());
    }

    println!(
        "🔍 Found {} game files in {}",
        sources.len(),
        style(source_dir.display()).cyan()
    );

    let mut service = connect(&config)?;
    let index_dir = config.index_dir();

    let progress = ProgressBar::new(sources.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let result = service
        .build_and_save_with(&sources, &index_dir, |count, reference| {
            progress.set_position(count as u64);
            progress.set_message(SourceReference::path_of(reference).to_string());
        })
        .await;
    progress.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(MemoryError::NoInput) => {
            println!("{}", style("❌ No readable game files to index.").red());
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to build index"),
    };

    for path in &report.skipped {
        println!("   {} {}", style("skipped").yellow(), path.display());
    }

    println!(
        "{}",
        style(format!(
            "✅ Indexed {} files ({} dimensions)",
            report.indexed, report.dimension
        ))
        .green()
    );
    println!("   Saved to: {}", style(index_dir.display()).dim());
    info!("Index saved to {}", index_dir.display());

    Ok(())
}

/// Answer a single question, or run an interactive session when `question`
/// is `None`
#[inline]
pub fn ask(data_dir: &Path, question: Option<&str>) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;
    let mut service = connect(&config)?;

    if let Err(e) = service.load(&config.index_dir()) {
        println!("{}", crate::retrieval::describe_failure(&e));
        return Ok(());
    }

    if let Some(question) = question {
        println!("{}", service.answer(question));
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "🎮 {} assistant ready. Type 'exit' to quit.",
            config.assistant.project_name
        ))
        .bold()
        .cyan()
    );

    loop {
        let input: String = Input::new()
            .with_prompt("Ask about your game")
            .allow_empty(true)
            .interact_text()?;

        let question = input.trim();
        if is_exit_command(question) {
            println!("👋 Goodbye!");
            break;
        }
        if question.is_empty() {
            continue;
        }

        println!();
        println!("{}", service.answer(question));
        println!();
    }

    Ok(())
}

fn is_exit_command(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// Show the nearest files to `query`, grouped by directory
#[inline]
pub fn search_files(data_dir: &Path, query: &str, top_k: Option<usize>) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;
    let mut service = connect(&config)?;
    service.load(&config.index_dir())?;

    let top_k = top_k.unwrap_or(config.index.top_k);
    let hits = service.search_with_distances(query, top_k)?;

    if hits.is_empty() {
        println!("❌ No relevant files found for your question.");
        return Ok(());
    }

    println!(
        "🔎 Top {} matches for {}",
        hits.len(),
        style(format!("\"{}\"", query)).cyan()
    );

    for (directory, group) in group_by_directory(&hits) {
        println!();
        println!("📁 {}", style(directory.display()).bold().yellow());
        for hit in group {
            println!(
                "   {:>8.4}  {}",
                hit.distance,
                SourceReference::path_of(&hit.reference)
            );
        }
    }

    Ok(())
}

/// Bucket hits by the directory of their file, keeping rank order inside
/// each bucket
fn group_by_directory(hits: &[ScoredReference]) -> BTreeMap<PathBuf, Vec<&ScoredReference>> {
    let mut groups: BTreeMap<PathBuf, Vec<&ScoredReference>> = BTreeMap::new();
    for hit in hits {
        let path = Path::new(SourceReference::path_of(&hit.reference));
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        groups.entry(directory).or_default().push(hit);
    }
    groups
}

/// Print every indexed file reference in index order
#[inline]
pub fn list_files(data_dir: &Path) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;
    let knowledge = match KnowledgeBase::load(&config.index_dir()) {
        Ok(knowledge) => knowledge,
        Err(MemoryError::IndexNotFound(_)) => {
            println!("No index has been built yet.");
            println!("Use 'game-memory build <SOURCE_DIR>' to create one.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "Indexed Files ({} total, {} dimensions):",
        knowledge.len(),
        knowledge.dimension()
    );
    for (position, reference) in knowledge.ledger().iter().enumerate() {
        println!("  {:>4}. {}", position, reference);
    }

    Ok(())
}

/// Print summary statistics of `sample` stored vectors
#[inline]
pub fn inspect_index(data_dir: &Path, sample: usize) -> Result<()> {
    let config = Config::load(data_dir).context("Failed to load configuration")?;
    let knowledge = KnowledgeBase::load(&config.index_dir())?;

    println!(
        "{}",
        style(format!(
            "📊 Index: {} vectors, {} dimensions",
            knowledge.len(),
            knowledge.dimension()
        ))
        .bold()
        .cyan()
    );

    for position in sample_positions(knowledge.len(), sample) {
        let vector = knowledge.vector(position)?;
        let reference = knowledge.reference(position)?;

        let Some(stats) = VectorStats::of(vector) else {
            warn!("Vector {} is empty", position);
            continue;
        };

        println!();
        println!("🔹 [{}] {}", position, style(reference).yellow());
        println!(
            "   mean {:.6}  std {:.6}  min {:.6}  max {:.6}",
            stats.mean, stats.std_dev, stats.min, stats.max
        );
        println!("   first values: {:?}", stats.head);
    }

    Ok(())
}

/// Up to `sample` positions spread evenly over `len` entries
fn sample_positions(len: usize, sample: usize) -> Vec<usize> {
    let count = sample.min(len);
    let mut positions: Vec<usize> = (0..count).map(|i| i * len / count).collect();
    positions.dedup();
    positions
}
