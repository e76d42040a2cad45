// Retrieval module
// Builds the knowledge base from source files and answers questions against it


use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use futures::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::ledger::SourceReference;
use crate::preprocess;
use crate::providers::{ConsultationService, EmbeddingProvider};
use crate::store::{IndexedEntry, KnowledgeBase, ScoredReference};
use crate::{MemoryError, Result};

pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Tunables for building and querying
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub concurrency: usize,
    pub annotate_categories: bool,
    pub tag_embedding_text: bool,
    pub project_name: String,
    pub system_prompt: String,
}

impl Default for RetrievalOptions {
    #[inline]
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RetrievalOptions {
    #[inline]
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.index.top_k,
            concurrency: config.index.concurrency,
            annotate_categories: config.index.annotate_categories,
            tag_embedding_text: config.index.tag_embedding_text,
            project_name: config.assistant.project_name.clone(),
            system_prompt: config.assistant.system_prompt.clone(),
        }
    }
}

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed: usize,
    pub dimension: usize,
    pub skipped: Vec<PathBuf>,
}

/// A source file ready to embed
struct PendingDocument {
    reference: String,
    text: String,
}

pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingProvider>,
    consultant: Arc<dyn ConsultationService>,
    options: RetrievalOptions,
    knowledge: Option<KnowledgeBase>,
}

impl RetrievalService {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        consultant: Arc<dyn ConsultationService>,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            embedder,
            consultant,
            options,
            knowledge: None,
        }
    }

    #[inline]
    pub fn with_knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    #[inline]
    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    #[inline]
    pub fn knowledge(&self) -> Option<&KnowledgeBase> {
        self.knowledge.as_ref()
    }

    /// Load a previously saved knowledge base from `dir`
    #[inline]
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        let knowledge = KnowledgeBase::load(dir)?;
        info!("Loaded {} indexed files from {}", knowledge.len(), dir.display());
        self.knowledge = Some(knowledge);
        Ok(())
    }

    /// Embed every readable source file and replace the current knowledge base
    #[inline]
    pub async fn build_index(&mut self, source_files: &[PathBuf]) -> Result<BuildReport> {
        self.build_index_with(source_files, |_, _| {}).await
    }

    /// Same as [`build_index`](Self::build_index), calling `on_embedded` with
    /// the number of files embedded so far and the latest reference.
    ///
    /// Embedding calls may run concurrently but results are appended in
    /// source order. Any provider failure aborts the build and leaves the
    /// current knowledge base untouched.
    #[inline]
    pub async fn build_index_with<F>(
        &mut self,
        source_files: &[PathBuf],
        mut on_embedded: F,
    ) -> Result<BuildReport>
    where
        F: FnMut(usize, &str),
    {
        if source_files.is_empty() {
            return Err(MemoryError::NoInput);
        }

        let (documents, skipped) = self.prepare_documents(source_files);
        if documents.is_empty() {
            warn!("None of the {} source files could be read", source_files.len());
            return Err(MemoryError::NoInput);
        }

        info!(
            "Embedding {} files with concurrency {}",
            documents.len(),
            self.options.concurrency
        );

        let embedder = Arc::clone(&self.embedder);
        let mut embedded = stream::iter(documents)
            .map(move |document| {
                let embedder = Arc::clone(&embedder);
                async move {
                    let PendingDocument { reference, text } = document;
                    let vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
                        .await
                        .map_err(|e| anyhow!("Embedding task failed: {}", e))?;
                    Ok::<_, MemoryError>((reference, vector.map_err(MemoryError::Embedding)?))
                }
            })
            .buffered(self.options.concurrency.max(1));

        let mut knowledge: Option<KnowledgeBase> = None;
        while let Some(result) = embedded.next().await {
            let (reference, vector) = result?;

            if knowledge.is_none() {
                knowledge = Some(KnowledgeBase::new(vector.len())?);
            }
            if let Some(base) = knowledge.as_mut() {
                base.push(IndexedEntry {
                    vector,
                    reference: reference.clone(),
                })?;

                debug!("Embedded {}", reference);
                on_embedded(base.len(), &reference);
            }
        }

        let knowledge = knowledge.ok_or(MemoryError::NoInput)?;
        let report = BuildReport {
            indexed: knowledge.len(),
            dimension: knowledge.dimension(),
            skipped,
        };

        info!(
            "Built index of {} files ({} dimensions, {} skipped)",
            report.indexed,
            report.dimension,
            report.skipped.len()
        );
        self.knowledge = Some(knowledge);
        Ok(report)
    }

    /// Build from `source_files` and persist to `dir`. Nothing is written
    /// unless the build succeeds.
    #[inline]
    pub async fn build_and_save(
        &mut self,
        source_files: &[PathBuf],
        dir: &Path,
    ) -> Result<BuildReport> {
        self.build_and_save_with(source_files, dir, |_, _| {}).await
    }

    /// [`build_and_save`](Self::build_and_save) with a progress callback, as
    /// in [`build_index_with`](Self::build_index_with)
    #[inline]
    pub async fn build_and_save_with<F>(
        &mut self,
        source_files: &[PathBuf],
        dir: &Path,
        on_embedded: F,
    ) -> Result<BuildReport>
    where
        F: FnMut(usize, &str),
    {
        let report = self.build_index_with(source_files, on_embedded).await?;
        if let Some(knowledge) = &self.knowledge {
            knowledge.save(dir)?;
        }
        Ok(report)
    }

    fn prepare_documents(&self, source_files: &[PathBuf]) -> (Vec<PendingDocument>, Vec<PathBuf>) {
        let mut documents = Vec::with_capacity(source_files.len());
        let mut skipped = Vec::new();

        for path in source_files {
            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    skipped.push(path.clone());
                    continue;
                }
            };

            let document = preprocess::prepare(&content, path);
            let category = self.options.annotate_categories.then_some(document.category);

            documents.push(PendingDocument {
                reference: SourceReference::new(path, category).to_string(),
                text: document.embedding_text(self.options.tag_embedding_text),
            });
        }

        (documents, skipped)
    }

    /// References of the `top_k` nearest files, nearest first
    #[inline]
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .search_with_distances(query, top_k)?
            .into_iter()
            .map(|hit| hit.reference)
            .collect())
    }

    #[inline]
    pub fn search_with_distances(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ScoredReference>> {
        let knowledge = self.knowledge.as_ref().ok_or(MemoryError::IndexNotLoaded)?;

        let query_vector = self.embedder.embed(query).map_err(MemoryError::Embedding)?;
        let hits = knowledge.search(&query_vector, top_k)?;

        debug!("Query matched {} files", hits.len());
        Ok(hits)
    }

    /// Concatenate the contents of the referenced files, skipping any that
    /// cannot be read.
    #[inline]
    pub fn assemble_context<S: AsRef<str>>(references: &[S]) -> Result<String> {
        let mut contents = Vec::with_capacity(references.len());

        for reference in references {
            let path = SourceReference::path_of(reference.as_ref());
            match fs::read_to_string(path) {
                Ok(content) => contents.push(content),
                Err(e) => warn!("Could not read file {}: {}", path, e),
            }
        }

        if contents.is_empty() {
            return Err(MemoryError::NoContext);
        }

        Ok(contents.join(CONTEXT_SEPARATOR))
    }

    #[inline]
    pub fn build_prompt(&self, context: &str, question: &str) -> String {
        format!(
            "Context from {} game files:\n{}\n\nUser Question: {}",
            self.options.project_name, context, question
        )
    }

    /// Answer `question` from the nearest files
    #[inline]
    pub fn try_answer(&self, question: &str) -> Result<String> {
        let references = self.search(question, self.options.top_k)?;
        if references.is_empty() {
            return Err(MemoryError::NoMatches);
        }

        let context = Self::assemble_context(&references)?;
        let prompt = self.build_prompt(&context, question);

        let reply = self
            .consultant
            .complete(&self.options.system_prompt, &prompt)?;
        Ok(reply)
    }

    /// Like [`try_answer`](Self::try_answer), with failures turned into a
    /// message for the user
    #[inline]
    pub fn answer(&self, question: &str) -> String {
        match self.try_answer(question) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Question failed: {}", e);
                describe_failure(&e)
            }
        }
    }
}

/// User-facing text for a failed question
#[inline]
pub fn describe_failure(error: &MemoryError) -> String {
    match error {
        MemoryError::NoMatches => "❌ No relevant files found for your question.".to_string(),
        MemoryError::NoContext => "❌ Could not read any relevant files.".to_string(),
        MemoryError::IndexNotLoaded | MemoryError::IndexNotFound(_) => {
            "❌ Index not found! Run `game-memory build` first.".to_string()
        }
        MemoryError::Embedding(e) => format!("❌ Error embedding your question: {}", e),
        MemoryError::Provider(e) => format!("❌ Error getting AI response: {}", e),
        other => format!("❌ {}", other),
    }
}
