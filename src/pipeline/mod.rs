//! Question-answering orchestrator
//!
//! One run: load → chunk → embed → index → retrieve → prompt → generate.
//! Stages are tracked by [`StageTracker`]; the first failure moves the run
//! to `Failed` and is returned unchanged.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::chunking::{Chunk, Chunker};
use crate::config::Config;
use crate::document::DocumentLoader;
use crate::embedding::{batch::embed_text, embed_chunks, EmbedOptions, Embedder};
use crate::errors::{QaError, Result};
use crate::index::{ScoredChunk, VectorIndex};
use crate::llm::LanguageModel;
use crate::prompt::PromptBuilder;
use crate::retry::RetryPolicy;

pub mod stage;

pub use stage::{PipelineStage, StageTracker};

/// Time spent reaching one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub duration: Duration,
}

/// Run statistics attached to every answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub page_count: usize,
    pub chunk_count: usize,
    pub embedding_dim: usize,
    pub prompt_tokens: usize,
    /// Chunks that fit the prompt budget
    pub context_chunks: usize,
    pub stage_timings: Vec<StageTiming>,
}

impl RunStats {
    pub fn total_duration(&self) -> Duration {
        self.stage_timings.iter().map(|t| t.duration).sum()
    }

    pub fn duration_of(&self, stage: PipelineStage) -> Option<Duration> {
        self.stage_timings
            .iter()
            .find(|t| t.stage == stage)
            .map(|t| t.duration)
    }
}

/// Generated answer with its supporting context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Retrieved chunks, best match first
    pub source_chunks: Vec<Chunk>,
    /// Cosine similarity of each source chunk
    pub scores: Vec<f32>,
    pub stats: RunStats,
}

impl Answer {
    fn new(text: String, retrieved: Vec<ScoredChunk>, stats: RunStats) -> Self {
        let (source_chunks, scores): (Vec<Chunk>, Vec<f32>) = retrieved
            .into_iter()
            .map(|s| (s.chunk, s.score))
            .unzip();
        Self {
            text,
            source_chunks,
            scores,
            stats,
        }
    }
}

type StageObserver = Box<dyn Fn(PipelineStage) + Send + Sync>;

/// Document question-answering pipeline
pub struct QaPipeline {
    config: Config,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    cancel: CancellationToken,
    observer: Option<StageObserver>,
}

impl QaPipeline {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            config,
            embedder,
            llm,
            cancel: CancellationToken::new(),
            observer: None,
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called after every stage change, e.g. to drive a progress display
    pub fn on_stage<F>(mut self, observer: F) -> Self
    where
        F: Fn(PipelineStage) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Answer `question` from the document at `path`
    pub async fn answer(&self, path: impl AsRef<Path>, question: &str) -> Result<Answer> {
        let path = path.as_ref();
        self.validate(question)?;

        let mut tracker = StageTracker::new();
        let span = info_span!("answer", path = %path.display());

        match self.run(path, question, &mut tracker).instrument(span).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                warn!(stage = ?tracker.current(), error = %e, "pipeline failed");
                // Only fails if already terminal, which a failed run never is
                if tracker.fail().is_ok() {
                    self.notify(PipelineStage::Failed);
                }
                Err(e)
            }
        }
    }

    /// Reject bad input before any expensive work
    fn validate(&self, question: &str) -> Result<()> {
        if question.trim().is_empty() {
            return Err(QaError::Config("question must not be empty".to_string()));
        }

        if self.config.retrieval.top_k == 0 {
            return Err(QaError::Config(
                "retrieval.top_k must be greater than 0".to_string(),
            ));
        }

        self.config.generation.params().validate()
    }

    async fn run(
        &self,
        path: &Path,
        question: &str,
        tracker: &mut StageTracker,
    ) -> Result<Answer> {
        let retry = RetryPolicy::from_config(&self.config.retry);
        let mut stats = RunStats::default();

        // Load
        let started = Instant::now();
        let loader = DocumentLoader::new(self.config.document.load_timeout());
        let document = self
            .guard(loader.load(path))
            .instrument(info_span!("load"))
            .await?;
        stats.page_count = document.page_count();
        self.finish_stage(tracker, &mut stats, started)?;

        // Chunk
        let started = Instant::now();
        let chunks = info_span!("chunk").in_scope(|| -> Result<Vec<Chunk>> {
            let chunker = Chunker::new(self.config.chunking.clone())?;
            let chunks = chunker.split(&document);
            info!(
                chunks = chunks.len(),
                window = chunker.window(),
                overlap = chunker.overlap(),
                "document chunked"
            );
            Ok(chunks)
        })?;
        stats.chunk_count = chunks.len();
        self.finish_stage(tracker, &mut stats, started)?;

        // Embed
        let started = Instant::now();
        let options = EmbedOptions {
            max_parallel: self.config.embedding.max_parallel,
            retry: retry.clone(),
        };
        let embedded = embed_chunks(self.embedder.clone(), chunks, &options, &self.cancel)
            .instrument(info_span!("embed"))
            .await?;
        self.finish_stage(tracker, &mut stats, started)?;

        // Index
        let started = Instant::now();
        let index = VectorIndex::build(embedded)?;
        stats.embedding_dim = index.dim();
        info!(entries = index.len(), dim = index.dim(), "index built");
        self.finish_stage(tracker, &mut stats, started)?;

        // Retrieve
        let started = Instant::now();
        let top_k = self.config.retrieval.top_k;
        let retrieved = async {
            let query = embed_text(self.embedder.as_ref(), question, &retry, &self.cancel).await?;
            let hits = index.query(&query, top_k)?;
            info!(
                requested = top_k,
                returned = hits.len(),
                best = hits.first().map(|h| h.score).unwrap_or_default(),
                "context retrieved"
            );
            Ok::<_, QaError>(hits)
        }
        .instrument(info_span!("retrieve", top_k))
        .await?;
        self.finish_stage(tracker, &mut stats, started)?;

        // Prompt and generate
        let started = Instant::now();
        let prompt = PromptBuilder::from_config(&self.config.prompt).build(question, &retrieved);
        stats.prompt_tokens = prompt.estimated_tokens;
        stats.context_chunks = prompt.included;

        let params = self.config.generation.params();
        let llm = self.llm.as_ref();
        let text = retry
            .execute("generation", &self.cancel, || llm.generate(&prompt.text, &params))
            .instrument(info_span!("generate", model = llm.model_id()))
            .await?;
        info!(
            prompt_tokens = prompt.estimated_tokens,
            answer_chars = text.chars().count(),
            "answer generated"
        );
        self.finish_stage(tracker, &mut stats, started)?;

        Ok(Answer::new(text, retrieved, stats))
    }

    fn finish_stage(
        &self,
        tracker: &mut StageTracker,
        stats: &mut RunStats,
        started: Instant,
    ) -> Result<()> {
        let stage = tracker.advance()?;
        stats.stage_timings.push(StageTiming {
            stage,
            duration: started.elapsed(),
        });
        self.notify(stage);
        Ok(())
    }

    fn notify(&self, stage: PipelineStage) {
        if let Some(observer) = &self.observer {
            observer(stage);
        }
    }

    /// Race a future against cancellation
    async fn guard<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(QaError::Cancelled),
            result = future => result,
        }
    }
}
