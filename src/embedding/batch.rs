//! Concurrent embedding of document chunks
//!
//! Each chunk is embedded independently with at most `max_parallel`
//! requests in flight. Results land in the slot of their chunk, so the
//! output order matches the input order whatever order requests finish in.
//! The first failure aborts the whole batch.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::errors::{QaError, Result};
use crate::index::EmbeddedChunk;
use crate::retry::RetryPolicy;

/// Batch embedding settings
#[derive(Debug, Clone)]
pub struct EmbedOptions {
    pub max_parallel: usize,
    pub retry: RetryPolicy,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// Embed one text under the retry policy
pub async fn embed_text(
    embedder: &dyn Embedder,
    text: &str,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<f32>> {
    retry
        .execute("embedding", cancel, move || embedder.embed(text))
        .await
}

/// Embed every chunk, preserving chunk order
pub async fn embed_chunks(
    embedder: Arc<dyn Embedder>,
    chunks: Vec<Chunk>,
    options: &EmbedOptions,
    cancel: &CancellationToken,
) -> Result<Vec<EmbeddedChunk>> {
    let total = chunks.len();
    let parallel = options.max_parallel.max(1);
    info!(
        chunks = total,
        parallel,
        model = embedder.model_name(),
        "embedding chunks"
    );

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; total];

    {
        let embedder = &embedder;
        let retry = &options.retry;
        let mut results = stream::iter(chunks.iter().enumerate())
            .map(|(slot, chunk)| async move {
                let vector = embed_text(embedder.as_ref(), &chunk.text, retry, cancel).await?;
                debug!(chunk = chunk.id, dim = vector.len(), "chunk embedded");
                Ok::<_, QaError>((slot, vector))
            })
            .buffer_unordered(parallel);

        while let Some((slot, vector)) = results.try_next().await? {
            slots[slot] = Some(vector);
        }
    }

    chunks
        .into_iter()
        .zip(slots)
        .map(|(chunk, vector)| {
            let vector = vector.ok_or_else(|| {
                QaError::EmbeddingService(format!("chunk {} was never embedded", chunk.id))
            })?;
            Ok(EmbeddedChunk { chunk, vector })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Character-count embedder with a delay that finishes late chunks first
    struct SlowFirstEmbedder {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for SlowFirstEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = 40u64.saturating_sub(text.len() as u64 * 5);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }

        fn model_name(&self) -> &str {
            "slow-first"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("bad") {
                Err(QaError::Authentication("rejected".to_string()))
            } else {
                Ok(vec![1.0])
            }
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(id, text)| Chunk {
                id,
                source_page: 0,
                text: text.to_string(),
                start_offset: id,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_order_preserved_and_parallelism_bounded() {
        let embedder = Arc::new(SlowFirstEmbedder {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let input = chunks(&["a", "bb", "ccc", "dddd", "eeeee", "ffffff"]);
        let options = EmbedOptions {
            max_parallel: 3,
            retry: RetryPolicy::none(),
        };

        let embedded = embed_chunks(embedder.clone(), input, &options, &CancellationToken::new())
            .await
            .unwrap();

        let lengths: Vec<f32> = embedded.iter().map(|e| e.vector[0]).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        for (i, e) in embedded.iter().enumerate() {
            assert_eq!(e.chunk.id, i);
        }
        assert!(embedder.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_first_failure_aborts() {
        let input = chunks(&["ok", "bad", "ok"]);
        let err = embed_chunks(
            Arc::new(FailingEmbedder),
            input,
            &EmbedOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, QaError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let embedded = embed_chunks(
            Arc::new(FailingEmbedder),
            Vec::new(),
            &EmbedOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(embedded.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = embed_chunks(
            Arc::new(FailingEmbedder),
            chunks(&["ok"]),
            &EmbedOptions::default(),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, QaError::Cancelled));
    }
}
