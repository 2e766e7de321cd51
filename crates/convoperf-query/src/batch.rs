//! BatchExecutor — bounded-parallel fan-out over a sequence, plus a
//! streaming variant that yields completed batches under memory pressure
//! (spec §4.5).

use std::sync::Arc;

use convoperf_resource::ResourceProbe;
use futures::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Bounds honored by every fan-out: at most `batch_size` items per batch,
/// at most `parallelism` batches in flight concurrently.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub parallelism: usize,
    /// If true, the first item failure aborts the whole run instead of
    /// being recorded as a `None` in the result slot.
    pub fail_fast: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            parallelism: 4,
            fail_fast: false,
        }
    }
}

pub struct BatchExecutor {
    config: BatchConfig,
}

fn chunk_owned<T>(mut items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut out = Vec::new();
    while !items.is_empty() {
        let n = size.min(items.len());
        let rest = items.split_off(n);
        out.push(items);
        items = rest;
    }
    out
}

impl BatchExecutor {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Run `processor` over every item, batched and bounded-parallel.
    /// Results are returned in input order; an individual item failure
    /// yields `None` in its slot (and is logged) unless `fail_fast` is set,
    /// in which case the first failure short-circuits the remaining
    /// batches.
    pub async fn run_parallel<T, R, F, Fut>(&self, items: Vec<T>, processor: F) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<R, String>> + Send + 'static,
    {
        let n = items.len();
        let indexed: Vec<(usize, T)> = items.into_iter().enumerate().collect();
        let batches = chunk_owned(indexed, self.config.batch_size);
        let processor = Arc::new(processor);
        let fail_fast = self.config.fail_fast;
        let parallelism = self.config.parallelism.max(1);

        let mut results: Vec<Option<R>> = (0..n).map(|_| None).collect();
        let aborted = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let batch_futures = batches.into_iter().map(|batch| {
            let processor = processor.clone();
            let aborted = aborted.clone();
            async move {
                if aborted.load(std::sync::atomic::Ordering::SeqCst) {
                    return Vec::new();
                }
                let item_futures = batch.into_iter().map(|(idx, item)| {
                    let processor = processor.clone();
                    async move {
                        match processor(item).await {
                            Ok(value) => (idx, Some(value)),
                            Err(err) => {
                                warn!(error = %err, index = idx, "batch item failed");
                                (idx, None)
                            }
                        }
                    }
                });
                futures::future::join_all(item_futures).await
            }
        });

        let mut stream = stream::iter(batch_futures).buffer_unordered(parallelism);
        while let Some(batch_result) = stream.next().await {
            let mut batch_failed = false;
            for (idx, value) in batch_result {
                if value.is_none() {
                    batch_failed = true;
                }
                results[idx] = value;
            }
            if fail_fast && batch_failed {
                aborted.store(true, std::sync::atomic::Ordering::SeqCst);
                break;
            }
        }

        results
    }

    /// Streaming variant: an explicit, finite, single-pass sequence of
    /// completed batches (never a restartable generator, per the
    /// "non-restartable generators" design note). After each batch, checks
    /// `heap_in_use_mb() > 0.8 * max_memory_mb`; if true, suggests a GC
    /// hint and pauses admission of the next batch until the reading drops
    /// back under the threshold.
    pub fn stream_batches<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        processor: F,
        resource: Arc<dyn ResourceProbe>,
        max_memory_mb: f64,
        cancel: Option<CancellationToken>,
    ) -> impl Stream<Item = Vec<Option<R>>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<R, String>> + Send + 'static,
    {
        let indexed: Vec<(usize, T)> = items.into_iter().enumerate().collect();
        let batches = chunk_owned(indexed, self.config.batch_size);
        let processor = Arc::new(processor);

        struct State<T> {
            remaining: std::collections::VecDeque<Vec<(usize, T)>>,
            paused: bool,
        }

        let state = State {
            remaining: batches.into(),
            paused: false,
        };

        stream::unfold(state, move |mut state| {
            let processor = processor.clone();
            let resource = resource.clone();
            let cancel = cancel.clone();
            async move {
                if let Some(token) = &cancel {
                    if token.is_cancelled() {
                        return None;
                    }
                }

                if state.paused {
                    while resource.heap_in_use_mb() > max_memory_mb * 0.8 {
                        resource.suggest_gc();
                        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
                    }
                    state.paused = false;
                }

                let batch = state.remaining.pop_front()?;
                let mut ordered: Vec<Option<R>> = (0..batch.len()).map(|_| None).collect();

                let item_futures = batch.into_iter().enumerate().map(|(local_idx, (orig_idx, item))| {
                    let processor = processor.clone();
                    async move {
                        match processor(item).await {
                            Ok(value) => (local_idx, Some(value)),
                            Err(err) => {
                                warn!(error = %err, index = orig_idx, "streaming batch item failed");
                                (local_idx, None)
                            }
                        }
                    }
                });
                for (local_idx, value) in futures::future::join_all(item_futures).await {
                    ordered[local_idx] = value;
                }

                if resource.heap_in_use_mb() > max_memory_mb * 0.8 {
                    resource.suggest_gc();
                    state.paused = true;
                }

                Some((ordered, state))
            }
        })
    }
}
