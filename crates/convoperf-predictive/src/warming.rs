//! WarmingScheduler — priority-ordered cache warming with resource-aware
//! admission control (spec §4.8).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use convoperf_cache::CacheKey;
use convoperf_resource::ResourceProbe;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::pattern::RequestContext;
use crate::predictor::Prediction;

const MAX_QUEUE_LEN: usize = 100;
const MINUTE_MS: i64 = 60_000;

/// Materializes one predicted cache key — looks up or recomputes the
/// underlying artifact and inserts it into the relevant cache. Strategies
/// are dispatched by the operation tag parsed from the key (the portion
/// before the first `:`).
#[async_trait]
pub trait WarmingStrategy: Send + Sync {
    async fn warm(&self, key: &CacheKey, context: &RequestContext) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy)]
pub struct WarmingConfig {
    pub max_concurrent_predictions: usize,
    pub max_cpu_utilization: f64,
    pub max_memory_usage_mb: f64,
    pub max_warming_operations_per_minute: u32,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_predictions: 10,
            max_cpu_utilization: 80.0,
            max_memory_usage_mb: 512.0,
            max_warming_operations_per_minute: 10,
        }
    }
}

struct QueuedTask {
    prediction: Prediction,
    priority: f64,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for QueuedTask {}
impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Default)]
pub struct WarmingCounters {
    pub successful: AtomicU64,
    pub failed: AtomicU64,
    pub skipped_due_to_resources: AtomicU64,
}

impl WarmingCounters {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.successful.load(AtomicOrdering::Relaxed),
            self.failed.load(AtomicOrdering::Relaxed),
            self.skipped_due_to_resources.load(AtomicOrdering::Relaxed),
        )
    }
}

fn operation_tag(key: &CacheKey) -> &str {
    key.as_str().split(':').next().unwrap_or("")
}

/// Max-heap priority queue of pending warming work, with resource-aware
/// admission control and a per-key in-flight guard so the same key is never
/// warmed twice concurrently.
pub struct WarmingScheduler {
    queue: Mutex<BinaryHeap<QueuedTask>>,
    in_flight: Mutex<HashSet<CacheKey>>,
    strategies: HashMap<String, Arc<dyn WarmingStrategy>>,
    default_strategy: Option<Arc<dyn WarmingStrategy>>,
    config: WarmingConfig,
    counters: WarmingCounters,
    /// Timestamps (ms) of recently admitted warming operations, trimmed to
    /// the trailing 60s window, for the per-minute admission cap.
    admissions: Mutex<VecDeque<i64>>,
}

impl WarmingScheduler {
    pub fn new(config: WarmingConfig) -> Self {
        Self {
            queue: Mutex::new(BinaryHeap::new()),
            in_flight: Mutex::new(HashSet::new()),
            strategies: HashMap::new(),
            default_strategy: None,
            config,
            counters: WarmingCounters::default(),
            admissions: Mutex::new(VecDeque::new()),
        }
    }

    pub fn register_strategy(&mut self, operation_tag: &str, strategy: Arc<dyn WarmingStrategy>) {
        self.strategies.insert(operation_tag.to_string(), strategy);
    }

    pub fn set_default_strategy(&mut self, strategy: Arc<dyn WarmingStrategy>) {
        self.default_strategy = Some(strategy);
    }

    /// Enqueues predictions not already in flight or already queued,
    /// capping the queue at 100 entries (lowest-priority entries dropped
    /// first when the cap would be exceeded).
    pub fn queue(&self, predictions: Vec<Prediction>) {
        let in_flight = self.in_flight.lock();
        let mut queue = self.queue.lock();

        let mut queued_keys: HashSet<CacheKey> =
            queue.iter().map(|t| t.prediction.cache_key.clone()).collect();

        for prediction in predictions {
            if in_flight.contains(&prediction.cache_key) || queued_keys.contains(&prediction.cache_key) {
                continue;
            }
            let priority = prediction.priority * prediction.confidence * prediction.estimated_value;
            queued_keys.insert(prediction.cache_key.clone());
            queue.push(QueuedTask { prediction, priority });
        }

        while queue.len() > MAX_QUEUE_LEN {
            // BinaryHeap has no cheap pop-min; rebuild sorted and keep the
            // top MAX_QUEUE_LEN by priority.
            let mut sorted: Vec<QueuedTask> = std::mem::take(&mut *queue).into_sorted_vec();
            sorted.reverse();
            sorted.truncate(MAX_QUEUE_LEN);
            *queue = sorted.into_iter().collect();
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn counters(&self) -> &WarmingCounters {
        &self.counters
    }

    /// Computes how many queued tasks may be admitted this round. CPU over
    /// budget halves the base allowance; memory over budget multiplies it by
    /// 0.3; an already-saturated in-flight set zeroes it. Two or more
    /// simultaneous reasons (or a zeroed allowance) blocks the round
    /// entirely. The result is then capped at `min(allowedByResources,
    /// maxPerMinute)`, where the per-minute budget is tracked over a
    /// trailing 60s window of actual admissions.
    fn capacity(&self, resource: &dyn ResourceProbe, in_flight_len: usize, now_ms: i64) -> usize {
        let mut allowed = self.config.max_concurrent_predictions as f64;
        let mut reasons = 0u8;

        if resource.cpu_utilization() > self.config.max_cpu_utilization {
            allowed /= 2.0;
            reasons += 1;
        }
        if resource.heap_in_use_mb() > self.config.max_memory_usage_mb {
            allowed *= 0.3;
            reasons += 1;
        }
        if in_flight_len >= self.config.max_concurrent_predictions {
            allowed = 0.0;
            reasons += 1;
        }

        let allowed_by_resources = if reasons >= 2 || allowed < 1.0 {
            0
        } else {
            allowed.floor() as usize
        };

        let mut admissions = self.admissions.lock();
        while admissions.front().is_some_and(|t| now_ms - *t > MINUTE_MS) {
            admissions.pop_front();
        }
        let per_minute_remaining =
            (self.config.max_warming_operations_per_minute as usize).saturating_sub(admissions.len());

        allowed_by_resources.min(per_minute_remaining)
    }

    /// Processes one round: admits as many queued tasks as the current
    /// resource capacity and per-minute budget allow, dispatches each to its
    /// strategy concurrently, and updates the success/failure counters.
    pub async fn process(&self, resource: Arc<dyn ResourceProbe>, now_ms: i64) {
        let in_flight_len = self.in_flight.lock().len();
        let capacity = self.capacity(resource.as_ref(), in_flight_len, now_ms);

        if capacity == 0 {
            self.counters
                .skipped_due_to_resources
                .fetch_add(1, AtomicOrdering::Relaxed);
            debug!("warming round skipped: resource pressure, saturated in-flight set, or per-minute cap reached");
            return;
        }

        let mut admitted = Vec::with_capacity(capacity);
        {
            let mut queue = self.queue.lock();
            let mut in_flight = self.in_flight.lock();
            let mut admissions = self.admissions.lock();
            for _ in 0..capacity {
                let Some(task) = queue.pop() else { break };
                in_flight.insert(task.prediction.cache_key.clone());
                admissions.push_back(now_ms);
                admitted.push(task.prediction);
            }
        }
        if admitted.is_empty() {
            return;
        }

        let futures = admitted.into_iter().map(|prediction| {
            let strategy = self
                .strategies
                .get(operation_tag(&prediction.cache_key))
                .cloned()
                .or_else(|| self.default_strategy.clone());
            async move {
                let outcome = match &strategy {
                    Some(strategy) => strategy.warm(&prediction.cache_key, &prediction.context).await,
                    None => Err("no warming strategy registered".to_string()),
                };
                (prediction, outcome)
            }
        });

        let results = futures::future::join_all(futures).await;
        let mut in_flight = self.in_flight.lock();
        for (prediction, outcome) in results {
            in_flight.remove(&prediction.cache_key);
            match outcome {
                Ok(()) => {
                    self.counters.successful.fetch_add(1, AtomicOrdering::Relaxed);
                }
                Err(err) => {
                    warn!(key = %prediction.cache_key, error = %err, "warming task failed");
                    self.counters.failed.fetch_add(1, AtomicOrdering::Relaxed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoperf_cache::KeyBuilder;
    use convoperf_resource::TestResourceProbe;
    use std::sync::atomic::{AtomicUsize, Ordering as Ord2};

    fn prediction(tag: &str, content: &str, confidence: f64) -> Prediction {
        Prediction {
            cache_key: KeyBuilder::new().content_key(tag, content),
            model_kind: crate::predictor::ModelKind::Sequence,
            confidence,
            priority: 1.0,
            estimated_value: 1.0,
            context: RequestContext {
                hour_of_day: 0,
                day_of_week: 0,
                query_types: vec![],
                session_duration_ms: 0,
            },
            expiry_time_ms: 60_000,
        }
    }

    struct AlwaysSucceeds(Arc<AtomicUsize>);

    #[async_trait]
    impl WarmingStrategy for AlwaysSucceeds {
        async fn warm(&self, _key: &CacheKey, _ctx: &RequestContext) -> Result<(), String> {
            self.0.fetch_add(1, Ord2::Relaxed);
            Ok(())
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl WarmingStrategy for AlwaysFails {
        async fn warm(&self, _key: &CacheKey, _ctx: &RequestContext) -> Result<(), String> {
            Err("boom".to_string())
        }
    }

    #[tokio::test]
    async fn successful_warming_increments_counter_and_clears_in_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut scheduler = WarmingScheduler::new(WarmingConfig::default());
        scheduler.set_default_strategy(Arc::new(AlwaysSucceeds(calls.clone())));
        scheduler.queue(vec![prediction("flow", "a", 0.9)]);

        let resource: Arc<dyn ResourceProbe> = Arc::new(TestResourceProbe::new(10.0, 10.0));
        scheduler.process(resource, 0).await;

        assert_eq!(calls.load(Ord2::Relaxed), 1);
        let (successful, failed, skipped) = scheduler.counters().snapshot();
        assert_eq!(successful, 1);
        assert_eq!(failed, 0);
        assert_eq!(skipped, 0);
        assert!(scheduler.in_flight.lock().is_empty());
    }

    #[tokio::test]
    async fn failed_warming_increments_failed_counter() {
        let mut scheduler = WarmingScheduler::new(WarmingConfig::default());
        scheduler.set_default_strategy(Arc::new(AlwaysFails));
        scheduler.queue(vec![prediction("flow", "a", 0.9)]);

        let resource: Arc<dyn ResourceProbe> = Arc::new(TestResourceProbe::new(10.0, 10.0));
        scheduler.process(resource, 0).await;

        let (successful, failed, _) = scheduler.counters().snapshot();
        assert_eq!(successful, 0);
        assert_eq!(failed, 1);
    }

    #[tokio::test]
    async fn combined_cpu_and_memory_pressure_skips_the_round() {
        let mut scheduler = WarmingScheduler::new(WarmingConfig {
            max_concurrent_predictions: 10,
            max_cpu_utilization: 50.0,
            max_memory_usage_mb: 100.0,
            max_warming_operations_per_minute: 10,
        });
        let calls = Arc::new(AtomicUsize::new(0));
        scheduler.set_default_strategy(Arc::new(AlwaysSucceeds(calls.clone())));
        scheduler.queue(vec![prediction("flow", "a", 0.9)]);

        let resource: Arc<dyn ResourceProbe> = Arc::new(TestResourceProbe::new(90.0, 500.0));
        scheduler.process(resource, 0).await;

        assert_eq!(calls.load(Ord2::Relaxed), 0);
        let (_, _, skipped) = scheduler.counters().snapshot();
        assert_eq!(skipped, 1);
        assert_eq!(scheduler.queue_len(), 1);
    }

    #[tokio::test]
    async fn per_minute_cap_throttles_admission_independent_of_resources() {
        let mut scheduler = WarmingScheduler::new(WarmingConfig {
            max_concurrent_predictions: 10,
            max_cpu_utilization: 80.0,
            max_memory_usage_mb: 512.0,
            max_warming_operations_per_minute: 2,
        });
        let calls = Arc::new(AtomicUsize::new(0));
        scheduler.set_default_strategy(Arc::new(AlwaysSucceeds(calls.clone())));
        scheduler.queue(vec![
            prediction("flow", "a", 0.9),
            prediction("flow", "b", 0.9),
            prediction("flow", "c", 0.9),
        ]);
        let resource: Arc<dyn ResourceProbe> = Arc::new(TestResourceProbe::new(10.0, 10.0));

        // Resources allow all 3, but the per-minute budget is 2.
        scheduler.process(resource.clone(), 0).await;
        assert_eq!(calls.load(Ord2::Relaxed), 2);
        assert_eq!(scheduler.queue_len(), 1);

        // Same minute: budget exhausted, round is skipped entirely.
        scheduler.process(resource.clone(), 1_000).await;
        assert_eq!(calls.load(Ord2::Relaxed), 2);
        assert_eq!(scheduler.queue_len(), 1);

        // A minute later the window has rolled over and the remaining item can run.
        scheduler.process(resource, 61_000).await;
        assert_eq!(calls.load(Ord2::Relaxed), 3);
        assert_eq!(scheduler.queue_len(), 0);
    }

    #[test]
    fn queue_deduplicates_and_caps_at_one_hundred() {
        let scheduler = WarmingScheduler::new(WarmingConfig::default());
        let mut predictions = Vec::new();
        for i in 0..150 {
            predictions.push(prediction("flow", &format!("k{i}"), 0.5));
        }
        scheduler.queue(predictions);
        assert_eq!(scheduler.queue_len(), 100);
    }
}
