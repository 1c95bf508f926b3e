//! 局面评估的解析器
//!
//! 一次评估请求依次经过：
//! 1. 进行中表：同一局面只会有一个评估在进行，后来者等待同一个结果
//! 2. 评估缓存：命中直接返回
//! 3. 并发许可：同时在途的后端请求不超过上限
//! 4. 后端调用：非致命错误按指数退避重试
//!
//! 取消时关闭许可信号量，所有等待中的请求立即得到 `Fatal`。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use graph_eval::EvaluationCache;
use protocol::{
    BackendFingerprint, ChessPosition, EvalRequest, EvaluationResult, Evaluator, PositionKey,
    RetryPolicy,
};
use rand::Rng;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, warn};

use crate::stats::ExploreCounters;

/// 一个局面的评估结局
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Arc<EvaluationResult>),
    /// 重试耗尽，该分支作为未解析叶子保留
    Failed(String),
    /// 后端不可用或运行已取消
    Fatal(String),
}

pub struct Resolver {
    evaluator: Arc<dyn Evaluator>,
    cache: Arc<EvaluationCache>,
    fingerprint: BackendFingerprint,
    request: EvalRequest,
    retry: RetryPolicy,
    permits: Semaphore,
    inflight: Mutex<HashMap<PositionKey, Arc<OnceCell<Resolution>>>>,
    counters: Arc<ExploreCounters>,
}

impl Resolver {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        cache: Arc<EvaluationCache>,
        request: EvalRequest,
        retry: RetryPolicy,
        concurrency: usize,
        counters: Arc<ExploreCounters>,
    ) -> Self {
        let fingerprint = request_fingerprint(&evaluator.fingerprint(), request);
        Self {
            evaluator,
            cache,
            fingerprint,
            request,
            retry,
            permits: Semaphore::new(concurrency.max(1)),
            inflight: Mutex::new(HashMap::new()),
            counters,
        }
    }

    /// 该局面在本次运行的缓存视图中是否已有结果
    pub fn is_cached(&self, key: &PositionKey) -> bool {
        self.cache.contains(&self.fingerprint, key)
    }

    /// 评估一个局面，同一局面在整次运行中只解析一次
    pub async fn resolve(&self, key: &PositionKey, position: &ChessPosition) -> Resolution {
        let cell = {
            let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let mut initialized_here = false;
        let flag = &mut initialized_here;
        let resolution = cell
            .get_or_init(move || async move {
                *flag = true;
                self.fetch(key, position).await
            })
            .await
            .clone();

        if !initialized_here {
            debug!("Joined existing evaluation of {}", key);
            self.counters.record_join();
        }
        resolution
    }

    /// 停止发放许可，之后的请求都得到 `Fatal`
    pub fn cancel(&self) {
        self.permits.close();
    }

    async fn fetch(&self, key: &PositionKey, position: &ChessPosition) -> Resolution {
        if let Some(hit) = self.cache.get(&self.fingerprint, key) {
            self.counters.record_cache_hit();
            return Resolution::Resolved(hit);
        }

        let attempts = self.retry.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                self.counters.record_retry();
                let delay = self.backoff(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let permit = match self.permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => return Resolution::Fatal("exploration cancelled".to_string()),
            };
            self.counters.record_call();
            let outcome = self.evaluator.evaluate(position, self.request).await;
            drop(permit);

            match outcome {
                Ok(result) => {
                    let result = Arc::new(result);
                    self.cache.put(&self.fingerprint, key, result.clone());
                    return Resolution::Resolved(result);
                }
                Err(e) if e.is_fatal() => return Resolution::Fatal(e.to_string()),
                Err(e) => {
                    warn!(
                        "Evaluation of {} failed (attempt {}/{}): {}",
                        key, attempt, attempts, e
                    );
                    last_error = e.to_string();
                }
            }
        }

        self.counters.record_failure();
        Resolution::Failed(last_error)
    }

    /// 第 n 次尝试前的等待：`base * 2^(n-2)` 加不超过一半的随机抖动
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry.backoff_ms;
        if base == 0 {
            return Duration::ZERO;
        }
        let exp = base.saturating_mul(1u64 << (attempt - 2).min(16));
        let jitter = rand::thread_rng().gen_range(0..=exp / 2);
        Duration::from_millis(exp.saturating_add(jitter))
    }
}

/// 请求参数会影响评估内容，一并计入缓存指纹
pub fn request_fingerprint(
    backend: &BackendFingerprint,
    request: EvalRequest,
) -> BackendFingerprint {
    BackendFingerprint::new(format!(
        "{}|moves={}|strength={}",
        backend, request.max_moves, request.strength
    ))
}
