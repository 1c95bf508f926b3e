//! 测试用的脚本化评估器

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use protocol::{
    BackendFingerprint, ChessPosition, EvalError, EvalRequest, EvaluationResult, Evaluator,
    PositionKey, RawCandidate, Score,
};

/// 按固定规则给出候选的评估器
///
/// 候选走法：合法走法中出现在 `preferred` 里的，按 `preferred` 的顺序；
/// `preferred` 为空时取按 UCI 字典序排列的合法走法。第 i 个候选得到
/// `scores[i]`（白方视角），候选数不超过 `scores` 的长度。
pub struct ScriptedEvaluator {
    preferred: Vec<String>,
    scores: Vec<Score>,
    fingerprint: String,
    failing: HashSet<PositionKey>,
    empty: HashSet<PositionKey>,
    flaky: Mutex<HashMap<PositionKey, u32>>,
    unavailable: bool,
    delay: Option<Duration>,
    calls: AtomicU64,
    in_flight: AtomicU64,
    peak: AtomicU64,
    per_key: Mutex<HashMap<PositionKey, u32>>,
}

impl ScriptedEvaluator {
    pub fn new(preferred: &[&str], scores: &[Score]) -> Self {
        Self {
            preferred: preferred.iter().map(|s| s.to_string()).collect(),
            scores: scores.to_vec(),
            fingerprint: "scripted".to_string(),
            failing: HashSet::new(),
            empty: HashSet::new(),
            flaky: Mutex::new(HashMap::new()),
            unavailable: false,
            delay: None,
            calls: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            peak: AtomicU64::new(0),
            per_key: Mutex::new(HashMap::new()),
        }
    }

    /// 该局面总是返回可重试错误
    pub fn failing(mut self, key: PositionKey) -> Self {
        self.failing.insert(key);
        self
    }

    /// 该局面前 `times` 次返回可重试错误
    pub fn flaky(self, key: PositionKey, times: u32) -> Self {
        self.flaky.lock().unwrap().insert(key, times);
        self
    }

    /// 该局面没有候选
    pub fn empty_at(mut self, key: PositionKey) -> Self {
        self.empty.insert(key);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: &str) -> Self {
        self.fingerprint = fingerprint.to_string();
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 同时在途调用数的最大值
    pub fn peak_in_flight(&self) -> u64 {
        self.peak.load(Ordering::SeqCst)
    }

    /// 每个局面被调用的次数
    pub fn calls_per_key(&self) -> HashMap<PositionKey, u32> {
        self.per_key.lock().unwrap().clone()
    }

    fn candidates(&self, position: &ChessPosition) -> Vec<RawCandidate> {
        let legal = position.legal_uci_moves();
        let moves: Vec<String> = if self.preferred.is_empty() {
            let mut sorted = legal;
            sorted.sort();
            sorted
        } else {
            self.preferred
                .iter()
                .filter(|m| legal.contains(m))
                .cloned()
                .collect()
        };

        let side = position.side_to_move();
        moves
            .into_iter()
            .zip(self.scores.iter())
            .map(|(uci, &white_score)| RawCandidate::new(uci, side.relative(white_score)))
            .collect()
    }
}

/// 在途计数，离开作用域时归还
struct InFlight<'a>(&'a AtomicU64);

impl<'a> InFlight<'a> {
    fn enter(evaluator: &'a ScriptedEvaluator) -> Self {
        let now = evaluator.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        evaluator.peak.fetch_max(now, Ordering::SeqCst);
        Self(&evaluator.in_flight)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        position: &ChessPosition,
        request: EvalRequest,
    ) -> Result<EvaluationResult, EvalError> {
        let key = position.key();
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.per_key.lock().unwrap().entry(key.clone()).or_insert(0) += 1;
        let _in_flight = InFlight::enter(self);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return Err(EvalError::Unavailable("scripted backend is down".to_string()));
        }
        if self.failing.contains(&key) {
            return Err(EvalError::Degraded(format!("scripted failure at {}", key)));
        }
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(EvalError::Degraded(format!("scripted hiccup at {}", key)));
                }
            }
        }
        if self.empty.contains(&key) {
            return Ok(EvaluationResult::default());
        }

        Ok(EvaluationResult::from_candidates(
            position,
            self.candidates(position),
            request.max_moves,
        )?)
    }

    async fn check_available(&self) -> Result<(), EvalError> {
        if self.unavailable {
            return Err(EvalError::Unavailable("scripted backend is down".to_string()));
        }
        Ok(())
    }

    fn fingerprint(&self) -> BackendFingerprint {
        BackendFingerprint::new(self.fingerprint.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
