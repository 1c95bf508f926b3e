//! 探索统计

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 运行期间的计数器，各任务并发累加
#[derive(Debug, Default)]
pub struct ExploreCounters {
    nodes_visited: AtomicU64,
    evaluator_calls: AtomicU64,
    cache_hits: AtomicU64,
    joined: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    dropped_branches: AtomicU64,
}

impl ExploreCounters {
    pub fn record_visit(&self) {
        self.nodes_visited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_call(&self) {
        self.evaluator_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// 搭上了同一局面已有的评估
    pub fn record_join(&self) {
        self.joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_branches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ExploreStats {
        ExploreStats {
            nodes_visited: self.nodes_visited.load(Ordering::Relaxed),
            evaluator_calls: self.evaluator_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            dropped_branches: self.dropped_branches.load(Ordering::Relaxed),
        }
    }
}

/// 探索统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExploreStats {
    /// 访问过的搜索节点（按路径计）
    pub nodes_visited: u64,
    /// 实际发出的评估请求（含重试）
    pub evaluator_calls: u64,
    pub cache_hits: u64,
    pub joined: u64,
    pub retries: u64,
    /// 重试耗尽仍失败的局面
    pub failures: u64,
    /// 因数据异常被放弃的分支
    pub dropped_branches: u64,
}

impl ExploreStats {
    /// 不需要调用后端的评估所占比例
    pub fn reuse_rate(&self) -> f64 {
        let reused = self.cache_hits + self.joined;
        let total = reused + self.evaluator_calls - self.retries;
        if total == 0 {
            0.0
        } else {
            reused as f64 / total as f64
        }
    }
}
