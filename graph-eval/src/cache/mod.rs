//! 评估缓存
//!
//! 以 (后端指纹, 局面键) 为键保存评估结果，跨运行复用，避免重复的网络或引擎调用。
//! 缓存只是优化：读写失败都不会影响运行的正确性。

mod file;
mod memory;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use protocol::{BackendFingerprint, CacheError, EvaluationResult, PositionKey};
use tracing::{info, warn};

pub use file::FileStore;
pub use memory::MemoryStore;

/// 评估结果存储 trait
///
/// 实现必须支持多个工作任务并发读写；同一个键的并发写入以最后一次为准。
/// 条目整体写入，不会出现读到半条数据的情况。
pub trait EvaluationStore: Send + Sync {
    /// 查询
    fn get(
        &self,
        fingerprint: &BackendFingerprint,
        key: &PositionKey,
    ) -> Option<Arc<EvaluationResult>>;

    /// 写入（覆盖旧条目）
    fn put(
        &self,
        fingerprint: &BackendFingerprint,
        key: &PositionKey,
        result: Arc<EvaluationResult>,
    );

    /// 把未落盘的写入持久化
    fn flush(&self) -> Result<(), CacheError>;

    /// 条目数
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 运行期缓存
///
/// 在存储之上加入清除模式和命中统计：清除模式下 `get` 总是未命中，
/// `put` 照常写入，这样一次清除运行会用新结果覆盖所有重新访问过的条目。
pub struct EvaluationCache {
    store: Arc<dyn EvaluationStore>,
    purge: bool,
    /// 落盘失败后退化为直通，不再尝试写盘
    degraded: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl EvaluationCache {
    pub fn new(store: Arc<dyn EvaluationStore>, purge: bool) -> Self {
        Self {
            store,
            purge,
            degraded: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// 纯内存缓存
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), false)
    }

    /// 查询
    pub fn get(
        &self,
        fingerprint: &BackendFingerprint,
        key: &PositionKey,
    ) -> Option<Arc<EvaluationResult>> {
        let found = if self.purge {
            None
        } else {
            self.store.get(fingerprint, key)
        };

        match found {
            Some(result) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 是否有可用条目，不计入命中统计。清除模式下总是 `false`。
    pub fn contains(&self, fingerprint: &BackendFingerprint, key: &PositionKey) -> bool {
        !self.purge && self.store.get(fingerprint, key).is_some()
    }

    /// 写入
    pub fn put(
        &self,
        fingerprint: &BackendFingerprint,
        key: &PositionKey,
        result: Arc<EvaluationResult>,
    ) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.store.put(fingerprint, key, result);
    }

    /// 落盘。失败时记录警告并退化为直通，不会中断运行。
    pub fn flush(&self) -> Result<(), CacheError> {
        if self.degraded.load(Ordering::Relaxed) {
            return Ok(());
        }

        match self.store.flush() {
            Ok(()) => {
                info!(entries = self.store.len(), "Evaluation cache flushed");
                Ok(())
            }
            Err(e) => {
                warn!("Evaluation cache flush failed, continuing without persistence: {}", e);
                self.degraded.store(true, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    pub fn is_purging(&self) -> bool {
        self.purge
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.store.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// 缓存统计信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
