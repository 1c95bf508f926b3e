//! 内存存储

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use protocol::{BackendFingerprint, CacheError, EvaluationResult, PositionKey};

use super::EvaluationStore;

type Entries = HashMap<(BackendFingerprint, PositionKey), Arc<EvaluationResult>>;

/// 不落盘的存储，用于测试和 `--no-cache` 运行
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvaluationStore for MemoryStore {
    fn get(
        &self,
        fingerprint: &BackendFingerprint,
        key: &PositionKey,
    ) -> Option<Arc<EvaluationResult>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(&(fingerprint.clone(), key.clone())).cloned()
    }

    fn put(
        &self,
        fingerprint: &BackendFingerprint,
        key: &PositionKey,
        result: Arc<EvaluationResult>,
    ) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert((fingerprint.clone(), key.clone()), result);
    }

    fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
