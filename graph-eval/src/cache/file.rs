//! JSON 文件存储
//!
//! 打开时整体读入内存，落盘时写临时文件再重命名，
//! 进程中途退出不会留下半写的缓存文件。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use protocol::{BackendFingerprint, CacheError, EvaluationResult, PositionKey, CACHE_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::EvaluationStore;

/// 内存中的条目
struct StoredEntry {
    stored_at: DateTime<Utc>,
    result: Arc<EvaluationResult>,
}

type Entries = HashMap<(BackendFingerprint, PositionKey), StoredEntry>;

/// 落盘格式中的一条
#[derive(Serialize)]
struct EntryRef<'a> {
    fingerprint: &'a BackendFingerprint,
    key: &'a PositionKey,
    stored_at: DateTime<Utc>,
    result: &'a EvaluationResult,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    version: u32,
    entries: Vec<EntryRef<'a>>,
}

#[derive(Deserialize)]
struct EntryOwned {
    fingerprint: BackendFingerprint,
    key: PositionKey,
    stored_at: DateTime<Utc>,
    result: EvaluationResult,
}

#[derive(Deserialize)]
struct CacheFileOwned {
    version: u32,
    entries: Vec<EntryOwned>,
}

/// JSON 文件存储
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<Entries>,
    dirty: AtomicBool,
}

impl FileStore {
    /// 打开缓存文件
    ///
    /// 文件不存在、无法读取、损坏或版本不符时都从空缓存开始，只记录警告。
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::load(&path) {
            Ok(entries) => {
                info!(path = %path.display(), entries = entries.len(), "Evaluation cache loaded");
                entries
            }
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No evaluation cache yet, starting empty");
                HashMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), "Evaluation cache unreadable, starting empty: {}", e);
                HashMap::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    /// 读取缓存文件
    fn load(path: &Path) -> Result<Entries, CacheError> {
        let content = fs::read_to_string(path)?;
        let file: CacheFileOwned = serde_json::from_str(&content)?;

        if file.version != CACHE_SCHEMA_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_SCHEMA_VERSION,
                actual: file.version,
            });
        }

        Ok(file
            .entries
            .into_iter()
            .map(|e| {
                let entry = StoredEntry {
                    stored_at: e.stored_at,
                    result: Arc::new(e.result),
                };
                ((e.fingerprint, e.key), entry)
            })
            .collect())
    }

    /// 获取缓存文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 临时文件路径（与目标同目录，保证重命名是原子的）
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl EvaluationStore for FileStore {
    fn get(
        &self,
        fingerprint: &BackendFingerprint,
        key: &PositionKey,
    ) -> Option<Arc<EvaluationResult>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&(fingerprint.clone(), key.clone()))
            .map(|entry| entry.result.clone())
    }

    fn put(
        &self,
        fingerprint: &BackendFingerprint,
        key: &PositionKey,
        result: Arc<EvaluationResult>,
    ) {
        let entry = StoredEntry {
            stored_at: Utc::now(),
            result,
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert((fingerprint.clone(), key.clone()), entry);
        self.dirty.store(true, Ordering::Relaxed);
    }

    fn flush(&self) -> Result<(), CacheError> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let json = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            let mut refs: Vec<EntryRef<'_>> = entries
                .iter()
                .map(|((fingerprint, key), entry)| EntryRef {
                    fingerprint,
                    key,
                    stored_at: entry.stored_at,
                    result: &entry.result,
                })
                .collect();
            // 固定顺序，便于对比缓存文件
            refs.sort_by(|a, b| (a.fingerprint, a.key).cmp(&(b.fingerprint, b.key)));

            serde_json::to_string(&CacheFileRef {
                version: CACHE_SCHEMA_VERSION,
                entries: refs,
            })
        };

        let result = json.map_err(CacheError::from).and_then(|json| {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let temp = self.temp_path();
            fs::write(&temp, json)?;
            fs::rename(&temp, &self.path)?;
            Ok(())
        });

        if result.is_err() {
            // 下次仍需重试落盘
            self.dirty.store(true, Ordering::Relaxed);
        }
        result
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
