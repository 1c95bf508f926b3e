//! 评估后端与评估缓存
//!
//! 包含:
//! - 评估缓存（存储 trait、内存存储、JSON 文件存储、清除模式）
//! - 云库、对局数据库、本地 UCI 引擎三种后端

pub mod backend;
pub mod cache;

pub use backend::{
    BackendConfig, ChessDbClient, ChessDbConfig, LichessClient, LichessConfig, UciConfig,
    UciEvaluator,
};
pub use cache::{CacheStats, EvaluationCache, EvaluationStore, FileStore, MemoryStore};
