//! 协议常量定义

use std::time::Duration;

/// 标准初始局面 FEN
pub const STANDARD_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// 缓存文件格式版本号
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// 将杀分数基准（与引擎约定一致，距将杀每多一步减 1）
pub const MATE_SCORE: i32 = 30000;

/// 默认最大深度（半回合）
pub const DEFAULT_MAX_DEPTH: u32 = 6;

/// 默认 alpha 下界（白方）
pub const DEFAULT_ALPHA: i32 = 0;

/// 默认 beta 下界（黑方）
pub const DEFAULT_BETA: i32 = 15;

/// 每个局面最多请求的候选走法数
pub const DEFAULT_MAX_MOVES: usize = 10;

/// 单个局面评估的默认尝试次数
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// 重试基础退避（毫秒）
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

/// HTTP 后端请求超时（秒）
pub const HTTP_TIMEOUT_SECS: u64 = 3;

/// 健康检查超时（秒）
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// 健康检查超时 Duration
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);
