//! 错误类型定义

use thiserror::Error;

/// 局面表示错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    /// 无法解析的 FEN 字符串
    #[error("Invalid FEN string '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    /// FEN 语法正确但局面不合法
    #[error("Illegal position '{fen}': {reason}")]
    IllegalPosition { fen: String, reason: String },

    /// 走法在当前局面下无效
    #[error("Invalid move {uci} in position '{fen}'")]
    InvalidMove { uci: String, fen: String },
}

/// 评估后端错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// 后端完全不可达，继续运行没有意义
    #[error("Evaluation backend unavailable: {0}")]
    Unavailable(String),

    /// 单次请求失败，可以重试
    #[error("Evaluation request failed: {0}")]
    Degraded(String),

    /// 后端返回的局面或走法无法解析
    #[error("Malformed position: {0}")]
    MalformedPosition(#[from] PositionError),
}

impl EvalError {
    /// 是否为致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvalError::Unavailable(_))
    }
}

/// 缓存持久化错误
#[derive(Error, Debug)]
pub enum CacheError {
    /// IO 错误
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 缓存文件版本不匹配
    #[error("Cache schema mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
}

/// 探索运行错误（只有这些会终止整个运行）
#[derive(Error, Debug)]
pub enum ExploreError {
    /// 评估后端不可用
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// 根局面无法评估
    #[error("Root position could not be evaluated: {0}")]
    RootUnresolved(String),

    /// 根局面无效
    #[error("Invalid root position: {0}")]
    InvalidRoot(#[from] PositionError),

    /// 工作任务异常退出
    #[error("Traversal task failed: {0}")]
    Task(String),
}

/// 探索结果类型
pub type Result<T> = std::result::Result<T, ExploreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EvalError::Unavailable("engine missing".into()).is_fatal());
        assert!(!EvalError::Degraded("timeout".into()).is_fatal());

        let malformed: EvalError = PositionError::InvalidMove {
            uci: "e2e5".into(),
            fen: "8/8/8/8/8/8/8/8 w - -".into(),
        }
        .into();
        assert!(!malformed.is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = ExploreError::BackendUnavailable("connection refused".into());
        assert_eq!(err.to_string(), "Backend unavailable: connection refused");

        let err = CacheError::VersionMismatch { expected: 1, actual: 7 };
        assert!(err.to_string().contains("expected 1, got 7"));
    }
}
