//! 评估后端
//!
//! - `chessdb`：云库（chessdb.cn）
//! - `lichess`：Lichess 对局数据库
//! - `uci`：本地 UCI 引擎进程池

mod chessdb;
mod lichess;
mod uci;

use std::sync::Arc;

use protocol::{EvalError, Evaluator};
use serde::{Deserialize, Serialize};

pub use chessdb::{ChessDbClient, ChessDbConfig};
pub use lichess::{LichessClient, LichessConfig};
pub use uci::{parse_info_line, InfoLine, UciConfig, UciEvaluator};

/// 后端选择及其参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum BackendConfig {
    ChessDb(ChessDbConfig),
    Lichess(LichessConfig),
    Engine(UciConfig),
}

impl BackendConfig {
    /// 创建后端
    pub fn build(&self) -> Result<Arc<dyn Evaluator>, EvalError> {
        let evaluator: Arc<dyn Evaluator> = match self {
            BackendConfig::ChessDb(config) => Arc::new(ChessDbClient::new(config.clone())?),
            BackendConfig::Lichess(config) => Arc::new(LichessClient::new(config.clone())?),
            BackendConfig::Engine(config) => Arc::new(UciEvaluator::new(config.clone())),
        };
        Ok(evaluator)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::ChessDb(ChessDbConfig::default())
    }
}
