//! 棋局探索共享协议库
//!
//! 包含:
//! - 局面与规范化局面键
//! - 评估结果与评估后端 trait
//! - 运行配置
//! - 遍历事实流与组装后的图
//! - 错误类型

mod config;
mod constants;
mod error;
mod evaluation;
mod fact;
mod graph;
mod position;

pub use config::{CandidateOrder, DepthReduction, GraphMode, RetryPolicy, RunConfig, WindowPolicy};
pub use constants::*;
pub use error::{CacheError, EvalError, ExploreError, PositionError, Result};
pub use evaluation::{
    BackendFingerprint, EvalRequest, EvaluationResult, Evaluator, RawCandidate, Score, ScoredMove,
};
pub use fact::{EdgeFact, Fact, NodeFact, NodePath, NodeStatus, WarningFact};
pub use graph::{EdgeId, Graph, GraphEdge, GraphNode, NodeId};
pub use position::{ChessPosition, PositionKey, Side};
