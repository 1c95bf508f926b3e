//! 评估结果与评估后端抽象
//!
//! 所有后端（云库、对局数据库、本地引擎）都实现 `Evaluator`，
//! 探索引擎只依赖这个 trait。

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, PositionError};
use crate::position::ChessPosition;

/// 分数（厘兵）
pub type Score = i32;

/// 一个候选走法
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredMove {
    /// UCI 表示
    pub uci: String,
    /// SAN 表示
    pub san: String,
    /// 走完之后的局面（完整 FEN）
    pub child_fen: String,
    /// 白方视角分数（正数对白方有利）
    pub score: Score,
}

/// 后端返回的原始候选走法
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub uci: String,
    /// 走子方视角分数
    pub side_score: Score,
}

impl RawCandidate {
    pub fn new(uci: impl Into<String>, side_score: Score) -> Self {
        Self {
            uci: uci.into(),
            side_score,
        }
    }
}

/// 一个局面的评估结果
///
/// 按后端给出的顺序排列（对走子方越有利越靠前）。生成后不再修改，
/// 可以被多个到达同一局面的分支只读共享。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub moves: Vec<ScoredMove>,
}

impl EvaluationResult {
    pub fn new(moves: Vec<ScoredMove>) -> Self {
        Self { moves }
    }

    /// 由后端的原始候选构造结果：补全 SAN 和子局面，把分数换成白方视角
    ///
    /// 任何一个走法无法在局面上执行都视为整个结果损坏。
    pub fn from_candidates(
        position: &ChessPosition,
        candidates: Vec<RawCandidate>,
        max_moves: usize,
    ) -> Result<Self, PositionError> {
        let side = position.side_to_move();
        let mut moves = Vec::with_capacity(candidates.len().min(max_moves));

        for candidate in candidates.into_iter().take(max_moves) {
            let (san, child) = position.play_uci(&candidate.uci)?;
            moves.push(ScoredMove {
                uci: candidate.uci,
                san,
                child_fen: child.fen(),
                score: side.to_white(candidate.side_score),
            });
        }

        Ok(Self { moves })
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }
}

/// 单次评估请求参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalRequest {
    /// 最多返回多少个候选走法
    pub max_moves: usize,
    /// 搜索强度（引擎深度等，具体含义由后端决定）
    pub strength: u32,
}

/// 后端配置指纹
///
/// 作为缓存键的一部分，切换后端或强度参数不会读到旧假设下的结果。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendFingerprint(String);

impl BackendFingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 评估后端 trait
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// 评估局面，返回按后端偏好排序的候选走法（白方视角分数）
    async fn evaluate(
        &self,
        position: &ChessPosition,
        request: EvalRequest,
    ) -> Result<EvaluationResult, EvalError>;

    /// 检查后端是否可用，运行开始前调用
    async fn check_available(&self) -> Result<(), EvalError> {
        Ok(())
    }

    /// 后端配置指纹
    fn fingerprint(&self) -> BackendFingerprint;

    /// 后端名称（日志用）
    fn name(&self) -> &str;
}
