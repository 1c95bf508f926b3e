//! 运行配置
//!
//! 命令行层负责解析参数，核心只消费这里的结构。

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ALPHA, DEFAULT_BETA, DEFAULT_MAX_DEPTH, DEFAULT_MAX_MOVES, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_BACKOFF_MS, STANDARD_FEN,
};
use crate::evaluation::{EvalRequest, Score};
use crate::position::Side;

/// 组装模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GraphMode {
    /// 按局面键合并置换
    #[default]
    Graph,
    /// 每条路径一个节点
    Tree,
}

/// 候选走法排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrder {
    /// 按走子方视角分数稳定排序，分数相同保持后端顺序
    #[default]
    ByScore,
    /// 完全信任后端顺序
    AsReturned,
}

/// 非最佳走法的深度扣减方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DepthReduction {
    /// 所有跟随的走法都扣 1
    #[default]
    Uniform,
    /// 第 n 个跟随的走法扣 `floor(1.5 + log2(n))`，最佳走法仍扣 1
    Logarithmic,
}

impl DepthReduction {
    /// 第 `ordinal` 个（从 1 开始）被接受的候选的子节点深度
    ///
    /// 深度不足时返回 `None`。
    pub fn child_depth(self, depth: u32, ordinal: usize) -> Option<u32> {
        if depth == 0 {
            return None;
        }
        let reduction = match self {
            DepthReduction::Uniform => 1,
            DepthReduction::Logarithmic if ordinal <= 1 => 1,
            DepthReduction::Logarithmic => (1.5 + (ordinal as f64).log2()) as u32,
        };
        depth.checked_sub(reduction)
    }
}

/// 分数窗口策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPolicy {
    /// 分数等于下界时是否接受
    pub inclusive: bool,
    /// 最佳候选是否免于窗口过滤
    pub exempt_best: bool,
}

impl WindowPolicy {
    /// 判断走子方视角分数是否落在窗口内
    pub fn accepts(&self, side_score: Score, floor: Score) -> bool {
        if self.inclusive {
            side_score >= floor
        } else {
            side_score > floor
        }
    }
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            inclusive: true,
            exempt_best: true,
        }
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次）
    pub attempts: u32,
    /// 基础退避（毫秒），第 n 次重试等待 `base * 2^(n-1)` 加随机抖动
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

/// 一次探索运行的配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 根局面 FEN
    pub root_fen: String,
    /// 白方走子时的接受下界
    pub alpha: Score,
    /// 黑方走子时的接受下界
    pub beta: Score,
    /// 最大深度（半回合）
    pub max_depth: u32,
    /// 同时在途的评估请求上限
    pub concurrency: usize,
    /// 每个局面请求的候选数
    pub max_moves: usize,
    /// 后端搜索强度
    pub strength: u32,
    pub mode: GraphMode,
    /// 本次运行忽略已有缓存（仍然写入）
    pub purge_cache: bool,
    pub window: WindowPolicy,
    pub candidate_order: CandidateOrder,
    pub depth_reduction: DepthReduction,
    pub retry: RetryPolicy,
}

impl RunConfig {
    /// 走子方对应的接受下界
    pub fn floor_for(&self, side: Side) -> Score {
        match side {
            Side::White => self.alpha,
            Side::Black => self.beta,
        }
    }

    /// 评估请求参数
    pub fn eval_request(&self) -> EvalRequest {
        EvalRequest {
            max_moves: self.max_moves,
            strength: self.strength,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            root_fen: STANDARD_FEN.to_string(),
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            max_depth: DEFAULT_MAX_DEPTH,
            concurrency: 4,
            max_moves: DEFAULT_MAX_MOVES,
            strength: 20,
            mode: GraphMode::Graph,
            purge_cache: false,
            window: WindowPolicy::default(),
            candidate_order: CandidateOrder::ByScore,
            depth_reduction: DepthReduction::Uniform,
            retry: RetryPolicy::default(),
        }
    }
}
