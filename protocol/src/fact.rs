//! 探索事实流
//!
//! 遍历引擎按完成顺序产出事实，图组装器以任意顺序消费它们。

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::evaluation::Score;
use crate::position::{PositionKey, Side};

/// 从根出发的路径
///
/// 每一步记录所选候选在父节点候选列表中的序号。排序先比长度再逐步比较，
/// 因此最短、最靠前的路径最小。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<u16>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, rank: u16) -> Self {
        let mut steps = Vec::with_capacity(self.0.len() + 1);
        steps.extend_from_slice(&self.0);
        steps.push(rank);
        Self(steps)
    }

    /// 距根的半回合数
    pub fn ply(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[u16] {
        &self.0
    }
}

impl Ord for NodePath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for NodePath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "root");
        }
        let steps: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "root/{}", steps.join("/"))
    }
}

/// 搜索节点的处理结果
///
/// 合并时的优先级：`Evaluated` > `Unresolved` > `Horizon`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// 深度耗尽，未评估
    Horizon,
    /// 评估失败，作为叶子保留
    Unresolved,
    /// 已评估
    Evaluated,
}

/// 访问到一个搜索节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFact {
    pub path: NodePath,
    pub key: PositionKey,
    pub fen: String,
    pub side: Side,
    /// 剩余深度
    pub depth: u32,
    pub status: NodeStatus,
    /// 自身评估中的最佳分数（白方视角），未评估或无候选时为空
    pub best_score: Option<Score>,
}

/// 父节点跟随了一个候选
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeFact {
    pub parent: NodePath,
    pub child: NodePath,
    pub parent_key: PositionKey,
    pub child_key: PositionKey,
    /// 子局面 FEN
    pub child_fen: String,
    pub uci: String,
    pub san: String,
    /// 候选在父节点排序后列表中的序号
    pub rank: u16,
    /// 白方视角分数
    pub score: Score,
    /// 走这步棋的一方
    pub mover: Side,
}

/// 某个分支被放弃
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningFact {
    pub path: NodePath,
    pub key: Option<PositionKey>,
    pub message: String,
}

/// 事实流中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Fact {
    Node(NodeFact),
    Edge(EdgeFact),
    Warning(WarningFact),
}
