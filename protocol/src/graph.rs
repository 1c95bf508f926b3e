//! 组装后的图
//!
//! 节点和边都存放在按下标寻址的数组里，边只保存两端下标，
//! 置换造成的汇合不会产生对象之间的循环引用。

use serde::{Deserialize, Serialize};

use crate::config::GraphMode;
use crate::evaluation::Score;
use crate::fact::{NodePath, NodeStatus, WarningFact};
use crate::position::{PositionKey, Side};

/// 节点下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// 边下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub usize);

/// 图节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub key: PositionKey,
    pub fen: String,
    pub side: Side,
    /// 白方视角分数：已评估取自身最佳分数，否则取进入它的边的分数
    pub score: Option<Score>,
    pub status: NodeStatus,
    /// 到达该节点的规范路径（最短、最靠前）
    pub path: NodePath,
    /// 是否位于从根出发的主变例上
    pub main_line: bool,
    pub incoming: Vec<EdgeId>,
    pub outgoing: Vec<EdgeId>,
}

/// 图的边
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub uci: String,
    pub san: String,
    pub rank: u16,
    /// 白方视角分数
    pub score: Score,
    pub mover: Side,
    /// 是否为源节点的主变例走法
    pub principal: bool,
}

/// 组装结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub mode: GraphMode,
    pub root: NodeId,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// 被放弃的分支
    pub warnings: Vec<WarningFact>,
}

impl Graph {
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &GraphEdge {
        &self.edges[id.0]
    }

    pub fn root_node(&self) -> &GraphNode {
        self.node(self.root)
    }

    /// 节点的出边
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.node(id).outgoing.iter().map(move |e| self.edge(*e))
    }

    /// 节点的主变例出边
    pub fn principal_edge(&self, id: NodeId) -> Option<&GraphEdge> {
        self.outgoing(id).find(|e| e.principal)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// 从根出发沿主变例走到底的 SAN 序列
    pub fn principal_variation(&self) -> Vec<&str> {
        let mut line = Vec::new();
        let mut seen = vec![false; self.nodes.len()];
        let mut current = self.root;

        while !seen[current.0] {
            seen[current.0] = true;
            match self.principal_edge(current) {
                Some(edge) => {
                    line.push(edge.san.as_str());
                    current = edge.target;
                }
                None => break,
            }
        }

        line
    }
}
