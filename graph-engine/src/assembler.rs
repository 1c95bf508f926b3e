//! 图组装器
//!
//! 把遍历产出的事实（任意顺序）组装成按下标寻址的图。结果只取决于
//! 事实集合本身：节点按规范路径排序编号，边按（源节点, 序号, 目标节点）
//! 排序编号，所有合并规则都与到达顺序无关。

use std::collections::{BTreeMap, HashSet};

use protocol::{
    EdgeFact, EdgeId, Fact, Graph, GraphEdge, GraphMode, GraphNode, NodeFact, NodeId, NodePath,
    NodeStatus, PositionKey, Score, Side, WarningFact,
};

/// 节点身份：图模式按局面键，树模式按路径
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Identity {
    Key(PositionKey),
    Path(NodePath),
}

#[derive(Debug)]
struct NodeDraft {
    key: PositionKey,
    /// 规范路径及该路径上的 FEN
    path: NodePath,
    fen: String,
    side: Side,
    status: NodeStatus,
    best_score: Option<Score>,
    /// 规范入边上的分数
    incoming: Option<(NodePath, Score)>,
}

#[derive(Debug)]
struct EdgeDraft {
    target: Identity,
    san: String,
    rank: u16,
    score: Score,
    mover: Side,
}

/// 增量组装器
#[derive(Debug)]
pub struct GraphAssembler {
    mode: GraphMode,
    nodes: BTreeMap<Identity, NodeDraft>,
    /// 键为（源节点, UCI）
    edges: BTreeMap<(Identity, String), EdgeDraft>,
    warnings: Vec<WarningFact>,
}

impl GraphAssembler {
    pub fn new(mode: GraphMode) -> Self {
        Self {
            mode,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    fn identity(&self, key: &PositionKey, path: &NodePath) -> Identity {
        match self.mode {
            GraphMode::Graph => Identity::Key(key.clone()),
            GraphMode::Tree => Identity::Path(path.clone()),
        }
    }

    pub fn push(&mut self, fact: Fact) {
        match fact {
            Fact::Node(node) => self.push_node(node),
            Fact::Edge(edge) => self.push_edge(edge),
            Fact::Warning(warning) => self.warnings.push(warning),
        }
    }

    fn push_node(&mut self, fact: NodeFact) {
        let identity = self.identity(&fact.key, &fact.path);
        match self.nodes.get_mut(&identity) {
            Some(draft) => {
                if fact.path < draft.path {
                    draft.path = fact.path;
                    draft.fen = fact.fen;
                }
                draft.status = draft.status.max(fact.status);
                draft.best_score = draft.best_score.or(fact.best_score);
            }
            None => {
                self.nodes.insert(
                    identity,
                    NodeDraft {
                        key: fact.key,
                        path: fact.path,
                        fen: fact.fen,
                        side: fact.side,
                        status: fact.status,
                        best_score: fact.best_score,
                        incoming: None,
                    },
                );
            }
        }
    }

    fn push_edge(&mut self, fact: EdgeFact) {
        let source = self.identity(&fact.parent_key, &fact.parent);
        let target = self.identity(&fact.child_key, &fact.child);

        // 子节点事实可能还没到，先用边上的信息占位
        let draft = self.nodes.entry(target.clone()).or_insert_with(|| NodeDraft {
            key: fact.child_key.clone(),
            path: fact.child.clone(),
            fen: fact.child_fen.clone(),
            side: fact.mover.opposite(),
            status: NodeStatus::Horizon,
            best_score: None,
            incoming: None,
        });
        if fact.child < draft.path {
            draft.path = fact.child.clone();
            draft.fen = fact.child_fen.clone();
        }
        let canonical = match &draft.incoming {
            Some((path, _)) => fact.child < *path,
            None => true,
        };
        if canonical {
            draft.incoming = Some((fact.child.clone(), fact.score));
        }

        self.edges
            .entry((source, fact.uci))
            .or_insert(EdgeDraft {
                target,
                san: fact.san,
                rank: fact.rank,
                score: fact.score,
                mover: fact.mover,
            });
    }

    /// 完成组装，没有根节点时返回 `None`
    pub fn finish(self) -> Option<Graph> {
        let mut drafts: Vec<(Identity, NodeDraft)> = self.nodes.into_iter().collect();
        drafts.sort_by(|a, b| a.1.path.cmp(&b.1.path).then_with(|| a.0.cmp(&b.0)));
        if !drafts.first().is_some_and(|(_, d)| d.path.is_root()) {
            return None;
        }

        let index: BTreeMap<Identity, NodeId> = drafts
            .iter()
            .enumerate()
            .map(|(i, (identity, _))| (identity.clone(), NodeId(i)))
            .collect();

        let mut nodes: Vec<GraphNode> = drafts
            .into_iter()
            .enumerate()
            .map(|(i, (_, draft))| GraphNode {
                id: NodeId(i),
                key: draft.key,
                fen: draft.fen,
                side: draft.side,
                score: draft.best_score.or(draft.incoming.map(|(_, score)| score)),
                status: draft.status,
                path: draft.path,
                main_line: false,
                incoming: Vec::new(),
                outgoing: Vec::new(),
            })
            .collect();

        let mut edges: Vec<GraphEdge> = self
            .edges
            .into_iter()
            .filter_map(|((source, uci), draft)| {
                Some(GraphEdge {
                    id: EdgeId(0),
                    source: *index.get(&source)?,
                    target: *index.get(&draft.target)?,
                    uci,
                    san: draft.san,
                    rank: draft.rank,
                    score: draft.score,
                    mover: draft.mover,
                    principal: false,
                })
            })
            .collect();
        edges.sort_by(|a, b| {
            (a.source, a.rank, a.target, &a.uci).cmp(&(b.source, b.rank, b.target, &b.uci))
        });

        for (i, edge) in edges.iter_mut().enumerate() {
            edge.id = EdgeId(i);
            nodes[edge.source.0].outgoing.push(edge.id);
            nodes[edge.target.0].incoming.push(edge.id);
        }

        mark_principal(&nodes, &mut edges);
        mark_main_line(&mut nodes, &edges);

        let mut warnings = self.warnings;
        warnings.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.key.cmp(&b.key))
                .then_with(|| a.message.cmp(&b.message))
        });
        warnings.dedup();

        Some(Graph {
            mode: self.mode,
            root: NodeId(0),
            nodes,
            edges,
            warnings,
        })
    }
}

/// 每个有出边的节点恰好一条主变例边：走子方视角分数最高，同分取序号最小
fn mark_principal(nodes: &[GraphNode], edges: &mut [GraphEdge]) {
    for node in nodes {
        let best = node
            .outgoing
            .iter()
            .map(|id| &edges[id.0])
            .min_by_key(|e| (std::cmp::Reverse(node.side.relative(e.score)), e.rank, e.id))
            .map(|e| e.id);
        if let Some(id) = best {
            edges[id.0].principal = true;
        }
    }
}

/// 从根沿主变例边可达的节点
fn mark_main_line(nodes: &mut [GraphNode], edges: &[GraphEdge]) {
    let mut seen = HashSet::new();
    let mut current = NodeId(0);
    while seen.insert(current) {
        nodes[current.0].main_line = true;
        let next = nodes[current.0]
            .outgoing
            .iter()
            .map(|id| &edges[id.0])
            .find(|e| e.principal);
        match next {
            Some(edge) => current = edge.target,
            None => break,
        }
    }
}

/// 一次性组装
pub fn assemble(facts: impl IntoIterator<Item = Fact>, mode: GraphMode) -> Option<Graph> {
    let mut assembler = GraphAssembler::new(mode);
    for fact in facts {
        assembler.push(fact);
    }
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::Explorer;
    use crate::testing::ScriptedEvaluator;
    use graph_eval::EvaluationCache;
    use protocol::{ChessPosition, RetryPolicy, RunConfig};
    use rand::seq::SliceRandom;
    use std::sync::Arc;

    const KNIGHTS: &[&str] = &["g1f3", "b1c3", "g8f6", "b8c6"];

    async fn knight_facts(depth: u32) -> Vec<Fact> {
        let evaluator = Arc::new(ScriptedEvaluator::new(KNIGHTS, &[10, 5]));
        let config = RunConfig {
            max_depth: depth,
            alpha: -1000,
            beta: -1000,
            concurrency: 4,
            retry: RetryPolicy {
                attempts: 1,
                backoff_ms: 0,
            },
            ..Default::default()
        };
        Explorer::new(evaluator, Arc::new(EvaluationCache::in_memory()), config)
            .explore()
            .await
            .unwrap()
            .facts
    }

    fn assert_principal_invariant(graph: &Graph) {
        for node in &graph.nodes {
            let principal = graph.outgoing(node.id).filter(|e| e.principal).count();
            if node.outgoing.is_empty() {
                assert_eq!(principal, 0);
            } else {
                assert_eq!(principal, 1, "node {} has {} principal edges", node.path, principal);
            }
        }
    }

    #[tokio::test]
    async fn test_graph_mode_merges_transpositions() {
        let graph = assemble(knight_facts(4).await, GraphMode::Graph).unwrap();

        assert_eq!(graph.node_count(), 10);
        assert_eq!(graph.edge_count(), 12);
        assert_principal_invariant(&graph);

        // 四马出动的局面由四条路径汇合
        let all_knights = graph.nodes.iter().max_by_key(|n| n.incoming.len()).unwrap();
        assert_eq!(all_knights.incoming.len(), 2);
        assert_eq!(all_knights.path.ply(), 4);
        assert_eq!(all_knights.status, NodeStatus::Horizon);

        let keys: HashSet<_> = graph.nodes.iter().map(|n| &n.key).collect();
        assert_eq!(keys.len(), graph.node_count());
        for node in &graph.nodes[1..] {
            assert!(!node.incoming.is_empty());
        }
    }

    #[tokio::test]
    async fn test_tree_mode_keeps_paths_apart() {
        let graph = assemble(knight_facts(4).await, GraphMode::Tree).unwrap();

        assert_eq!(graph.node_count(), 15);
        assert_eq!(graph.edge_count(), 14);
        assert_principal_invariant(&graph);
        for node in &graph.nodes[1..] {
            assert_eq!(node.incoming.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_principal_variation() {
        let graph = assemble(knight_facts(4).await, GraphMode::Graph).unwrap();

        // 白方选 +10 的 Nf3，黑方选对自己更好的 +5（白方视角）即 Nc6
        assert_eq!(graph.principal_variation(), vec!["Nf3", "Nc6", "Nc3", "Nf6"]);
        let main_line = graph.nodes.iter().filter(|n| n.main_line).count();
        assert_eq!(main_line, 5);
        assert!(graph.root_node().main_line);
    }

    #[tokio::test]
    async fn test_permuted_facts_assemble_identically() {
        let facts = knight_facts(4).await;
        let expected = assemble(facts.clone(), GraphMode::Graph).unwrap();
        let expected_tree = assemble(facts.clone(), GraphMode::Tree).unwrap();

        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let mut shuffled = facts.clone();
            shuffled.shuffle(&mut rng);
            assert_eq!(assemble(shuffled.clone(), GraphMode::Graph).unwrap(), expected);
            assert_eq!(assemble(shuffled, GraphMode::Tree).unwrap(), expected_tree);
        }
    }

    #[tokio::test]
    async fn test_node_scores() {
        let graph = assemble(knight_facts(2).await, GraphMode::Graph).unwrap();
        let root = graph.root_node();
        assert_eq!(root.status, NodeStatus::Evaluated);
        assert_eq!(root.score, Some(10));

        // 地平线节点取入边分数
        for node in graph.nodes.iter().filter(|n| n.status == NodeStatus::Horizon) {
            let edge = graph.edge(node.incoming[0]);
            assert_eq!(node.score, Some(edge.score));
        }
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        assert!(assemble(Vec::new(), GraphMode::Graph).is_none());
    }

    #[test]
    fn test_principal_tie_breaks_by_rank() {
        let root = ChessPosition::standard();
        let (san_a, a) = root.play_uci("e2e4").unwrap();
        let (san_b, b) = root.play_uci("d2d4").unwrap();

        let node = |path: NodePath, position: &ChessPosition, status| {
            Fact::Node(NodeFact {
                path,
                key: position.key(),
                fen: position.fen(),
                side: position.side_to_move(),
                depth: 0,
                status,
                best_score: None,
            })
        };
        let edge = |rank: u16, uci: &str, san: &str, child: &ChessPosition| {
            Fact::Edge(EdgeFact {
                parent: NodePath::root(),
                child: NodePath::root().child(rank),
                parent_key: root.key(),
                child_key: child.key(),
                child_fen: child.fen(),
                uci: uci.to_string(),
                san: san.to_string(),
                rank,
                score: 25,
                mover: Side::White,
            })
        };

        let facts = vec![
            edge(1, "d2d4", &san_b, &b),
            node(NodePath::root().child(1), &b, NodeStatus::Horizon),
            node(NodePath::root(), &root, NodeStatus::Evaluated),
            edge(0, "e2e4", &san_a, &a),
            node(NodePath::root().child(0), &a, NodeStatus::Horizon),
        ];
        let graph = assemble(facts, GraphMode::Graph).unwrap();
        assert_eq!(graph.principal_variation(), vec!["e4"]);
        assert_eq!(graph.edges[0].rank, 0);
        assert!(graph.edges[0].principal);
        assert!(!graph.edges[1].principal);
    }

    #[test]
    fn test_warnings_sorted_and_deduplicated() {
        let root = ChessPosition::standard();
        let warning = |path: NodePath, message: &str| {
            Fact::Warning(WarningFact {
                path,
                key: None,
                message: message.to_string(),
            })
        };
        let facts = vec![
            warning(NodePath::root().child(1), "b"),
            Fact::Node(NodeFact {
                path: NodePath::root(),
                key: root.key(),
                fen: root.fen(),
                side: Side::White,
                depth: 1,
                status: NodeStatus::Evaluated,
                best_score: None,
            }),
            warning(NodePath::root().child(0), "a"),
            warning(NodePath::root().child(1), "b"),
        ];
        let graph = assemble(facts, GraphMode::Graph).unwrap();
        let messages: Vec<_> = graph.warnings.iter().map(|w| w.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b"]);
        assert_eq!(graph.node_count(), 1);
        assert!(graph.principal_variation().is_empty());
    }
}
