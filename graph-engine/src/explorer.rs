//! 遍历引擎
//!
//! 从根局面出发并发展开搜索节点。每个节点由一个任务处理：解析评估、
//! 按窗口挑选候选、产出事实并把子节点交回驱动循环。驱动循环只负责
//! 转发事实和派发子任务，遇到致命错误时取消全部在途工作。
//!
//! 同一局面经不同路径到达时各自成为搜索节点，但评估只发生一次
//! （见 [`Resolver`]）。图模式下的合并由组装器完成。

use std::cmp::Reverse;
use std::sync::Arc;

use graph_eval::EvaluationCache;
use protocol::{
    CandidateOrder, ChessPosition, EdgeFact, EvaluationResult, Evaluator, ExploreError, Fact,
    NodeFact, NodePath, NodeStatus, PositionKey, Result, RunConfig, Score, ScoredMove, Side,
    WarningFact,
};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::resolver::{Resolution, Resolver};
use crate::stats::{ExploreCounters, ExploreStats};

/// 待展开的搜索节点
#[derive(Debug, Clone)]
struct SearchNode {
    path: NodePath,
    position: ChessPosition,
    key: PositionKey,
    side: Side,
    /// 剩余深度
    depth: u32,
}

impl SearchNode {
    fn root(position: ChessPosition, config: &RunConfig) -> Self {
        Self {
            path: NodePath::root(),
            key: position.key(),
            side: position.side_to_move(),
            position,
            depth: config.max_depth,
        }
    }

    fn child(&self, rank: u16, position: ChessPosition, depth: u32) -> Self {
        Self {
            path: self.path.child(rank),
            key: position.key(),
            side: position.side_to_move(),
            position,
            depth,
        }
    }

    fn fact(&self, status: NodeStatus, best_score: Option<Score>) -> Fact {
        Fact::Node(NodeFact {
            path: self.path.clone(),
            key: self.key.clone(),
            fen: self.position.fen(),
            side: self.side,
            depth: self.depth,
            status,
            best_score,
        })
    }
}

/// 单个节点的处理结果
enum Visit {
    Expanded {
        facts: Vec<Fact>,
        children: Vec<SearchNode>,
    },
    RootUnresolved(String),
    Fatal(String),
}

struct RunContext {
    resolver: Resolver,
    config: RunConfig,
    counters: Arc<ExploreCounters>,
}

/// 一次完整探索的产物
#[derive(Debug, Clone)]
pub struct Exploration {
    pub facts: Vec<Fact>,
    pub stats: ExploreStats,
}

/// 遍历引擎
pub struct Explorer {
    evaluator: Arc<dyn Evaluator>,
    cache: Arc<EvaluationCache>,
    config: RunConfig,
}

impl Explorer {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        cache: Arc<EvaluationCache>,
        config: RunConfig,
    ) -> Self {
        Self {
            evaluator,
            cache,
            config,
        }
    }

    /// 运行并收集全部事实
    pub async fn explore(&self) -> Result<Exploration> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stats = self.explore_into(tx).await?;

        let mut facts = Vec::new();
        while let Some(fact) = rx.recv().await {
            facts.push(fact);
        }
        Ok(Exploration { facts, stats })
    }

    /// 在后台运行，事实按产生顺序从通道流出
    pub fn spawn(
        self: Arc<Self>,
    ) -> (mpsc::UnboundedReceiver<Fact>, JoinHandle<Result<ExploreStats>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move { self.explore_into(tx).await });
        (rx, handle)
    }

    /// 运行探索，把事实写入 `sink`
    ///
    /// 接收端提前关闭不影响探索本身。
    pub async fn explore_into(&self, sink: mpsc::UnboundedSender<Fact>) -> Result<ExploreStats> {
        let root = ChessPosition::from_fen(&self.config.root_fen)?;

        info!(
            "Exploring {} with {} (depth {}, alpha {}, beta {}, concurrency {})",
            root.fen(),
            self.evaluator.name(),
            self.config.max_depth,
            self.config.alpha,
            self.config.beta,
            self.config.concurrency
        );
        if self.cache.is_purging() {
            info!("Purge mode: cached evaluations are ignored for this run");
        }

        let counters = Arc::new(ExploreCounters::default());
        let ctx = Arc::new(RunContext {
            resolver: Resolver::new(
                self.evaluator.clone(),
                self.cache.clone(),
                self.config.eval_request(),
                self.config.retry,
                self.config.concurrency,
                counters.clone(),
            ),
            config: self.config.clone(),
            counters: counters.clone(),
        });

        // 根局面已缓存时后端可能根本用不上，不为此提前探测
        let root_cached = ctx.resolver.is_cached(&root.key());
        if self.config.max_depth > 0 && !root_cached {
            self.evaluator
                .check_available()
                .await
                .map_err(|e| ExploreError::BackendUnavailable(e.to_string()))?;
        }

        let mut tasks = JoinSet::new();
        tasks.spawn(visit(ctx.clone(), SearchNode::root(root, &self.config)));

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    failure = Some(ExploreError::Task(e.to_string()));
                    break;
                }
            };

            match outcome {
                Visit::Expanded { facts, children } => {
                    for fact in facts {
                        let _ = sink.send(fact);
                    }
                    for child in children {
                        tasks.spawn(visit(ctx.clone(), child));
                    }
                }
                Visit::RootUnresolved(reason) => {
                    failure = Some(ExploreError::RootUnresolved(reason));
                    break;
                }
                Visit::Fatal(reason) => {
                    failure = Some(ExploreError::BackendUnavailable(reason));
                    break;
                }
            }
        }

        if let Some(err) = failure {
            warn!("Exploration aborted: {}", err);
            ctx.resolver.cancel();
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            // 已完成的评估仍然值得保留
            let _ = self.cache.flush();
            return Err(err);
        }

        let _ = self.cache.flush();
        let stats = counters.snapshot();
        info!(
            "Exploration finished: {} nodes, {} evaluator calls, {} cache hits, {} joined",
            stats.nodes_visited, stats.evaluator_calls, stats.cache_hits, stats.joined
        );
        Ok(stats)
    }
}

async fn visit(ctx: Arc<RunContext>, node: SearchNode) -> Visit {
    ctx.counters.record_visit();

    if node.depth == 0 {
        return Visit::Expanded {
            facts: vec![node.fact(NodeStatus::Horizon, None)],
            children: Vec::new(),
        };
    }

    match ctx.resolver.resolve(&node.key, &node.position).await {
        Resolution::Resolved(result) => expand(&ctx, &node, &result),
        Resolution::Fatal(reason) => Visit::Fatal(reason),
        Resolution::Failed(reason) if node.path.is_root() => Visit::RootUnresolved(reason),
        Resolution::Failed(reason) => {
            debug!("Leaving {} unresolved at {}", node.key, node.path);
            Visit::Expanded {
                facts: vec![
                    node.fact(NodeStatus::Unresolved, None),
                    Fact::Warning(WarningFact {
                        path: node.path.clone(),
                        key: Some(node.key.clone()),
                        message: format!("evaluation failed: {}", reason),
                    }),
                ],
                children: Vec::new(),
            }
        }
    }
}

/// 按配置排列候选
fn ordered_candidates(
    result: &EvaluationResult,
    side: Side,
    order: CandidateOrder,
) -> Vec<&ScoredMove> {
    let mut moves: Vec<&ScoredMove> = result.moves.iter().collect();
    if order == CandidateOrder::ByScore {
        // 稳定排序，分数相同保持后端顺序
        moves.sort_by_key(|m| Reverse(side.relative(m.score)));
    }
    moves
}

/// 从评估结果中挑选要跟随的候选
fn expand(ctx: &RunContext, node: &SearchNode, result: &EvaluationResult) -> Visit {
    let config = &ctx.config;
    let candidates = ordered_candidates(result, node.side, config.candidate_order);
    let floor = config.floor_for(node.side);

    let mut facts = vec![node.fact(NodeStatus::Evaluated, candidates.first().map(|m| m.score))];
    let mut children = Vec::new();
    let mut followed = 0;

    for (rank, mv) in candidates.iter().enumerate() {
        let exempt = rank == 0 && config.window.exempt_best;
        if !exempt && !config.window.accepts(node.side.relative(mv.score), floor) {
            if config.candidate_order == CandidateOrder::ByScore {
                // 之后的候选分数只会更低
                break;
            }
            continue;
        }

        followed += 1;
        let Some(child_depth) = config.depth_reduction.child_depth(node.depth, followed) else {
            continue;
        };

        let position = match ChessPosition::from_fen(&mv.child_fen) {
            Ok(position) => position,
            Err(e) => {
                warn!("Dropping {} from {}: {}", mv.uci, node.key, e);
                ctx.counters.record_dropped();
                facts.push(Fact::Warning(WarningFact {
                    path: node.path.clone(),
                    key: Some(node.key.clone()),
                    message: format!("dropped {}: {}", mv.uci, e),
                }));
                continue;
            }
        };

        let rank = rank as u16;
        let child = node.child(rank, position, child_depth);
        facts.push(Fact::Edge(EdgeFact {
            parent: node.path.clone(),
            child: child.path.clone(),
            parent_key: node.key.clone(),
            child_key: child.key.clone(),
            child_fen: child.position.fen(),
            uci: mv.uci.clone(),
            san: mv.san.clone(),
            rank,
            score: mv.score,
            mover: node.side,
        }));
        children.push(child);
    }

    Visit::Expanded { facts, children }
}
