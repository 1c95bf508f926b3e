//! chessgraph 命令行工具
//!
//! 负责把参数变成运行设置、构建后端与缓存、运行探索并渲染结果。

pub mod args;
pub mod render;
pub mod settings;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use graph_engine::{assemble, Explorer};
use graph_eval::{EvaluationCache, FileStore};
use protocol::Graph;
use tracing::info;

use crate::args::OutputFormat;
use crate::settings::Settings;

/// 打开评估缓存，没有路径时只用内存
pub fn open_cache(path: Option<&Path>, purge: bool) -> EvaluationCache {
    match path {
        Some(path) => {
            info!("Using evaluation cache {}", path.display());
            EvaluationCache::new(Arc::new(FileStore::open(path)), purge)
        }
        None => EvaluationCache::new(Arc::new(graph_eval::MemoryStore::default()), purge),
    }
}

/// 运行一次探索并组装
pub async fn run(settings: &Settings) -> Result<Graph> {
    let evaluator = settings
        .backend
        .build()
        .context("Failed to create evaluation backend")?;
    let cache = Arc::new(open_cache(settings.cache_path.as_deref(), settings.run.purge_cache));

    let explorer = Explorer::new(evaluator, cache.clone(), settings.run.clone());
    let exploration = explorer.explore().await?;

    let graph = assemble(exploration.facts, settings.run.mode)
        .ok_or_else(|| anyhow!("Exploration produced no root node"))?;

    let cache_stats = cache.stats();
    info!(
        "Graph has {} nodes and {} edges; {} warnings",
        graph.node_count(),
        graph.edge_count(),
        graph.warnings.len()
    );
    info!(
        "Cache: {} entries, {:.1}% hit rate, {} writes; {:.1}% of evaluations reused",
        cache_stats.entries,
        cache_stats.hit_rate() * 100.0,
        cache_stats.writes,
        exploration.stats.reuse_rate() * 100.0
    );
    if cache.is_degraded() {
        tracing::warn!("Evaluation cache could not be saved; results of this run are not persisted");
    }

    Ok(graph)
}

/// 按格式渲染
pub fn render(graph: &Graph, settings: &Settings) -> Result<String> {
    match settings.format {
        OutputFormat::Dot => Ok(render::render_dot(graph, &settings.render)),
        OutputFormat::Json => render::render_json(graph).context("Failed to serialize graph"),
    }
}

/// 写到文件或标准输出
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            use std::io::Write;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .and_then(|_| stdout.flush())
                .context("Failed to write to stdout")
        }
    }
}
