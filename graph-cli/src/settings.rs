//! 运行设置
//!
//! 合并顺序：内置默认值 < 配置文件 < 命令行参数。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use graph_eval::{BackendConfig, ChessDbConfig, LichessConfig, UciConfig};
use protocol::{GraphMode, RunConfig};
use serde::{Deserialize, Serialize};

use crate::args::{Args, ModeArg, OutputFormat, Source};
use crate::render::RenderOptions;

/// 配置文件内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub run: RunConfig,
    pub backend: BackendConfig,
    pub cache: Option<PathBuf>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// 合并后的设置
#[derive(Debug, Clone)]
pub struct Settings {
    pub run: RunConfig,
    pub backend: BackendConfig,
    /// `None` 表示只用内存缓存
    pub cache_path: Option<PathBuf>,
    pub render: RenderOptions,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

impl Settings {
    pub fn from_args(args: Args) -> Result<Self> {
        let (file, from_file) = match &args.config {
            Some(path) => (ConfigFile::load(path)?, true),
            None => (ConfigFile::default(), false),
        };
        Ok(Self::merge(args, file, from_file))
    }

    fn merge(args: Args, file: ConfigFile, from_file: bool) -> Self {
        let mut run = file.run;
        if let Some(depth) = args.depth {
            run.max_depth = depth;
        }
        if let Some(alpha) = args.alpha {
            run.alpha = alpha;
        }
        if let Some(beta) = args.beta {
            run.beta = beta;
        }
        match args.concurrency {
            Some(concurrency) => run.concurrency = concurrency,
            None if !from_file => run.concurrency = default_concurrency(),
            None => {}
        }
        if let Some(fen) = args.position {
            run.root_fen = fen;
        }
        if let Some(max_moves) = args.max_moves {
            run.max_moves = max_moves;
        }
        if let Some(depth) = args.enginedepth {
            run.strength = depth;
        }
        if let Some(mode) = args.mode {
            run.mode = match mode {
                ModeArg::Graph => GraphMode::Graph,
                ModeArg::Tree => GraphMode::Tree,
            };
        }
        run.purge_cache |= args.purgecache;

        let mut backend = match args.source {
            Some(source) => select_backend(file.backend, source),
            None => file.backend,
        };
        if let (Some(path), BackendConfig::Engine(engine)) = (args.engine, &mut backend) {
            engine.path = path;
        }

        let cache_path = if args.no_cache {
            None
        } else {
            args.cache.or(file.cache).or_else(default_cache_path)
        };

        Self {
            run,
            backend,
            cache_path,
            render: RenderOptions {
                board_style: args.boardstyle,
                board_edges: args.boardedges,
            },
            format: args.format,
            output: args.output,
        }
    }
}

/// 来源与配置文件一致时保留文件里的参数，否则换成该来源的默认参数
fn select_backend(current: BackendConfig, source: Source) -> BackendConfig {
    match (source, current) {
        (Source::Chessdb, keep @ BackendConfig::ChessDb(_)) => keep,
        (Source::Lichess, keep @ BackendConfig::Lichess(_)) => keep,
        (Source::Engine, keep @ BackendConfig::Engine(_)) => keep,
        (Source::Chessdb, _) => BackendConfig::ChessDb(ChessDbConfig::default()),
        (Source::Lichess, _) => BackendConfig::Lichess(LichessConfig::default()),
        (Source::Engine, _) => BackendConfig::Engine(UciConfig::default()),
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// 系统缓存目录下的 `chessgraph/evaluations.json`
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("chessgraph").join("evaluations.json"))
}
