//! 命令行参数

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use protocol::Score;

/// 评估来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
    /// chessdb.cn 云库
    Chessdb,
    /// Lichess 开局数据库
    Lichess,
    /// 本地 UCI 引擎
    Engine,
}

/// 节点中棋盘的画法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BoardStyle {
    #[default]
    Unicode,
    None,
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Graphviz dot
    #[default]
    Dot,
    /// 组装后的图，JSON
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// 合并置换
    Graph,
    /// 每条路径一个节点
    Tree,
}

/// 探索从某个局面出发的走法图，输出 Graphviz dot
#[derive(Debug, Parser)]
#[command(name = "chessgraph", version, about)]
pub struct Args {
    /// 配置文件（JSON），命令行参数优先
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 跟随的变例的最大深度（半回合）[默认: 6]
    #[arg(long)]
    pub depth: Option<u32>,

    /// 白方走子时跟随走法的最低分数 [默认: 0]
    #[arg(long, allow_hyphen_values = true)]
    pub alpha: Option<Score>,

    /// 黑方走子时跟随走法的最低分数（黑方视角）[默认: 15]
    #[arg(long, allow_hyphen_values = true)]
    pub beta: Option<Score>,

    /// 同时进行的评估请求数 [默认: CPU 核数]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// 起始局面 FEN [默认: 初始局面]
    #[arg(long)]
    pub position: Option<String>,

    /// 每个局面请求的候选数 [默认: 10]
    #[arg(long)]
    pub max_moves: Option<usize>,

    /// 评估来源 [默认: chessdb]
    #[arg(long, value_enum)]
    pub source: Option<Source>,

    /// 引擎可执行文件 [默认: stockfish]
    #[arg(long)]
    pub engine: Option<String>,

    /// 引擎搜索深度 [默认: 20]
    #[arg(long)]
    pub enginedepth: Option<u32>,

    /// 节点中棋盘的画法
    #[arg(long, value_enum, default_value_t = BoardStyle::Unicode)]
    pub boardstyle: BoardStyle,

    /// 至少有这么多条出边的节点才画棋盘
    #[arg(long, default_value_t = 3)]
    pub boardedges: usize,

    /// 组装模式 [默认: graph]
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// 忽略已有缓存，重新评估并覆盖
    #[arg(long)]
    pub purgecache: bool,

    /// 缓存文件 [默认: 系统缓存目录下的 chessgraph/evaluations.json]
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// 不使用持久缓存
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// 输出格式
    #[arg(long, value_enum, default_value_t = OutputFormat::Dot)]
    pub format: OutputFormat,

    /// 输出文件，缺省写到标准输出
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["chessgraph"]);
        assert_eq!(args.depth, None);
        assert_eq!(args.boardstyle, BoardStyle::Unicode);
        assert_eq!(args.boardedges, 3);
        assert_eq!(args.format, OutputFormat::Dot);
        assert!(!args.purgecache);
    }

    #[test]
    fn test_negative_bounds() {
        let args = Args::parse_from(["chessgraph", "--alpha", "-20", "--beta", "-5", "--source", "engine"]);
        assert_eq!(args.alpha, Some(-20));
        assert_eq!(args.beta, Some(-5));
        assert_eq!(args.source, Some(Source::Engine));
    }

    #[test]
    fn test_cache_flags_conflict() {
        let result = Args::try_parse_from(["chessgraph", "--cache", "x.json", "--no-cache"]);
        assert!(result.is_err());
    }
}
