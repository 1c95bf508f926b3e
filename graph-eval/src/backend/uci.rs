//! 本地 UCI 引擎后端
//!
//! 维护一个引擎进程池：评估时取出一个空闲进程（没有就新启动一个），
//! 以 MultiPV 模式搜索到指定深度，成功后放回池中。
//! 进程崩溃或输出异常时直接丢弃，下次请求会重新启动。

use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use protocol::{
    BackendFingerprint, ChessPosition, EvalError, EvalRequest, EvaluationResult, Evaluator,
    RawCandidate, Score, MATE_SCORE,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// 引擎配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UciConfig {
    /// 引擎可执行文件
    pub path: String,
    /// 启动参数
    pub args: Vec<String>,
    /// 额外的 `setoption`（名称, 值）
    pub options: Vec<(String, String)>,
    /// 单次分析超时（秒）
    pub timeout_secs: u64,
}

impl Default for UciConfig {
    fn default() -> Self {
        Self {
            path: "stockfish".to_string(),
            args: Vec::new(),
            options: Vec::new(),
            timeout_secs: 120,
        }
    }
}

/// 一行 `info` 输出中需要的部分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLine {
    pub multipv: usize,
    /// 走子方视角分数
    pub score: Score,
    pub first_move: String,
}

/// 解析 `info` 行
///
/// 只接受带 `score` 和 `pv` 的精确分数行，`lowerbound`/`upperbound` 行忽略。
/// 将杀分数换算为 `±(MATE_SCORE - 步数)`。
pub fn parse_info_line(line: &str) -> Option<InfoLine> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "info" {
        return None;
    }

    let mut multipv = 1;
    let mut score = None;
    let mut first_move = None;

    while let Some(token) = tokens.next() {
        match token {
            "multipv" => multipv = tokens.next()?.parse().ok()?,
            "score" => {
                let kind = tokens.next()?;
                let value: i32 = tokens.next()?.parse().ok()?;
                score = Some(match kind {
                    "cp" => value,
                    "mate" if value > 0 => MATE_SCORE - value,
                    "mate" => -MATE_SCORE - value,
                    _ => return None,
                });
            }
            "lowerbound" | "upperbound" => return None,
            "pv" => {
                first_move = tokens.next().map(str::to_string);
                break;
            }
            // 其余字段（depth、nodes、string 等）跳过
            _ => {}
        }
    }

    Some(InfoLine {
        multipv,
        score: score?,
        first_move: first_move?,
    })
}

/// 一个引擎进程
struct UciProcess {
    // 保持子进程句柄，drop 时杀掉进程
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    multipv: usize,
}

impl UciProcess {
    /// 启动进程并完成握手
    async fn spawn(config: &UciConfig) -> Result<Self, EvalError> {
        let mut child = Command::new(&config.path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EvalError::Unavailable(format!("Cannot start engine '{}': {}", config.path, e))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EvalError::Unavailable("Failed to open engine stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EvalError::Unavailable("Failed to open engine stdout".to_string()))?;

        let mut process = Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            multipv: 1,
        };

        process.send("uci").await?;
        process.wait_for("uciok").await?;
        for (name, value) in &config.options {
            process.send(&format!("setoption name {} value {}", name, value)).await?;
        }
        process.send("isready").await?;
        process.wait_for("readyok").await?;

        Ok(process)
    }

    async fn send(&mut self, command: &str) -> Result<(), EvalError> {
        debug!("engine <- {}", command);
        self.stdin
            .write_all(format!("{}\n", command).as_bytes())
            .await
            .map_err(|e| EvalError::Degraded(format!("Engine write failed: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| EvalError::Degraded(format!("Engine write failed: {}", e)))
    }

    async fn read_line(&mut self) -> Result<String, EvalError> {
        match self.stdout.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(EvalError::Degraded("Engine closed stdout".to_string())),
            Err(e) => Err(EvalError::Degraded(format!("Engine read failed: {}", e))),
        }
    }

    /// 读到以 `token` 开头的行为止
    async fn wait_for(&mut self, token: &str) -> Result<String, EvalError> {
        loop {
            let line = self.read_line().await?;
            if line.trim_start().starts_with(token) {
                return Ok(line);
            }
        }
    }

    /// 多主变搜索，返回按 multipv 序号排列的候选（走子方视角）
    async fn analyse(
        &mut self,
        fen: &str,
        multipv: usize,
        depth: u32,
    ) -> Result<Vec<RawCandidate>, EvalError> {
        if multipv != self.multipv {
            self.send(&format!("setoption name MultiPV value {}", multipv)).await?;
            self.multipv = multipv;
        }
        self.send(&format!("position fen {}", fen)).await?;
        self.send(&format!("go depth {}", depth)).await?;

        let mut lines: Vec<Option<InfoLine>> = vec![None; multipv];
        loop {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                break;
            }
            if let Some(info) = parse_info_line(&line) {
                // 同一序号以最后（最深）一行为准
                if info.multipv >= 1 && info.multipv <= multipv {
                    let slot = info.multipv - 1;
                    lines[slot] = Some(info);
                }
            }
        }

        Ok(lines
            .into_iter()
            .flatten()
            .map(|info| RawCandidate::new(info.first_move, info.score))
            .collect())
    }
}

/// 本地引擎评估器
pub struct UciEvaluator {
    config: UciConfig,
    idle: Mutex<Vec<UciProcess>>,
}

impl UciEvaluator {
    pub fn new(config: UciConfig) -> Self {
        Self {
            config,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// 获取当前配置
    pub fn config(&self) -> &UciConfig {
        &self.config
    }

    /// 取一个空闲进程，没有就新启动
    async fn checkout(&self) -> Result<UciProcess, EvalError> {
        let idle = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
        match idle {
            Some(process) => Ok(process),
            None => {
                info!("Starting engine process: {}", self.config.path);
                UciProcess::spawn(&self.config).await
            }
        }
    }

    fn checkin(&self, process: UciProcess) {
        self.idle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(process);
    }
}

#[async_trait]
impl Evaluator for UciEvaluator {
    async fn evaluate(
        &self,
        position: &ChessPosition,
        request: EvalRequest,
    ) -> Result<EvaluationResult, EvalError> {
        // 没有合法走法的局面不必启动引擎
        if position.legal_uci_moves().is_empty() {
            return Ok(EvaluationResult::default());
        }

        let mut process = self.checkout().await?;
        let fen = position.fen();
        let limit = Duration::from_secs(self.config.timeout_secs);

        let analysis = process.analyse(&fen, request.max_moves.max(1), request.strength);
        let analysed = timeout(limit, analysis)
            .await
            .unwrap_or_else(|_| Err(EvalError::Degraded(format!("Engine timed out on {}", fen))));

        match analysed {
            Ok(candidates) => {
                self.checkin(process);
                Ok(EvaluationResult::from_candidates(position, candidates, request.max_moves)?)
            }
            Err(e) => {
                // 进程状态未知，丢弃
                warn!("Discarding engine process after failure: {}", e);
                Err(e)
            }
        }
    }

    async fn check_available(&self) -> Result<(), EvalError> {
        let process = UciProcess::spawn(&self.config).await.map_err(|e| match e {
            EvalError::Degraded(reason) => EvalError::Unavailable(reason),
            other => other,
        })?;
        self.checkin(process);
        Ok(())
    }

    fn fingerprint(&self) -> BackendFingerprint {
        let mut value = format!("engine:{}", self.config.path);
        for arg in &self.config.args {
            value.push(' ');
            value.push_str(arg);
        }
        for (name, option) in &self.config.options {
            value.push_str(&format!(":{}={}", name, option));
        }
        BackendFingerprint::new(value)
    }

    fn name(&self) -> &str {
        "engine"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cp_line() {
        let line = "info depth 20 seldepth 28 multipv 2 score cp -35 nodes 123456 nps 1000000 pv e7e5 g1f3 b8c6";
        assert_eq!(
            parse_info_line(line),
            Some(InfoLine {
                multipv: 2,
                score: -35,
                first_move: "e7e5".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_mate_scores() {
        let win = parse_info_line("info depth 5 score mate 3 pv d1h5").unwrap();
        assert_eq!(win.score, MATE_SCORE - 3);
        assert_eq!(win.multipv, 1);

        let loss = parse_info_line("info depth 5 multipv 1 score mate -2 pv g7g6").unwrap();
        assert_eq!(loss.score, -MATE_SCORE + 2);
    }

    #[test]
    fn test_parse_ignores_bounds_and_noise() {
        assert!(parse_info_line("info depth 12 score cp 20 lowerbound pv e2e4").is_none());
        assert!(parse_info_line("info string NNUE evaluation enabled").is_none());
        assert!(parse_info_line("info depth 3 currmove e2e4 currmovenumber 1").is_none());
        assert!(parse_info_line("bestmove e2e4 ponder e7e5").is_none());
    }

    #[test]
    fn test_fingerprint_includes_options() {
        let plain = UciEvaluator::new(UciConfig::default());
        let tuned = UciEvaluator::new(UciConfig {
            options: vec![("Threads".to_string(), "4".to_string())],
            ..Default::default()
        });
        assert_eq!(plain.fingerprint().as_str(), "engine:stockfish");
        assert_eq!(tuned.fingerprint().as_str(), "engine:stockfish:Threads=4");
    }

    #[tokio::test]
    async fn test_missing_engine_is_unavailable() {
        let evaluator = UciEvaluator::new(UciConfig {
            path: "/nonexistent/chess-engine".to_string(),
            ..Default::default()
        });

        let err = evaluator.check_available().await.unwrap_err();
        assert!(err.is_fatal());

        let err = evaluator
            .evaluate(
                &ChessPosition::standard(),
                EvalRequest {
                    max_moves: 3,
                    strength: 5,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_terminal_position_needs_no_engine() {
        let evaluator = UciEvaluator::new(UciConfig {
            path: "/nonexistent/chess-engine".to_string(),
            ..Default::default()
        });
        // 愚人杀，白方被将死
        let mated = ChessPosition::from_fen(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
        )
        .unwrap();
        let result = evaluator
            .evaluate(
                &mated,
                EvalRequest {
                    max_moves: 3,
                    strength: 5,
                },
            )
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
