//! Lichess 开局数据库客户端
//!
//! 用对局结果给走法打分：`100 * (白胜 - 黑胜) / 总局数`，白方视角。

use async_trait::async_trait;
use protocol::{
    BackendFingerprint, ChessPosition, EvalError, EvalRequest, EvaluationResult, Evaluator,
    RawCandidate, Score, HEALTH_CHECK_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lichess 客户端配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LichessConfig {
    /// 开局数据库接口地址
    pub base_url: String,
    /// 参与统计的等级分段
    pub ratings: Vec<u32>,
    /// 参与统计的时限类型
    pub speeds: Vec<String>,
    /// 少于这么多局的走法不参与
    pub min_games: u64,
    /// 访问令牌（可选）
    pub token: Option<String>,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for LichessConfig {
    fn default() -> Self {
        Self {
            base_url: "https://explorer.lichess.ovh/lichess".to_string(),
            ratings: vec![2000, 2200, 2500],
            speeds: vec!["blitz".to_string(), "rapid".to_string(), "classical".to_string()],
            min_games: 10,
            token: None,
            timeout_secs: 10,
        }
    }
}

/// 开局数据库响应体
#[derive(Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    moves: Vec<ExplorerMove>,
}

#[derive(Deserialize)]
struct ExplorerMove {
    uci: String,
    white: u64,
    draws: u64,
    black: u64,
}

impl ExplorerMove {
    fn total(&self) -> u64 {
        self.white + self.draws + self.black
    }

    /// 白方视角分数
    fn white_score(&self) -> Score {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        let diff = self.white as i64 - self.black as i64;
        (100 * diff / total as i64) as Score
    }
}

/// Lichess 客户端
pub struct LichessClient {
    config: LichessConfig,
    client: reqwest::Client,
}

impl LichessClient {
    /// 创建新的 Lichess 客户端
    pub fn new(config: LichessConfig) -> Result<Self, EvalError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EvalError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// 获取当前配置
    pub fn config(&self) -> &LichessConfig {
        &self.config
    }

    /// 查询某个局面
    async fn query(
        &self,
        client: &reqwest::Client,
        fen: &str,
        max_moves: usize,
    ) -> Result<ExplorerResponse, reqwest::Error> {
        let ratings = join(&self.config.ratings);
        let speeds = self.config.speeds.join(",");
        let moves = max_moves.to_string();

        let mut builder = client.get(&self.config.base_url).query(&[
            ("variant", "standard"),
            ("fen", fen),
            ("ratings", ratings.as_str()),
            ("speeds", speeds.as_str()),
            ("moves", moves.as_str()),
        ]);
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }

        builder.send().await?.error_for_status()?.json().await
    }
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// 把响应转换为候选走法（走子方视角）
fn candidates_from_response(
    response: ExplorerResponse,
    position: &ChessPosition,
    min_games: u64,
) -> Vec<RawCandidate> {
    let side = position.side_to_move();
    response
        .moves
        .into_iter()
        .filter(|m| m.total() >= min_games)
        .map(|m| {
            let score = side.relative(m.white_score());
            RawCandidate::new(m.uci, score)
        })
        .collect()
}

#[async_trait]
impl Evaluator for LichessClient {
    async fn evaluate(
        &self,
        position: &ChessPosition,
        request: EvalRequest,
    ) -> Result<EvaluationResult, EvalError> {
        let fen = position.fen();
        debug!("Querying lichess explorer: {}", fen);

        let response = self
            .query(&self.client, &fen, request.max_moves)
            .await
            .map_err(|e| {
                warn!("lichess request failed for {}: {}", fen, e);
                EvalError::Degraded(format!("lichess request failed: {}", e))
            })?;

        let candidates = candidates_from_response(response, position, self.config.min_games);
        Ok(EvaluationResult::from_candidates(position, candidates, request.max_moves)?)
    }

    async fn check_available(&self) -> Result<(), EvalError> {
        let health_client = reqwest::Client::builder()
            .timeout(HEALTH_CHECK_TIMEOUT)
            .build()
            .map_err(|e| {
                EvalError::Unavailable(format!("Failed to create health check client: {}", e))
            })?;

        self.query(&health_client, &ChessPosition::standard().fen(), 1)
            .await
            .map(|_| ())
            .map_err(|e| {
                EvalError::Unavailable(format!(
                    "Cannot reach lichess explorer ({}): {}",
                    self.config.base_url, e
                ))
            })
    }

    fn fingerprint(&self) -> BackendFingerprint {
        BackendFingerprint::new(format!(
            "lichess:ratings={}:speeds={}:min_games={}",
            join(&self.config.ratings),
            self.config.speeds.join(","),
            self.config.min_games
        ))
    }

    fn name(&self) -> &str {
        "lichess"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::Side;

    const RESPONSE: &str = r#"{
        "white": 1000, "draws": 800, "black": 700,
        "moves": [
            {"uci":"e2e4","san":"e4","white":500,"draws":300,"black":200,"averageRating":2300},
            {"uci":"d2d4","san":"d4","white":300,"draws":400,"black":300,"averageRating":2310},
            {"uci":"b1a3","san":"Na3","white":1,"draws":0,"black":4,"averageRating":2000}
        ]
    }"#;

    #[test]
    fn test_white_score() {
        let m = ExplorerMove {
            uci: "e2e4".into(),
            white: 500,
            draws: 300,
            black: 200,
        };
        assert_eq!(m.white_score(), 30);

        let empty = ExplorerMove {
            uci: "e2e4".into(),
            white: 0,
            draws: 0,
            black: 0,
        };
        assert_eq!(empty.white_score(), 0);
    }

    #[test]
    fn test_candidates_filter_rare_moves() {
        let response: ExplorerResponse = serde_json::from_str(RESPONSE).unwrap();
        let start = ChessPosition::standard();
        let candidates = candidates_from_response(response, &start, 10);

        assert_eq!(
            candidates,
            vec![RawCandidate::new("e2e4", 30), RawCandidate::new("d2d4", 0)]
        );
    }

    #[test]
    fn test_candidates_black_to_move() {
        let response: ExplorerResponse = serde_json::from_str(
            r#"{"moves":[{"uci":"c7c5","white":300,"draws":200,"black":500}]}"#,
        )
        .unwrap();
        let after_e4 = ChessPosition::standard().play_uci("e2e4").unwrap().1;
        assert_eq!(after_e4.side_to_move(), Side::Black);

        let candidates = candidates_from_response(response, &after_e4, 0);
        // 白方视角 -20，黑方视角 +20
        assert_eq!(candidates, vec![RawCandidate::new("c7c5", 20)]);

        let result = EvaluationResult::from_candidates(&after_e4, candidates, 10).unwrap();
        assert_eq!(result.moves[0].score, -20);
    }

    #[test]
    fn test_fingerprint_tracks_filters() {
        let a = LichessClient::new(LichessConfig::default()).unwrap();
        let b = LichessClient::new(LichessConfig {
            min_games: 100,
            ..Default::default()
        })
        .unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().as_str().starts_with("lichess:"));
    }
}
