//! chessdb.cn 云库客户端
//!
//! 查询 `cdb.php?action=queryall`，返回云库已知的全部走法及分数。

use async_trait::async_trait;
use protocol::{
    BackendFingerprint, ChessPosition, EvalError, EvalRequest, EvaluationResult, Evaluator,
    RawCandidate, HEALTH_CHECK_TIMEOUT, HTTP_TIMEOUT_SECS,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// 云库客户端配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessDbConfig {
    /// 查询接口地址
    pub base_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for ChessDbConfig {
    fn default() -> Self {
        Self {
            base_url: "http://www.chessdb.cn/cdb.php".to_string(),
            timeout_secs: HTTP_TIMEOUT_SECS,
        }
    }
}

/// queryall 响应体
#[derive(Deserialize)]
struct QueryAllResponse {
    status: String,
    #[serde(default)]
    moves: Vec<CloudMove>,
}

#[derive(Deserialize)]
struct CloudMove {
    uci: String,
    /// 通常是整数，未知时云库会给出字符串
    #[serde(default)]
    score: serde_json::Value,
}

/// 云库客户端
pub struct ChessDbClient {
    config: ChessDbConfig,
    client: reqwest::Client,
}

impl ChessDbClient {
    /// 创建新的云库客户端
    pub fn new(config: ChessDbConfig) -> Result<Self, EvalError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EvalError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// 获取当前配置
    pub fn config(&self) -> &ChessDbConfig {
        &self.config
    }

    /// 发送 queryall 请求
    async fn query(
        &self,
        client: &reqwest::Client,
        epd: &str,
    ) -> Result<QueryAllResponse, reqwest::Error> {
        client
            .get(&self.config.base_url)
            .query(&[("action", "queryall"), ("board", epd), ("json", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

/// 把 queryall 响应转换为候选走法
fn candidates_from_response(response: QueryAllResponse) -> Result<Vec<RawCandidate>, EvalError> {
    match response.status.as_str() {
        "ok" => Ok(response
            .moves
            .into_iter()
            .filter_map(|m| {
                let score = m.score.as_i64()?;
                Some(RawCandidate::new(m.uci, score as i32))
            })
            .collect()),
        // 云库不认识的局面、终局局面都没有候选
        "unknown" | "checkmate" | "stalemate" => Ok(Vec::new()),
        "rate limited exceeded" => Err(EvalError::Degraded(
            "chessdb rate limit exceeded".to_string(),
        )),
        other => Err(EvalError::Degraded(format!("chessdb status: {}", other))),
    }
}

#[async_trait]
impl Evaluator for ChessDbClient {
    async fn evaluate(
        &self,
        position: &ChessPosition,
        request: EvalRequest,
    ) -> Result<EvaluationResult, EvalError> {
        let epd = position.epd();
        debug!("Querying chessdb: {}", epd);

        let response = self.query(&self.client, &epd).await.map_err(|e| {
            warn!("chessdb request failed for {}: {}", epd, e);
            EvalError::Degraded(format!("chessdb request failed: {}", e))
        })?;

        let candidates = candidates_from_response(response)?;
        Ok(EvaluationResult::from_candidates(position, candidates, request.max_moves)?)
    }

    /// 使用独立的短超时客户端，避免长时间等待
    async fn check_available(&self) -> Result<(), EvalError> {
        let health_client = reqwest::Client::builder()
            .timeout(HEALTH_CHECK_TIMEOUT)
            .build()
            .map_err(|e| {
                EvalError::Unavailable(format!("Failed to create health check client: {}", e))
            })?;

        self.query(&health_client, &ChessPosition::standard().epd())
            .await
            .map(|_| ())
            .map_err(|e| {
                EvalError::Unavailable(format!(
                    "Cannot reach chessdb ({}): {}",
                    self.config.base_url, e
                ))
            })
    }

    fn fingerprint(&self) -> BackendFingerprint {
        BackendFingerprint::new("chessdb")
    }

    fn name(&self) -> &str {
        "chessdb"
    }
}
