//! 局面表示
//!
//! 国际象棋规则（合法走法、FEN/SAN）直接使用 shakmaty，
//! 这里只负责把它包装成探索引擎需要的形状：
//! - `PositionKey`：规范化的局面标识（忽略步数计数）
//! - `ChessPosition`：可走子的局面
//! - `Side`：走子方

use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, File, Position, Rank, Role, Square};

use crate::error::PositionError;
use crate::evaluation::Score;

/// 走子方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// 对方
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// 把白方视角的分数转换为本方视角
    pub fn relative(self, white_score: Score) -> Score {
        match self {
            Side::White => white_score,
            Side::Black => -white_score,
        }
    }

    /// 把本方视角的分数转换为白方视角（与 `relative` 互逆）
    pub fn to_white(self, side_score: Score) -> Score {
        self.relative(side_score)
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

/// 规范化局面标识
///
/// 由棋子布局、走子方、易位权和（可合法吃过路兵时的）过路兵格组成，
/// 不含半回合计数和回合数，因此不同步数到达的相同局面得到相同的键。
/// 键相等是合并置换的唯一依据。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(String);

impl PositionKey {
    /// 从 FEN（或 EPD）字符串计算键
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        Ok(ChessPosition::from_fen(fen)?.key())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 可走子的局面
#[derive(Debug, Clone)]
pub struct ChessPosition {
    pos: Chess,
}

impl ChessPosition {
    /// 标准初始局面
    pub fn standard() -> Self {
        Self { pos: Chess::default() }
    }

    /// 解析 FEN，缺少步数字段的 EPD 也接受
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let trimmed = fen.trim();
        let parsed: Fen = trimmed.parse().map_err(|e: shakmaty::fen::ParseFenError| {
            PositionError::InvalidFen {
                fen: trimmed.to_string(),
                reason: e.to_string(),
            }
        })?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| PositionError::IllegalPosition {
                fen: trimmed.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { pos })
    }

    /// 完整 FEN
    pub fn fen(&self) -> String {
        Fen::from_setup(self.pos.clone().into_setup(EnPassantMode::Legal)).to_string()
    }

    /// EPD（FEN 去掉两个计数字段）
    pub fn epd(&self) -> String {
        let fen = self.fen();
        fen.split(' ').take(4).collect::<Vec<_>>().join(" ")
    }

    /// 规范化键
    pub fn key(&self) -> PositionKey {
        PositionKey(self.epd())
    }

    pub fn side_to_move(&self) -> Side {
        self.pos.turn().into()
    }

    /// 所有合法走法的 UCI 表示
    pub fn legal_uci_moves(&self) -> Vec<String> {
        self.pos
            .legal_moves()
            .iter()
            .map(|m| m.to_uci(CastlingMode::Standard).to_string())
            .collect()
    }

    /// 执行一个 UCI 走法，返回 SAN 和新局面
    pub fn play_uci(&self, uci: &str) -> Result<(String, ChessPosition), PositionError> {
        let invalid = || PositionError::InvalidMove {
            uci: uci.to_string(),
            fen: self.fen(),
        };

        let parsed: UciMove = uci.parse().map_err(|_| invalid())?;
        let mv = parsed.to_move(&self.pos).map_err(|_| invalid())?;

        let mut next = self.pos.clone();
        let san = SanPlus::from_move_and_play_unchecked(&mut next, &mv);
        Ok((san.to_string(), Self { pos: next }))
    }

    /// Unicode 棋盘（白方在下），空格用 `empty` 填充
    pub fn unicode_board(&self, empty: char) -> String {
        let board = self.pos.board();
        let mut rows = Vec::with_capacity(8);

        for rank in (0..8u32).rev() {
            let row: String = (0..8u32)
                .map(|file| {
                    let square = Square::from_coords(File::new(file), Rank::new(rank));
                    board
                        .piece_at(square)
                        .map(|piece| unicode_piece(piece.color, piece.role))
                        .unwrap_or(empty)
                })
                .collect();
            rows.push(row);
        }

        rows.join("\n")
    }
}

impl Default for ChessPosition {
    fn default() -> Self {
        Self::standard()
    }
}

/// 棋子的 Unicode 字符
fn unicode_piece(color: Color, role: Role) -> char {
    match (color, role) {
        (Color::White, Role::King) => '♔',
        (Color::White, Role::Queen) => '♕',
        (Color::White, Role::Rook) => '♖',
        (Color::White, Role::Bishop) => '♗',
        (Color::White, Role::Knight) => '♘',
        (Color::White, Role::Pawn) => '♙',
        (Color::Black, Role::King) => '♚',
        (Color::Black, Role::Queen) => '♛',
        (Color::Black, Role::Rook) => '♜',
        (Color::Black, Role::Bishop) => '♝',
        (Color::Black, Role::Knight) => '♞',
        (Color::Black, Role::Pawn) => '♟',
    }
}
