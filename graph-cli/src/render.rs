//! 输出渲染
//!
//! dot 格式：节点按走子方着色，主线节点和主变例边加粗，
//! 节点链接到云库的查询页面。

use std::fmt::Write;

use protocol::{ChessPosition, Graph, GraphEdge, GraphNode, Side};

use crate::args::BoardStyle;

/// 云库查询页面
const QUERY_URL: &str = "https://www.chessdb.cn/queryc_en/?";
/// 空格子的画法
const EMPTY_SQUARE: char = '\u{00B7}';

/// dot 渲染参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub board_style: BoardStyle,
    /// 出边数达到此值的节点画棋盘
    pub board_edges: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            board_style: BoardStyle::Unicode,
            board_edges: 3,
        }
    }
}

fn side_color(side: Side) -> &'static str {
    match side {
        Side::White => "gold",
        Side::Black => "burlywood4",
    }
}

/// dot 字符串转义
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// URL 百分号编码，保留 `/`
fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

fn shows_board(graph: &Graph, node: &GraphNode, options: &RenderOptions) -> bool {
    if options.board_style == BoardStyle::None {
        return false;
    }
    node.id == graph.root
        || node.outgoing.len() >= options.board_edges
        || (node.main_line && node.outgoing.is_empty())
}

fn node_label(graph: &Graph, node: &GraphNode, options: &RenderOptions) -> String {
    if shows_board(graph, node, options) {
        if let Ok(position) = ChessPosition::from_fen(&node.fen) {
            return format!(
                "fontname=\"Courier\", label=\"{}\"",
                escape(&position.unicode_board(EMPTY_SQUARE))
            );
        }
    }
    match node.score {
        Some(score) => format!("label=\"{}\"", score),
        None => "label=\"?\"".to_string(),
    }
}

fn write_node(out: &mut String, graph: &Graph, node: &GraphNode, options: &RenderOptions) {
    let width = if node.main_line { 3 } else { 1 };
    let _ = writeln!(
        out,
        "  n{} [{}, color={}, shape=box, URL=\"{}{}\", tooltip=\"{}\", penwidth={}]",
        node.id.0,
        node_label(graph, node, options),
        side_color(node.side),
        QUERY_URL,
        percent_encode(node.key.as_str()),
        escape(node.key.as_str()),
        width
    );
}

fn write_edge(out: &mut String, edge: &GraphEdge) {
    let style = if edge.principal {
        "penwidth=3, fontname=\"Helvetica-bold\""
    } else {
        "penwidth=1, fontname=\"Helvetica\""
    };
    let _ = writeln!(
        out,
        "  n{} -> n{} [label=\"{}\", color={}, {}]",
        edge.source.0,
        edge.target.0,
        escape(&edge.san),
        side_color(edge.mover),
        style
    );
}

/// 渲染为 Graphviz dot
pub fn render_dot(graph: &Graph, options: &RenderOptions) -> String {
    let mut out = String::from("digraph {\n");
    for edge in &graph.edges {
        write_edge(&mut out, edge);
    }
    for node in &graph.nodes {
        write_node(&mut out, graph, node, options);
    }
    out.push_str("}\n");
    out
}

/// 渲染为 JSON
pub fn render_json(graph: &Graph) -> serde_json::Result<String> {
    serde_json::to_string_pretty(graph)
}
