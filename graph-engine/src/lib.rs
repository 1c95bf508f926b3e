//! 局面图探索引擎
//!
//! 包含:
//! - 遍历引擎（并发展开、窗口剪枝、同局面去重、重试与取消）
//! - 图组装器（图模式 / 树模式，主变例标记）
//! - 探索统计

pub mod assembler;
pub mod explorer;
pub mod resolver;
pub mod stats;

#[cfg(test)]
mod testing;

pub use assembler::{assemble, GraphAssembler};
pub use explorer::{Exploration, Explorer};
pub use resolver::request_fingerprint;
pub use stats::ExploreStats;
