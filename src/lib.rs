//! # plast-rust
//!
//! 受 PLAST 启发的并行局部比对搜索工具（种子-扩展流水线）。
//!
//! 一次搜索依次经过：
//!
//! - **种子**：两侧数据库按精确 k-mer 建索引，取两侧都出现的种子码，高频码优先
//! - **无空位扩展**：X-drop 双向延伸，按固定阈值与每条查询的统计截断分过滤
//! - **小空位扩展**：种子左右定长窗口内的带状仿射间隙 DP（可 8 路 i16 并行）
//! - **全空位扩展**：半全局 X-drop 仿射间隙 DP，得到最终比对与统计量
//! - **组成校正**：可选，按残基组成修正 E 值
//!
//! 流水线按种子码拆分为多个子流水线并行执行，结果合并后去冗余、排序输出。
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use plast_rust::config::SearchOptions;
//! use plast_rust::engine::{search, SubjectInput};
//! use plast_rust::io::fasta::read_database;
//! use plast_rust::pipeline::CancellationToken;
//! use plast_rust::report::TabularVisitor;
//!
//! # fn main() -> plast_rust::error::Result<()> {
//! let options = SearchOptions::protein();
//! let subject = read_database("subject.fa", options.alphabet())?;
//! let query = read_database("query.fa", options.alphabet())?;
//! let outcome = search(&options, SubjectInput::Plain(&subject), query, &CancellationToken::new())?;
//!
//! let mut out = TabularVisitor::new(std::io::stdout());
//! outcome.alignments.accept(&mut out, &outcome.query, &subject)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## 模块说明
//!
//! - [`util`] — 核酸 / 蛋白残基编码
//! - [`db`] / [`io`] — 序列数据库与 FASTA 解析
//! - [`index`] — 种子索引及其持久化
//! - [`align`] — 替换矩阵、各级扩展 DP、比对容器
//! - [`stats`] — Karlin-Altschul 统计参数与每条查询的截断分
//! - [`pipeline`] — 各流水线阶段与流水线描述
//! - [`dispatch`] / [`engine`] — 并行分发与完整搜索
//! - [`report`] — 结果访问者与制表输出

pub mod align;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod index;
pub mod io;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod util;
