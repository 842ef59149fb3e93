//! 比对核心：替换矩阵、无空位扩展、带状小空位打分、X-drop 半全局扩展，
//! 以及比对的拆分统计与按对角线索引的去重容器。

pub mod alignment;
pub mod banded;
pub mod container;
pub mod diagonal;
pub mod matrix;
pub mod semigap;
pub mod splitter;
pub mod ungapped;

pub use alignment::{canonical_cmp, Alignment, Range};
pub use container::AlignmentContainer;
pub use matrix::ScoreMatrix;
