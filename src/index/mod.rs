//! 种子索引：精确 k-mer 编码、按编码分组的出现位置表与 bincode 持久化。

pub mod seed;
pub mod seed_index;

pub use seed::SeedModel;
pub use seed_index::{IndexMeta, IndexedDatabase, Occurrence, SeedIndex};
