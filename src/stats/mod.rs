//! 统计量：Karlin-Altschul 参数、E 值/bit 分换算与每条查询的截断分。

pub mod global;
pub mod karlin;
pub mod query_info;

pub use global::GlobalParameters;
pub use query_info::{QueryInformation, SequenceInfo};
