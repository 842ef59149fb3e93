//! 种子-扩展流水线。
//!
//! 每个阶段包装一个上游 [`HitSource`]：调用上游的 `for_each`，在闭包里就地过滤
//! `Hit::indexes`，仅当仍有存活候选时才交给下游。流水线可按 [`PipelineDescriptor`]
//! 多次实例化，每个实例绑定一个独立的种子子源，在各自的工作线程上运行。

use serde::Serialize;

use crate::align::{Alignment, AlignmentContainer, ScoreMatrix};
use crate::db::Database;
use crate::index::Occurrence;
use crate::stats::{GlobalParameters, QueryInformation};

pub mod cancel;
pub mod composition;
pub mod descriptor;
pub mod full_gap;
pub mod seed;
pub mod small_gap;
pub mod ungap;

pub use cancel::CancellationToken;
pub use descriptor::{PipelineDescriptor, StageConfig};
pub use seed::SeedHitSource;

/// 一个种子码对应的候选集合
#[derive(Debug)]
pub struct Hit<'h> {
    pub code: u32,
    pub subject: &'h [Occurrence],
    pub query: &'h [Occurrence],
    /// 存活的 (主体出现下标, 查询出现下标)
    pub indexes: Vec<(u32, u32)>,
    /// 全空位阶段产生、尚未入库的比对，供下游阶段修正或剔除
    pub alignments: Vec<Alignment>,
}

impl<'h> Hit<'h> {
    pub fn new(code: u32, subject: &'h [Occurrence], query: &'h [Occurrence]) -> Self {
        Self { code, subject, query, indexes: Vec::new(), alignments: Vec::new() }
    }

    #[inline]
    pub fn pair(&self, idx: (u32, u32)) -> (Occurrence, Occurrence) {
        (self.subject[idx.0 as usize], self.query[idx.1 as usize])
    }
}

/// 输入/输出计数，用于报告各阶段的过滤比例
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub input: u64,
    pub output: u64,
}

impl StageStats {
    pub fn add(&mut self, other: &StageStats) {
        self.input += other.input;
        self.output += other.output;
    }

    pub fn ratio(&self) -> f64 {
        if self.input == 0 {
            0.0
        } else {
            self.output as f64 / self.input as f64
        }
    }
}

/// 一次搜索中所有阶段共享的只读上下文
pub struct SearchContext<'a> {
    pub subject: &'a Database,
    pub query: &'a Database,
    pub matrix: &'a ScoreMatrix,
    pub query_info: &'a QueryInformation<'a>,
    pub span: usize,
}

impl<'a> SearchContext<'a> {
    pub fn params(&self) -> &'a GlobalParameters {
        self.query_info.params()
    }
}

/// Producer side of the pipe-and-filter chain.
pub trait HitSource: Send {
    fn name(&self) -> &'static str;

    /// 逐个产生 Hit 并交给 `visit`；返回即表示本源已耗尽（或被取消）
    fn for_each(&mut self, cancel: &CancellationToken, visit: &mut dyn FnMut(&mut Hit<'_>));

    /// 按上游到下游的顺序追加各阶段计数
    fn collect_stats(&self, out: &mut Vec<(&'static str, StageStats)>);

    /// 取走流水线产生的比对容器
    fn take_alignments(&mut self) -> Option<AlignmentContainer> {
        None
    }
}

/// 链方向对应的报告帧
pub(crate) fn frame_of(db: &Database, strand: crate::db::Strand) -> Option<i8> {
    match db.alphabet {
        crate::util::Alphabet::Protein => None,
        crate::util::Alphabet::Nucleotide => Some(match strand {
            crate::db::Strand::Plus => 1,
            crate::db::Strand::Minus => -1,
        }),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// 直接回放预先构造好的 Hit 的测试源
    pub struct ReplaySource {
        pub hits: Vec<(u32, Vec<Occurrence>, Vec<Occurrence>)>,
        pub stats: StageStats,
    }

    impl ReplaySource {
        pub fn new(hits: Vec<(u32, Vec<Occurrence>, Vec<Occurrence>)>) -> Self {
            Self { hits, stats: StageStats::default() }
        }
    }

    impl HitSource for ReplaySource {
        fn name(&self) -> &'static str {
            "replay"
        }

        fn for_each(&mut self, cancel: &CancellationToken, visit: &mut dyn FnMut(&mut Hit<'_>)) {
            for (code, subject, query) in &self.hits {
                if cancel.is_cancelled() {
                    return;
                }
                let mut hit = Hit::new(*code, subject, query);
                for si in 0..subject.len() as u32 {
                    for qi in 0..query.len() as u32 {
                        hit.indexes.push((si, qi));
                    }
                }
                self.stats.input += hit.indexes.len() as u64;
                self.stats.output += hit.indexes.len() as u64;
                visit(&mut hit);
            }
        }

        fn collect_stats(&self, out: &mut Vec<(&'static str, StageStats)>) {
            out.push((self.name(), self.stats));
        }
    }

    pub fn occ(sequence: u32, offset: u32) -> Occurrence {
        Occurrence { sequence, offset }
    }
}
