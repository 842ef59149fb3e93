use std::sync::Arc;

use tracing::debug;

use super::{CancellationToken, Hit, HitSource, StageStats};
use crate::config::SeedPartition;
use crate::dispatch::RangeIterator;
use crate::index::SeedIndex;

/// 动态划分时每次领取的种子码数
const DYNAMIC_CHUNK: usize = 16;

enum CodeFeed {
    Owned(Vec<u32>),
    Shared { codes: Arc<Vec<u32>>, ranges: Arc<RangeIterator> },
}

/// 流水线的根：遍历两侧索引都出现的种子码，每个码产生一个 Hit，
/// 其候选为主体出现与查询出现的全部配对。
pub struct SeedHitSource<'a> {
    subject: &'a SeedIndex,
    query: &'a SeedIndex,
    feed: CodeFeed,
    stats: StageStats,
    done: bool,
}

impl<'a> SeedHitSource<'a> {
    /// 种子码按配对数降序排列（相同时按编码升序），高频码优先处理
    pub fn new(subject: &'a SeedIndex, query: &'a SeedIndex) -> Self {
        let mut weighted: Vec<(u64, u32)> = query
            .present_codes()
            .filter_map(|code| {
                let pairs = subject.occurrences(code).len() as u64 * query.occurrences(code).len() as u64;
                (pairs > 0).then_some((pairs, code))
            })
            .collect();
        weighted.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let codes: Vec<u32> = weighted.into_iter().map(|(_, c)| c).collect();
        debug!(codes = codes.len(), "seed source ready");
        Self { subject, query, feed: CodeFeed::Owned(codes), stats: StageStats::default(), done: false }
    }

    pub fn codes_number(&self) -> usize {
        match &self.feed {
            CodeFeed::Owned(codes) => codes.len(),
            CodeFeed::Shared { codes, .. } => codes.len(),
        }
    }

    /// 拆分为 `n` 个互不相交的子源
    pub fn split(self, n: usize, mode: SeedPartition) -> Vec<SeedHitSource<'a>> {
        let n = n.max(1);
        let codes = match self.feed {
            CodeFeed::Owned(codes) => codes,
            // 已拆分过的子源不再细分
            feed @ CodeFeed::Shared { .. } => {
                return vec![SeedHitSource { feed, ..self }];
            }
        };
        let (subject, query) = (self.subject, self.query);
        let make = |feed| SeedHitSource { subject, query, feed, stats: StageStats::default(), done: false };
        match mode {
            SeedPartition::Static => {
                let mut parts = vec![Vec::new(); n];
                for (i, code) in codes.into_iter().enumerate() {
                    parts[i % n].push(code);
                }
                parts.into_iter().map(|p| make(CodeFeed::Owned(p))).collect()
            }
            SeedPartition::Dynamic => {
                let ranges = Arc::new(RangeIterator::new(0, codes.len(), DYNAMIC_CHUNK));
                let codes = Arc::new(codes);
                (0..n)
                    .map(|_| make(CodeFeed::Shared { codes: Arc::clone(&codes), ranges: Arc::clone(&ranges) }))
                    .collect()
            }
        }
    }

    fn emit(
        subject: &SeedIndex,
        query: &SeedIndex,
        code: u32,
        stats: &mut StageStats,
        visit: &mut dyn FnMut(&mut Hit<'_>),
    ) {
        let s = subject.occurrences(code);
        let q = query.occurrences(code);
        if s.is_empty() || q.is_empty() {
            return;
        }
        let mut hit = Hit::new(code, s, q);
        hit.indexes.reserve(s.len() * q.len());
        for si in 0..s.len() as u32 {
            for qi in 0..q.len() as u32 {
                hit.indexes.push((si, qi));
            }
        }
        let n = hit.indexes.len() as u64;
        stats.input += n;
        stats.output += n;
        visit(&mut hit);
    }
}

impl<'a> HitSource for SeedHitSource<'a> {
    fn name(&self) -> &'static str {
        "seed"
    }

    fn for_each(&mut self, cancel: &CancellationToken, visit: &mut dyn FnMut(&mut Hit<'_>)) {
        if self.done {
            return;
        }
        let Self { subject, query, feed, stats, done } = self;
        match feed {
            CodeFeed::Owned(codes) => {
                for &code in codes.iter() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    Self::emit(subject, query, code, stats, visit);
                }
            }
            CodeFeed::Shared { codes, ranges } => {
                'chunks: while let Some(range) = ranges.retrieve() {
                    for &code in &codes[range] {
                        if cancel.is_cancelled() {
                            break 'chunks;
                        }
                        Self::emit(subject, query, code, stats, visit);
                    }
                }
            }
        }
        *done = true;
    }

    fn collect_stats(&self, out: &mut Vec<(&'static str, StageStats)>) {
        out.push((self.name(), self.stats));
    }
}
