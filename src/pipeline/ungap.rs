use serde::Serialize;
use tracing::{debug, warn};

use super::{CancellationToken, Hit, HitSource, SearchContext, StageStats};
use crate::align::container::record_runs;
use crate::align::diagonal::DiagonalIndex;
use crate::align::ungapped;
use crate::index::Occurrence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UngapConfig {
    pub xdrop: i32,
    pub threshold: i32,
}

/// 无空位扩展：得分须同时达到固定阈值与该查询的统计截断分。
/// 种子中心已落在本流水线某条最终比对的无空位区段内时直接丢弃；
/// 区段只在下游返回存活比对后登记，因此结果与种子处理顺序无关。
pub struct UngapStage<'a> {
    source: Box<dyn HitSource + 'a>,
    ctx: &'a SearchContext<'a>,
    cfg: UngapConfig,
    known: DiagonalIndex,
    stats: StageStats,
}

impl<'a> UngapStage<'a> {
    pub fn new(source: Box<dyn HitSource + 'a>, ctx: &'a SearchContext<'a>, cfg: UngapConfig) -> Self {
        Self { source, ctx, cfg, known: DiagonalIndex::new(), stats: StageStats::default() }
    }
}

fn keep_pair(ctx: &SearchContext<'_>, cfg: &UngapConfig, known: &DiagonalIndex, s: Occurrence, q: Occurrence) -> bool {
    let half = (ctx.span / 2) as u32;
    if known.does_exist(q.sequence, s.sequence, q.offset + half, s.offset + half, 0) {
        return false;
    }
    let (Some(query), Some(subject)) = (
        ctx.query.get_sequence_by_index(q.sequence as usize),
        ctx.subject.get_sequence_by_index(s.sequence as usize),
    ) else {
        warn!(query = q.sequence, subject = s.sequence, "sequence lookup failed during ungapped extension");
        return false;
    };
    let ext = ungapped::extend(
        query.data,
        subject.data,
        q.offset as usize,
        s.offset as usize,
        ctx.span,
        ctx.matrix,
        cfg.xdrop,
    );
    let cutoff = match ctx.query_info.seq_info(q.sequence as usize) {
        Some(info) => info.cut_offs,
        None => return false,
    };
    ext.score >= cfg.threshold && ext.score >= cutoff
}

impl<'a> HitSource for UngapStage<'a> {
    fn name(&self) -> &'static str {
        "ungap"
    }

    fn for_each(&mut self, cancel: &CancellationToken, visit: &mut dyn FnMut(&mut Hit<'_>)) {
        let Self { source, ctx, cfg, known, stats } = self;
        let ctx: &SearchContext<'_> = ctx;
        source.for_each(cancel, &mut |hit| {
            stats.input += hit.indexes.len() as u64;
            let (subject, query) = (hit.subject, hit.query);
            hit.indexes
                .retain(|&(si, qi)| keep_pair(ctx, cfg, known, subject[si as usize], query[qi as usize]));
            stats.output += hit.indexes.len() as u64;
            if hit.indexes.is_empty() {
                return;
            }
            visit(hit);
            for al in &hit.alignments {
                record_runs(known, al);
            }
        });
        debug!(input = stats.input, output = stats.output, ratio = stats.ratio(), "ungap stage done");
    }

    fn collect_stats(&self, out: &mut Vec<(&'static str, StageStats)>) {
        self.source.collect_stats(out);
        out.push((self.name(), self.stats));
    }
}
