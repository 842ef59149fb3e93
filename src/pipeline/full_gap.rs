use serde::Serialize;
use tracing::{debug, warn};

use super::{frame_of, CancellationToken, Hit, HitSource, SearchContext, StageStats};
use crate::align::semigap::{GapCosts, SemiGapAligner};
use crate::align::splitter;
use crate::align::{Alignment, AlignmentContainer, Range};
use crate::index::Occurrence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FullGapConfig {
    pub gap_open: i32,
    pub gap_extend: i32,
    /// 原始分值单位
    pub xdrop: i32,
}

/// 从种子中心做双向 X-drop 空位扩展，得分达到截断分的比对交给下游，
/// 下游返回后存活者进入本流水线的比对容器，并留在 `hit.alignments` 中供上游登记。
pub struct FullGapStage<'a> {
    source: Box<dyn HitSource + 'a>,
    ctx: &'a SearchContext<'a>,
    cfg: FullGapConfig,
    aligner: SemiGapAligner,
    container: AlignmentContainer,
    stats: StageStats,
}

impl<'a> FullGapStage<'a> {
    pub fn new(source: Box<dyn HitSource + 'a>, ctx: &'a SearchContext<'a>, cfg: FullGapConfig) -> Self {
        Self {
            source,
            ctx,
            cfg,
            aligner: SemiGapAligner::new(),
            container: AlignmentContainer::new(),
            stats: StageStats::default(),
        }
    }
}

fn covered(pending: &[Alignment], query: usize, subject: usize, qa: u32, sa: u32) -> bool {
    pending.iter().any(|al| {
        al.query_idx == query && al.subject_idx == subject && al.query_range.contains(qa) && al.subject_range.contains(sa)
    })
}

fn gapped(
    ctx: &SearchContext<'_>,
    cfg: &FullGapConfig,
    aligner: &mut SemiGapAligner,
    container: &AlignmentContainer,
    pending: &[Alignment],
    s: Occurrence,
    q: Occurrence,
) -> Option<Alignment> {
    let (qi, si) = (q.sequence as usize, s.sequence as usize);
    let half = (ctx.span / 2) as u32;
    let (qa, sa) = (q.offset + half, s.offset + half);
    if container.does_exist(qi, si, qa, sa, 0) || covered(pending, qi, si, qa, sa) {
        return None;
    }
    let (Some(query), Some(subject)) = (ctx.query.get_sequence_by_index(qi), ctx.subject.get_sequence_by_index(si)) else {
        warn!(query = qi, subject = si, "sequence lookup failed, HSP skipped");
        return None;
    };
    let info = ctx.query_info.seq_info(qi)?;
    let costs = GapCosts { open: cfg.gap_open, extend: cfg.gap_extend, xdrop: cfg.xdrop };
    let g = aligner.align(query.data, subject.data, qa as usize, sa as usize, ctx.matrix, &costs);
    if g.score < info.cut_offs || g.ops.is_empty() {
        return None;
    }
    let st = splitter::split(query.data, subject.data, g.query_start, g.subject_start, &g.ops, ctx.matrix);
    let params = ctx.params();
    Some(Alignment {
        query_idx: qi,
        subject_idx: si,
        query_range: Range::new(g.query_start as u32, g.query_end as u32),
        subject_range: Range::new(g.subject_start as u32, g.subject_end as u32),
        score: g.score,
        bitscore: params.score_to_bitscore(g.score),
        evalue: params.score_to_evalue(info.eff_searchsp, g.score),
        length: st.length,
        identities: st.identities,
        positives: st.positives,
        misses: st.misses,
        query_gaps: st.query_gaps,
        subject_gaps: st.subject_gaps,
        gap_opens: st.gap_opens,
        frame: frame_of(ctx.query, query.strand),
        cigar: st.cigar,
        runs: st.runs,
    })
}

impl<'a> HitSource for FullGapStage<'a> {
    fn name(&self) -> &'static str {
        "full_gap"
    }

    fn for_each(&mut self, cancel: &CancellationToken, visit: &mut dyn FnMut(&mut Hit<'_>)) {
        let Self { source, ctx, cfg, aligner, container, stats } = self;
        let ctx: &SearchContext<'_> = ctx;
        source.for_each(cancel, &mut |hit| {
            stats.input += hit.indexes.len() as u64;
            let (subject, query) = (hit.subject, hit.query);
            let mut pending = Vec::new();
            hit.indexes.retain(|&(si, qi)| {
                match gapped(ctx, cfg, aligner, container, &pending, subject[si as usize], query[qi as usize]) {
                    Some(al) => {
                        pending.push(al);
                        true
                    }
                    None => false,
                }
            });
            stats.output += pending.len() as u64;
            if pending.is_empty() {
                return;
            }
            hit.alignments = pending;
            visit(hit);
            for al in &hit.alignments {
                container.insert(al.clone());
            }
        });
        debug!(
            input = stats.input,
            output = stats.output,
            alignments = container.alignments_number(),
            "full-gap stage done"
        );
    }

    fn collect_stats(&self, out: &mut Vec<(&'static str, StageStats)>) {
        self.source.collect_stats(out);
        out.push((self.name(), self.stats));
    }

    fn take_alignments(&mut self) -> Option<AlignmentContainer> {
        Some(std::mem::take(&mut self.container))
    }
}
