use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use super::{CancellationToken, Hit, HitSource, SearchContext, StageStats};
use crate::align::{Alignment, AlignmentContainer};
use crate::db::Database;
use crate::stats::GlobalParameters;
use crate::util::protein;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositionConfig {
    pub evalue: f64,
    /// 背景频率下的无空位 λ
    pub ideal_lambda: f64,
}

type Composition = [f64; protein::SEED_SIGMA];

#[derive(Default)]
struct CompositionCache {
    queries: HashMap<usize, Composition>,
    subjects: HashMap<usize, Composition>,
}

fn composition_of<'c>(cache: &'c mut HashMap<usize, Composition>, db: &Database, idx: usize) -> Option<&'c Composition> {
    if !cache.contains_key(&idx) {
        let seq = db.get_sequence_by_index(idx)?;
        cache.insert(idx, protein::composition(seq.data));
    }
    cache.get(&idx)
}

/// 组成校正：按两条序列的残基组成重新求 λ，低于理想值时按比例压低得分并重算 E 值，
/// 超过阈值的比对被剔除。
pub struct CompositionStage<'a> {
    source: Box<dyn HitSource + 'a>,
    ctx: &'a SearchContext<'a>,
    cfg: CompositionConfig,
    cache: CompositionCache,
    stats: StageStats,
}

impl<'a> CompositionStage<'a> {
    pub fn new(source: Box<dyn HitSource + 'a>, ctx: &'a SearchContext<'a>, cfg: CompositionConfig) -> Self {
        Self { source, ctx, cfg, cache: CompositionCache::default(), stats: StageStats::default() }
    }
}

/// 返回 false 表示该比对应被剔除
fn adjust(ctx: &SearchContext<'_>, cfg: &CompositionConfig, cache: &mut CompositionCache, al: &mut Alignment) -> bool {
    let Some(q) = composition_of(&mut cache.queries, ctx.query, al.query_idx).copied() else {
        return true;
    };
    let Some(s) = composition_of(&mut cache.subjects, ctx.subject, al.subject_idx) else {
        return true;
    };
    let Some(lambda) = GlobalParameters::composition_lambda(ctx.matrix, &q, s) else {
        return true;
    };
    if lambda >= cfg.ideal_lambda {
        return true;
    }
    let Some(info) = ctx.query_info.seq_info(al.query_idx) else {
        return true;
    };
    let params = ctx.params();
    let adjusted = (al.score as f64 * lambda / cfg.ideal_lambda).round() as i32;
    let evalue = params.score_to_evalue(info.eff_searchsp, adjusted);
    if evalue > cfg.evalue {
        return false;
    }
    al.evalue = evalue;
    al.bitscore = params.score_to_bitscore(adjusted);
    true
}

impl<'a> HitSource for CompositionStage<'a> {
    fn name(&self) -> &'static str {
        "composition"
    }

    fn for_each(&mut self, cancel: &CancellationToken, visit: &mut dyn FnMut(&mut Hit<'_>)) {
        let Self { source, ctx, cfg, cache, stats } = self;
        let ctx: &SearchContext<'_> = ctx;
        source.for_each(cancel, &mut |hit| {
            stats.input += hit.alignments.len() as u64;
            hit.alignments.retain_mut(|al| adjust(ctx, cfg, cache, al));
            stats.output += hit.alignments.len() as u64;
            if !hit.alignments.is_empty() {
                visit(hit);
            }
        });
        debug!(input = stats.input, output = stats.output, "composition stage done");
    }

    fn collect_stats(&self, out: &mut Vec<(&'static str, StageStats)>) {
        self.source.collect_stats(out);
        out.push((self.name(), self.stats));
    }

    fn take_alignments(&mut self) -> Option<AlignmentContainer> {
        self.source.take_alignments()
    }
}

/// 关闭组成校正时占位的阶段：原样转发，不计数
pub struct NullComposition<'a> {
    source: Box<dyn HitSource + 'a>,
}

impl<'a> NullComposition<'a> {
    pub fn new(source: Box<dyn HitSource + 'a>) -> Self {
        Self { source }
    }
}

impl<'a> HitSource for NullComposition<'a> {
    fn name(&self) -> &'static str {
        "composition_null"
    }

    fn for_each(&mut self, cancel: &CancellationToken, visit: &mut dyn FnMut(&mut Hit<'_>)) {
        self.source.for_each(cancel, visit);
    }

    fn collect_stats(&self, out: &mut Vec<(&'static str, StageStats)>) {
        self.source.collect_stats(out);
        out.push((self.name(), StageStats::default()));
    }

    fn take_alignments(&mut self) -> Option<AlignmentContainer> {
        self.source.take_alignments()
    }
}
