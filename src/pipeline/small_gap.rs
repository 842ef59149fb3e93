use serde::Serialize;
use tracing::{debug, warn};

use super::{CancellationToken, Hit, HitSource, SearchContext, StageStats};
use crate::align::banded::{
    anchored_band_score, anchored_band_score_lanes, left_window, right_window, BandBuffer, SmallGapParams, LANES, PAD,
};
use crate::align::ungapped;
use crate::index::Occurrence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SmallGapConfig {
    pub gap_open: i32,
    pub gap_extend: i32,
    pub band_width: usize,
    pub window: usize,
    pub threshold: i32,
    /// 仅在 i16 通道不会溢出时才会为 true
    pub vectorized: bool,
}

impl SmallGapConfig {
    pub fn params(&self) -> SmallGapParams {
        SmallGapParams {
            gap_open: self.gap_open,
            gap_extend: self.gap_extend,
            band_width: self.band_width,
            window: self.window,
        }
    }
}

/// 一对序列的左右邻域窗口
struct Neighbourhood {
    q_right: Vec<u8>,
    s_right: Vec<u8>,
    q_left: Vec<u8>,
    s_left: Vec<u8>,
}

impl Neighbourhood {
    fn new(window: usize, lanes: usize) -> Self {
        let n = window * lanes;
        Self { q_right: vec![PAD; n], s_right: vec![PAD; n], q_left: vec![PAD; n], s_left: vec![PAD; n] }
    }

    fn fill(&mut self, lane: usize, window: usize, query: &[u8], subject: &[u8], q_off: usize, s_off: usize, span: usize) {
        let r = lane * window..(lane + 1) * window;
        right_window(query, q_off + span, window, &mut self.q_right[r.clone()]);
        right_window(subject, s_off + span, window, &mut self.s_right[r.clone()]);
        left_window(query, q_off, window, &mut self.q_left[r.clone()]);
        left_window(subject, s_off, window, &mut self.s_left[r]);
    }

    fn clear_lane(&mut self, lane: usize, window: usize) {
        let r = lane * window..(lane + 1) * window;
        for buf in [&mut self.q_right, &mut self.s_right, &mut self.q_left, &mut self.s_left] {
            buf[r.clone()].fill(PAD);
        }
    }
}

struct Scorer {
    params: SmallGapParams,
    band: BandBuffer,
    single: Neighbourhood,
    batch: Neighbourhood,
    /// 批内各通道对应的候选下标及其种子分
    pending: Vec<(usize, i32)>,
    scores: Vec<i32>,
}

/// 小空位带状扩展：种子分加上左右两侧锚定带状 DP 的最佳得分，不低于阈值的候选存活。
/// 向量化路径一次计算 8 对，结果与标量路径逐一相同。
pub struct SmallGapStage<'a> {
    source: Box<dyn HitSource + 'a>,
    ctx: &'a SearchContext<'a>,
    cfg: SmallGapConfig,
    scorer: Scorer,
    stats: StageStats,
}

impl<'a> SmallGapStage<'a> {
    pub fn new(source: Box<dyn HitSource + 'a>, ctx: &'a SearchContext<'a>, cfg: SmallGapConfig) -> Self {
        let params = cfg.params();
        let scorer = Scorer {
            params,
            band: BandBuffer::new(),
            single: Neighbourhood::new(cfg.window, 1),
            batch: Neighbourhood::new(cfg.window, LANES),
            pending: Vec::with_capacity(LANES),
            scores: Vec::new(),
        };
        Self { source, ctx, cfg, scorer, stats: StageStats::default() }
    }
}

impl Scorer {
    fn score_pairs(&mut self, ctx: &SearchContext<'_>, vectorized: bool, subject: &[Occurrence], query: &[Occurrence], pairs: &[(u32, u32)]) {
        self.scores.clear();
        self.scores.resize(pairs.len(), i32::MIN);
        self.pending.clear();
        let w = self.params.window;
        for (k, &(si, qi)) in pairs.iter().enumerate() {
            let (s, q) = (subject[si as usize], query[qi as usize]);
            let (Some(qs), Some(ss)) = (
                ctx.query.get_sequence_by_index(q.sequence as usize),
                ctx.subject.get_sequence_by_index(s.sequence as usize),
            ) else {
                warn!(query = q.sequence, subject = s.sequence, "sequence lookup failed during small-gap extension");
                continue;
            };
            let (q_off, s_off) = (q.offset as usize, s.offset as usize);
            let seed = ungapped::seed_score(qs.data, ss.data, q_off, s_off, ctx.span, ctx.matrix);
            if vectorized {
                let lane = self.pending.len();
                self.batch.fill(lane, w, qs.data, ss.data, q_off, s_off, ctx.span);
                self.pending.push((k, seed));
                if self.pending.len() == LANES {
                    self.flush(ctx);
                }
            } else {
                self.single.fill(0, w, qs.data, ss.data, q_off, s_off, ctx.span);
                let nb = &self.single;
                let right = anchored_band_score(&nb.q_right, &nb.s_right, ctx.matrix, &self.params, &mut self.band);
                let left = anchored_band_score(&nb.q_left, &nb.s_left, ctx.matrix, &self.params, &mut self.band);
                self.scores[k] = seed + right + left;
            }
        }
        if !self.pending.is_empty() {
            for lane in self.pending.len()..LANES {
                self.batch.clear_lane(lane, w);
            }
            self.flush(ctx);
        }
    }

    fn flush(&mut self, ctx: &SearchContext<'_>) {
        let w = self.params.window;
        let nb = &self.batch;
        let right = anchored_band_score_lanes(&lanes(&nb.q_right, w), &lanes(&nb.s_right, w), ctx.matrix, &self.params, &mut self.band);
        let left = anchored_band_score_lanes(&lanes(&nb.q_left, w), &lanes(&nb.s_left, w), ctx.matrix, &self.params, &mut self.band);
        for (lane, &(k, seed)) in self.pending.iter().enumerate() {
            self.scores[k] = seed + right[lane] + left[lane];
        }
        self.pending.clear();
    }
}

fn lanes(buf: &[u8], w: usize) -> [&[u8]; LANES] {
    std::array::from_fn(|l| &buf[l * w..(l + 1) * w])
}

impl<'a> HitSource for SmallGapStage<'a> {
    fn name(&self) -> &'static str {
        "small_gap"
    }

    fn for_each(&mut self, cancel: &CancellationToken, visit: &mut dyn FnMut(&mut Hit<'_>)) {
        let Self { source, ctx, cfg, scorer, stats } = self;
        let ctx: &SearchContext<'_> = ctx;
        let (threshold, vectorized) = (cfg.threshold, cfg.vectorized);
        source.for_each(cancel, &mut |hit| {
            stats.input += hit.indexes.len() as u64;
            scorer.score_pairs(ctx, vectorized, hit.subject, hit.query, &hit.indexes);
            let mut scores = scorer.scores.iter();
            hit.indexes.retain(|_| scores.next().is_some_and(|&s| s >= threshold));
            stats.output += hit.indexes.len() as u64;
            if !hit.indexes.is_empty() {
                visit(hit);
            }
        });
        debug!(input = stats.input, output = stats.output, ratio = stats.ratio(), "small-gap stage done");
    }

    fn collect_stats(&self, out: &mut Vec<(&'static str, StageStats)>) {
        self.source.collect_stats(out);
        out.push((self.name(), self.stats));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::ScoreMatrix;
    use crate::db::Database;
    use crate::pipeline::testing::{occ, ReplaySource};
    use crate::stats::{GlobalParameters, QueryInformation};
    use crate::util::{protein, Alphabet};

    fn db(seqs: &[&[u8]]) -> Database {
        let mut db = Database::new(Alphabet::Protein);
        for (i, s) in seqs.iter().enumerate() {
            let codes: Vec<u8> = s.iter().map(|&b| protein::to_code(b)).collect();
            db.push(&format!("p{}", i), None, &codes).unwrap();
        }
        db
    }

    fn run(vectorized: bool) -> (Vec<(u32, u32)>, StageStats) {
        let a: &[u8] = b"MKWVTFISLLFLFSSAYSRGVFRRDTHKSEIAHRFKDLGEENFKALVLIAFAQYLQQ";
        // 插入两个残基，使种子右侧需要一个短空位
        let b: &[u8] = b"MKWVTFISLLFLFSSAYSRGGGVFRRDTHKSEIAHRFKDLGEENFKALVLIAFAQYLQQ";
        let c: &[u8] = b"PPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPP";
        let subject = db(&[b, c]);
        let query = db(&[a]);
        let matrix = ScoreMatrix::protein("BLOSUM62").unwrap();
        let (n, len) = subject.forward_stats();
        let params = GlobalParameters::build(&matrix, 11, 1, len as u64, n as u64).unwrap();
        let qi = QueryInformation::new(&params, &query, 10.0);
        let ctx = SearchContext { subject: &subject, query: &query, matrix: &matrix, query_info: &qi, span: 4 };

        let subject_occ: Vec<Occurrence> = (0..10).map(|k| occ(k % 2, 4 + k)).collect();
        let source = ReplaySource::new(vec![(7, subject_occ, vec![occ(0, 8)])]);
        let cfg = SmallGapConfig { gap_open: 11, gap_extend: 1, band_width: 8, window: 32, threshold: 54, vectorized };
        let mut stage = SmallGapStage::new(Box::new(source), &ctx, cfg);
        let mut kept = Vec::new();
        stage.for_each(&CancellationToken::new(), &mut |hit| kept.extend(hit.indexes.iter().copied()));
        (kept, stage.stats)
    }

    #[test]
    fn scalar_and_lanes_keep_the_same_pairs() {
        let (scalar, s1) = run(false);
        let (lanes, s2) = run(true);
        assert_eq!(scalar, lanes);
        assert_eq!(s1, s2);
        assert_eq!(s1.input, 10);
        // 主体 0 上与查询偏移 8 同对角线的种子（偏移 8）必然存活
        assert!(scalar.contains(&(4, 0)));
        // 全 P 的主体序列没有候选能过阈值
        assert!(scalar.iter().all(|&(si, _)| si % 2 == 0));
    }

    #[test]
    fn unknown_sequence_scores_nothing_in_either_mode() {
        let a: &[u8] = b"MKWVTFISLLFLFSSAYSRGVFRRDTHKSEIAHRFKDLGEENFKALVLIAFAQYLQQ";
        let subject = db(&[a]);
        let query = db(&[a]);
        let matrix = ScoreMatrix::protein("BLOSUM62").unwrap();
        let (n, len) = subject.forward_stats();
        let params = GlobalParameters::build(&matrix, 11, 1, len as u64, n as u64).unwrap();
        let qi = QueryInformation::new(&params, &query, 10.0);
        let ctx = SearchContext { subject: &subject, query: &query, matrix: &matrix, query_info: &qi, span: 4 };

        for vectorized in [false, true] {
            let source = ReplaySource::new(vec![(3, vec![occ(5, 8), occ(0, 8)], vec![occ(0, 8)])]);
            let cfg = SmallGapConfig { gap_open: 11, gap_extend: 1, band_width: 8, window: 32, threshold: 54, vectorized };
            let mut stage = SmallGapStage::new(Box::new(source), &ctx, cfg);
            let mut kept = Vec::new();
            stage.for_each(&CancellationToken::new(), &mut |hit| kept.extend(hit.indexes.iter().copied()));
            assert_eq!(kept, vec![(1, 0)], "vectorized = {}", vectorized);
            assert_eq!(stage.stats, StageStats { input: 2, output: 1 });
        }
    }
}
