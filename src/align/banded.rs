use super::matrix::ScoreMatrix;

/// 窗口越过序列末端时使用的填充残基
pub const PAD: u8 = u8::MAX;
/// 与填充残基比对的分值，必须低于窗口内可能累积的最大正分
pub const PAD_SCORE: i32 = -512;
/// 所有单元的下限；标量与 i16 通道实现共用，保证二者逐位一致
pub const FLOOR: i32 = -16384;
/// 一次向量化计算的序列对数
pub const LANES: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmallGapParams {
    pub gap_open: i32,
    pub gap_extend: i32,
    pub band_width: usize,
    pub window: usize,
}

impl SmallGapParams {
    /// i16 通道不溢出的条件：窗口内最大累计分与各类罚分都远离 i16 边界
    pub fn fits_i16(&self, matrix: &ScoreMatrix) -> bool {
        let max_gain = matrix.max_score().max(0) as i64 * self.window as i64;
        let gap = (self.gap_open + self.gap_extend) as i64;
        max_gain < (-PAD_SCORE) as i64 && gap < 1024 && matrix.min_score() > PAD_SCORE
    }
}

#[inline]
fn pair_score(matrix: &ScoreMatrix, a: u8, b: u8) -> i32 {
    if a == PAD || b == PAD {
        PAD_SCORE
    } else {
        matrix.score(a, b)
    }
}

/// 从 `from` 开始向右取定长窗口，越界部分填 PAD
pub fn right_window(seq: &[u8], from: usize, window: usize, out: &mut [u8]) {
    debug_assert_eq!(out.len(), window);
    for (k, slot) in out.iter_mut().enumerate() {
        *slot = seq.get(from + k).copied().unwrap_or(PAD);
    }
}

/// 从 `from` 左侧逆序取定长窗口（第一个元素为 seq[from-1]）
pub fn left_window(seq: &[u8], from: usize, window: usize, out: &mut [u8]) {
    debug_assert_eq!(out.len(), window);
    for (k, slot) in out.iter_mut().enumerate() {
        *slot = if k < from { seq[from - 1 - k] } else { PAD };
    }
}

/// DP 工作缓冲区，可跨调用复用
#[derive(Default)]
pub struct BandBuffer {
    h: Vec<i32>,
    f: Vec<i32>,
    lane_h: Vec<[i16; LANES]>,
    lane_f: Vec<[i16; LANES]>,
}

impl BandBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[inline]
fn boundary(p: &SmallGapParams, k: usize) -> i32 {
    if k == 0 {
        0
    } else if k <= p.band_width {
        (-(p.gap_open + p.gap_extend * k as i32)).max(FLOOR)
    } else {
        FLOOR
    }
}

/// 锚定在原点的带状仿射间隙扩展，返回最佳得分（空扩展计 0）
pub fn anchored_band_score(qwin: &[u8], swin: &[u8], matrix: &ScoreMatrix, p: &SmallGapParams, buf: &mut BandBuffer) -> i32 {
    let w = qwin.len().min(swin.len());
    if w == 0 {
        return 0;
    }
    let oe = p.gap_open + p.gap_extend;
    let ext = p.gap_extend;
    let band = p.band_width;

    buf.h.clear();
    buf.f.clear();
    buf.h.extend((0..=w).map(|j| boundary(p, j)));
    buf.f.resize(w + 1, FLOOR);
    let h = &mut buf.h;
    let f = &mut buf.f;

    let mut best = 0i32;
    for i in 1..=w {
        let jlo = if i > band { i - band } else { 1 };
        let jhi = (i + band).min(w);
        if jlo > jhi {
            break;
        }
        let mut diag = h[jlo - 1];
        let mut h_left = if jlo == 1 { boundary(p, i) } else { FLOOR };
        if jlo == 1 {
            h[0] = h_left;
        }
        let mut e = FLOOR;
        let qa = qwin[i - 1];
        for j in jlo..=jhi {
            e = (h_left - oe).max(e - ext);
            f[j] = (h[j] - oe).max(f[j] - ext);
            let hv = (diag + pair_score(matrix, qa, swin[j - 1])).max(e).max(f[j]).max(FLOOR);
            diag = h[j];
            h[j] = hv;
            h_left = hv;
            if hv > best {
                best = hv;
            }
        }
    }
    best
}

/// 与 `anchored_band_score` 相同的递推，8 对序列打包在 i16 通道中同时计算。
/// 调用方需保证 `SmallGapParams::fits_i16`。
pub fn anchored_band_score_lanes(
    qwins: &[&[u8]; LANES],
    swins: &[&[u8]; LANES],
    matrix: &ScoreMatrix,
    p: &SmallGapParams,
    buf: &mut BandBuffer,
) -> [i32; LANES] {
    let w = qwins.iter().chain(swins.iter()).map(|s| s.len()).min().unwrap_or(0);
    if w == 0 {
        return [0; LANES];
    }
    let oe = (p.gap_open + p.gap_extend) as i16;
    let ext = p.gap_extend as i16;
    let floor = FLOOR as i16;
    let band = p.band_width;

    buf.lane_h.clear();
    buf.lane_f.clear();
    buf.lane_h.extend((0..=w).map(|j| [boundary(p, j) as i16; LANES]));
    buf.lane_f.resize(w + 1, [floor; LANES]);
    let h = &mut buf.lane_h;
    let f = &mut buf.lane_f;

    let mut best = [0i16; LANES];
    let mut subst = [0i16; LANES];
    for i in 1..=w {
        let jlo = if i > band { i - band } else { 1 };
        let jhi = (i + band).min(w);
        if jlo > jhi {
            break;
        }
        let mut diag = h[jlo - 1];
        let mut h_left = if jlo == 1 { [boundary(p, i) as i16; LANES] } else { [floor; LANES] };
        if jlo == 1 {
            h[0] = h_left;
        }
        let mut e = [floor; LANES];
        for j in jlo..=jhi {
            for l in 0..LANES {
                subst[l] = pair_score(matrix, qwins[l][i - 1], swins[l][j - 1]) as i16;
            }
            let up = h[j];
            let fj = &mut f[j];
            let mut hv = [0i16; LANES];
            for l in 0..LANES {
                e[l] = h_left[l].saturating_sub(oe).max(e[l].saturating_sub(ext));
                fj[l] = up[l].saturating_sub(oe).max(fj[l].saturating_sub(ext));
                hv[l] = diag[l].saturating_add(subst[l]).max(e[l]).max(fj[l]).max(floor);
                best[l] = best[l].max(hv[l]);
            }
            diag = up;
            h[j] = hv;
            h_left = hv;
        }
    }
    best.map(i32::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::protein;
    use proptest::prelude::*;

    fn params() -> SmallGapParams {
        SmallGapParams { gap_open: 11, gap_extend: 1, band_width: 8, window: 32 }
    }

    fn enc(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| protein::to_code(b)).collect()
    }

    #[test]
    fn identical_windows_score_the_diagonal() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let q = enc(b"MKVLAAGIWHRT");
        let mut buf = BandBuffer::new();
        let expected: i32 = q.iter().map(|&c| m.score(c, c)).sum();
        assert_eq!(anchored_band_score(&q, &q, &m, &params(), &mut buf), expected);
    }

    #[test]
    fn gap_is_bridged_when_worthwhile() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let s = enc(b"WWWWCCCCWWWWCCCCHHHH");
        let q = enc(b"WWWWCCCCGWWWWCCCCHHH");
        let mut buf = BandBuffer::new();
        let score = anchored_band_score(&q, &s, &m, &params(), &mut buf);
        // 8 个匹配 + 1 个开放空位后继续匹配，应高于纯对角线前缀
        let prefix: i32 = q[..8].iter().map(|&c| m.score(c, c)).sum();
        assert!(score > prefix);
    }

    #[test]
    fn padded_tail_never_improves_score() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let seq = enc(b"MKV");
        let mut q = vec![0u8; 16];
        right_window(&seq, 0, 16, &mut q);
        assert_eq!(&q[3..], &[PAD; 13]);
        let mut buf = BandBuffer::new();
        let expected: i32 = seq.iter().map(|&c| m.score(c, c)).sum();
        assert_eq!(anchored_band_score(&q, &q, &m, &params(), &mut buf), expected);
    }

    #[test]
    fn left_window_is_reversed() {
        let seq = [1u8, 2, 3, 4];
        let mut out = [0u8; 6];
        left_window(&seq, 3, 6, &mut out);
        assert_eq!(out, [3, 2, 1, PAD, PAD, PAD]);
    }

    proptest! {
        #[test]
        fn lanes_match_scalar(pairs in proptest::collection::vec(
            (proptest::collection::vec(0u8..24, 0..40), proptest::collection::vec(0u8..24, 0..40)),
            LANES,
        )) {
            let m = ScoreMatrix::protein("BLOSUM62").unwrap();
            let p = params();
            prop_assume!(p.fits_i16(&m));
            let mut qwins = vec![vec![0u8; p.window]; LANES];
            let mut swins = vec![vec![0u8; p.window]; LANES];
            for (l, (q, s)) in pairs.iter().enumerate() {
                right_window(q, 0, p.window, &mut qwins[l]);
                right_window(s, 0, p.window, &mut swins[l]);
            }
            let mut buf = BandBuffer::new();
            let qrefs: [&[u8]; LANES] = std::array::from_fn(|l| qwins[l].as_slice());
            let srefs: [&[u8]; LANES] = std::array::from_fn(|l| swins[l].as_slice());
            let lanes = anchored_band_score_lanes(&qrefs, &srefs, &m, &p, &mut buf);
            for l in 0..LANES {
                let scalar = anchored_band_score(&qwins[l], &swins[l], &m, &p, &mut buf);
                prop_assert_eq!(lanes[l], scalar);
            }
        }
    }
}
