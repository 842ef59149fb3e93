//! 半全局 X-drop 仿射间隙扩展：从锚点出发向一个方向做 DP，逐行维护存活窗口，
//! 落后当前最高分超过 `xdrop` 的单元被剪除；保留回溯信息以还原比对操作序列。

use super::matrix::ScoreMatrix;

const NEG: i32 = i32::MIN / 4;

const SRC_DIAG: u8 = 0;
const SRC_E: u8 = 1;
const SRC_F: u8 = 2;
const SRC_DEAD: u8 = 3;
const E_EXT: u8 = 1 << 2;
const F_EXT: u8 = 1 << 3;

/// 比对操作；Insertion 只消耗查询残基，Deletion 只消耗主体残基
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignOp {
    Match,
    Insertion,
    Deletion,
}

impl AlignOp {
    pub fn as_char(self) -> char {
        match self {
            AlignOp::Match => 'M',
            AlignOp::Insertion => 'I',
            AlignOp::Deletion => 'D',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'M' | '=' | 'X' => Some(AlignOp::Match),
            'I' => Some(AlignOp::Insertion),
            'D' => Some(AlignOp::Deletion),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GapCosts {
    pub open: i32,
    pub extend: i32,
    pub xdrop: i32,
}

/// 单向扩展结果；`ops` 为回溯顺序（从终点走回锚点）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extension {
    pub score: i32,
    pub query_len: usize,
    pub subject_len: usize,
    pub ops: Vec<AlignOp>,
}

/// 双向扩展后的完整比对
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GappedAlignment {
    pub score: i32,
    pub query_start: usize,
    pub subject_start: usize,
    pub query_end: usize,
    pub subject_end: usize,
    /// 从左到右的操作序列
    pub ops: Vec<AlignOp>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    H,
    E,
    F,
}

/// 可复用的 DP 与回溯缓冲区
#[derive(Default)]
pub struct SemiGapAligner {
    h: Vec<i32>,
    f: Vec<i32>,
    trace: Vec<u8>,
    /// 每行 (回溯起点, 列起点, 列终点)
    rows: Vec<(usize, usize, usize)>,
    rev_query: Vec<u8>,
    rev_subject: Vec<u8>,
}

impl SemiGapAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 (q_anchor, s_anchor) 为锚点双向扩展；锚点残基归入右侧
    pub fn align(
        &mut self,
        query: &[u8],
        subject: &[u8],
        q_anchor: usize,
        s_anchor: usize,
        matrix: &ScoreMatrix,
        costs: &GapCosts,
    ) -> GappedAlignment {
        let mut rq = std::mem::take(&mut self.rev_query);
        let mut rs = std::mem::take(&mut self.rev_subject);
        rq.clear();
        rs.clear();
        rq.extend(query[..q_anchor].iter().rev());
        rs.extend(subject[..s_anchor].iter().rev());
        let left = self.extend(&rq, &rs, matrix, costs);
        self.rev_query = rq;
        self.rev_subject = rs;

        let right = self.extend(&query[q_anchor..], &subject[s_anchor..], matrix, costs);

        // 左侧回溯序即原坐标从左到右的顺序，右侧需反转
        let mut ops = left.ops;
        ops.extend(right.ops.iter().rev());
        let query_start = q_anchor - left.query_len;
        let subject_start = s_anchor - left.subject_len;
        GappedAlignment {
            score: left.score + right.score,
            query_start,
            subject_start,
            query_end: (q_anchor + right.query_len).max(query_start + 1) - 1,
            subject_end: (s_anchor + right.subject_len).max(subject_start + 1) - 1,
            ops,
        }
    }

    /// 单方向扩展：a 为查询侧、b 为主体侧，均从锚点开始
    pub fn extend(&mut self, a: &[u8], b: &[u8], matrix: &ScoreMatrix, costs: &GapCosts) -> Extension {
        let oe = costs.open + costs.extend;
        let ext = costs.extend;
        let xdrop = costs.xdrop;
        let n = b.len();

        self.h.clear();
        self.h.resize(n + 1, NEG);
        self.f.clear();
        self.f.resize(n + 1, NEG);
        self.trace.clear();
        self.rows.clear();

        let mut best = 0i32;
        let mut best_i = 0usize;
        let mut best_j = 0usize;

        // 第 0 行：只能由主体侧空位延伸
        self.h[0] = 0;
        self.trace.push(SRC_DEAD);
        let mut hi = 1usize;
        for j in 1..=n {
            let v = -(costs.open + costs.extend * j as i32);
            if v < -xdrop {
                break;
            }
            self.h[j] = v;
            self.trace.push(SRC_E | if j > 1 { E_EXT } else { 0 });
            hi = j + 1;
        }
        self.rows.push((0, 0, hi));
        let mut lo = 0usize;

        for i in 1..=a.len() {
            let row_start = self.trace.len();
            let qa = a[i - 1];
            let mut diag = NEG;
            let mut h_left = NEG;
            let mut e = NEG;
            let mut new_lo = usize::MAX;
            let mut last_alive = 0usize;
            let mut j = lo;
            while j <= n {
                let in_prev = j < hi;
                if !in_prev && j > hi && h_left == NEG && e == NEG {
                    break;
                }
                let h_up = if in_prev { self.h[j] } else { NEG };
                let f_up = if in_prev { self.f[j] } else { NEG };

                let mut code = 0u8;
                let e_open = h_left - oe;
                let e_ext = e - ext;
                e = if e_ext > e_open {
                    code |= E_EXT;
                    e_ext
                } else {
                    e_open
                };
                let f_open = h_up - oe;
                let f_ext = f_up - ext;
                let mut f_new = if f_ext > f_open {
                    code |= F_EXT;
                    f_ext
                } else {
                    f_open
                };

                let mut hv = if j >= 1 && diag > NEG { diag + matrix.score(qa, b[j - 1]) } else { NEG };
                let mut src = SRC_DIAG;
                if e > hv {
                    hv = e;
                    src = SRC_E;
                }
                if f_new > hv {
                    hv = f_new;
                    src = SRC_F;
                }
                diag = h_up;

                if hv < best - xdrop || hv <= NEG / 2 {
                    hv = NEG;
                    e = NEG;
                    f_new = NEG;
                    src = SRC_DEAD;
                } else {
                    if new_lo == usize::MAX {
                        new_lo = j;
                    }
                    last_alive = j;
                    if hv > best {
                        best = hv;
                        best_i = i;
                        best_j = j;
                    }
                }
                self.h[j] = hv;
                self.f[j] = f_new;
                h_left = hv;
                self.trace.push(code | src);
                j += 1;
            }
            self.rows.push((row_start, lo, j));
            if new_lo == usize::MAX {
                break;
            }
            // 下一行只读取 [new_lo, last_alive] 内的上一行值
            lo = new_lo;
            hi = last_alive + 1;
        }

        let ops = self.traceback(best_i, best_j);
        Extension { score: best, query_len: best_i, subject_len: best_j, ops }
    }

    fn code_at(&self, i: usize, j: usize) -> u8 {
        match self.rows.get(i) {
            Some(&(start, lo, end)) if j >= lo && j < end => self.trace[start + j - lo],
            _ => SRC_DEAD,
        }
    }

    fn traceback(&self, mut i: usize, mut j: usize) -> Vec<AlignOp> {
        let mut ops = Vec::with_capacity(i + j);
        let mut state = State::H;
        while i > 0 || j > 0 {
            let code = self.code_at(i, j);
            match state {
                State::H => match code & 3 {
                    SRC_DIAG => {
                        ops.push(AlignOp::Match);
                        i -= 1;
                        j -= 1;
                    }
                    SRC_E => state = State::E,
                    SRC_F => state = State::F,
                    _ => break,
                },
                State::E => {
                    ops.push(AlignOp::Deletion);
                    j -= 1;
                    if code & E_EXT == 0 {
                        state = State::H;
                    }
                }
                State::F => {
                    ops.push(AlignOp::Insertion);
                    i -= 1;
                    if code & F_EXT == 0 {
                        state = State::H;
                    }
                }
            }
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::protein;

    fn enc(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| protein::to_code(b)).collect()
    }

    fn costs() -> GapCosts {
        GapCosts { open: 11, extend: 1, xdrop: 65 }
    }

    fn consumed(ops: &[AlignOp]) -> (usize, usize) {
        ops.iter().fold((0, 0), |(q, s), op| match op {
            AlignOp::Match => (q + 1, s + 1),
            AlignOp::Insertion => (q + 1, s),
            AlignOp::Deletion => (q, s + 1),
        })
    }

    #[test]
    fn self_alignment_is_full_length() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let q = enc(b"MKVLAAGIWHRTESPLKKQWNNMDCFY");
        let mut al = SemiGapAligner::new();
        let r = al.align(&q, &q, 13, 13, &m, &costs());
        let total: i32 = q.iter().map(|&c| m.score(c, c)).sum();
        assert_eq!(r.score, total);
        assert_eq!((r.query_start, r.query_end), (0, q.len() - 1));
        assert_eq!(r.ops.len(), q.len());
        assert!(r.ops.iter().all(|&o| o == AlignOp::Match));
    }

    #[test]
    fn insertion_is_recovered() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let s = enc(b"WWWWCCCCHHHHYYYYWWWWCCCCHHHH");
        let q = enc(b"WWWWCCCCHHHHGGYYYYWWWWCCCCHHHH");
        let mut al = SemiGapAligner::new();
        let r = al.align(&q, &s, 2, 2, &m, &costs());
        assert_eq!(r.query_end, q.len() - 1);
        assert_eq!(r.subject_end, s.len() - 1);
        let ins = r.ops.iter().filter(|&&o| o == AlignOp::Insertion).count();
        assert_eq!(ins, 2);
        assert_eq!(consumed(&r.ops), (q.len(), s.len()));
        // 28 个匹配减去一次长度为 2 的空位
        let matched: i32 = s.iter().map(|&c| m.score(c, c)).sum();
        assert_eq!(r.score, matched - 13);
    }

    #[test]
    fn deletion_on_the_left_side() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let s = enc(b"WWWWCCCCHHHPHYYYYWWWW");
        let q = enc(b"WWWWCCCCHHHHYYYYWWWW");
        let mut al = SemiGapAligner::new();
        let r = al.align(&q, &s, 18, 19, &m, &costs());
        assert_eq!((r.query_start, r.subject_start), (0, 0));
        assert_eq!(consumed(&r.ops), (q.len(), s.len()));
        assert_eq!(r.ops.iter().filter(|&&o| o == AlignOp::Deletion).count(), 1);
    }

    #[test]
    fn xdrop_prunes_unrelated_tail() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let q = enc(b"WWWWCCCCPPPPPPPPPPPPPPPPPPPP");
        let s = enc(b"WWWWCCCCGGGGGGGGGGGGGGGGGGGG");
        let mut al = SemiGapAligner::new();
        let r = al.extend(&q, &s, &m, &GapCosts { open: 11, extend: 1, xdrop: 20 });
        assert_eq!((r.query_len, r.subject_len), (8, 8));
        assert_eq!(r.score, 4 * 11 + 4 * 9);
    }

    #[test]
    fn empty_sides() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let mut al = SemiGapAligner::new();
        let r = al.extend(&[], &[], &m, &costs());
        assert_eq!(r, Extension::default());
        let q = enc(b"MKV");
        let r = al.align(&q, &q, 0, 0, &m, &costs());
        assert_eq!(r.query_start, 0);
        assert_eq!(r.query_end, 2);
    }
}
