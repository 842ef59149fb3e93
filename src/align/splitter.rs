use std::fmt::Write as _;

use super::matrix::ScoreMatrix;
use super::semigap::AlignOp;

/// 一段无空位区间：查询起点、主体起点与长度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UngappedRun {
    pub query_start: u32,
    pub subject_start: u32,
    pub len: u32,
}

impl UngappedRun {
    #[inline]
    pub fn diagonal(&self) -> i64 {
        self.query_start as i64 - self.subject_start as i64
    }

    #[inline]
    pub fn query_end(&self) -> u32 {
        self.query_start + self.len - 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitStats {
    pub length: u32,
    pub identities: u32,
    pub positives: u32,
    pub misses: u32,
    pub query_gaps: u32,
    pub subject_gaps: u32,
    pub gap_opens: u32,
    pub runs: Vec<UngappedRun>,
    pub cigar: String,
}

/// Walks an alignment's operations and derives the counts used for
/// filtering and reporting, plus the ungapped runs it decomposes into.
pub fn split(query: &[u8], subject: &[u8], query_start: usize, subject_start: usize, ops: &[AlignOp], matrix: &ScoreMatrix) -> SplitStats {
    let mut st = SplitStats::default();
    let mut qi = query_start;
    let mut sj = subject_start;
    let mut prev: Option<AlignOp> = None;
    let mut run: Option<UngappedRun> = None;

    for &op in ops {
        st.length += 1;
        match op {
            AlignOp::Match => {
                let (a, b) = (query[qi], subject[sj]);
                if a == b {
                    st.identities += 1;
                } else {
                    st.misses += 1;
                }
                if matrix.score(a, b) > 0 {
                    st.positives += 1;
                }
                match run.as_mut() {
                    Some(r) => r.len += 1,
                    None => run = Some(UngappedRun { query_start: qi as u32, subject_start: sj as u32, len: 1 }),
                }
                qi += 1;
                sj += 1;
            }
            AlignOp::Insertion | AlignOp::Deletion => {
                if prev != Some(op) {
                    st.gap_opens += 1;
                }
                if let Some(r) = run.take() {
                    st.runs.push(r);
                }
                if op == AlignOp::Insertion {
                    st.subject_gaps += 1;
                    qi += 1;
                } else {
                    st.query_gaps += 1;
                    sj += 1;
                }
            }
        }
        prev = Some(op);
    }
    if let Some(r) = run {
        st.runs.push(r);
    }
    st.cigar = cigar_string(ops);
    st
}

/// 操作序列按游程压缩为 CIGAR
pub fn cigar_string(ops: &[AlignOp]) -> String {
    let mut out = String::new();
    let mut rest = ops;
    while let Some(&op) = rest.first() {
        let n = rest.iter().take_while(|&&o| o == op).count();
        let _ = write!(out, "{}{}", n, op.as_char());
        rest = &rest[n..];
    }
    out
}

/// 解析 CIGAR；未知操作符（S、H 等）被跳过
pub fn parse_cigar(cigar: &str) -> Vec<(AlignOp, u32)> {
    let mut ops = Vec::new();
    let mut len: u32 = 0;
    for c in cigar.chars() {
        match c.to_digit(10) {
            Some(d) => len = len.saturating_mul(10).saturating_add(d),
            None => {
                if let (Some(op), true) = (AlignOp::from_char(c), len > 0) {
                    ops.push((op, len));
                }
                len = 0;
            }
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::protein;

    fn enc(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| protein::to_code(b)).collect()
    }

    #[test]
    fn counts_and_runs() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        // q: MKV--LAIW   s: MRVGGLAVW  (I/V 为正分错配)
        let q = enc(b"MKVLAIW");
        let s = enc(b"MRVGGLAVW");
        use AlignOp::*;
        let ops = [Match, Match, Match, Deletion, Deletion, Match, Match, Match, Match];
        let st = split(&q, &s, 0, 0, &ops, &m);
        assert_eq!(st.length, 9);
        assert_eq!(st.identities, 5);
        assert_eq!(st.misses, 2);
        // K/R=2, I/V=3 均为正分
        assert_eq!(st.positives, 7);
        assert_eq!(st.query_gaps, 2);
        assert_eq!(st.subject_gaps, 0);
        assert_eq!(st.gap_opens, 1);
        assert_eq!(st.cigar, "3M2D4M");
        assert_eq!(
            st.runs,
            vec![
                UngappedRun { query_start: 0, subject_start: 0, len: 3 },
                UngappedRun { query_start: 3, subject_start: 5, len: 4 },
            ]
        );
        assert_eq!(st.runs[1].diagonal(), -2);
    }

    #[test]
    fn adjacent_gaps_of_different_kind_open_twice() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let q = enc(b"AWC");
        let s = enc(b"AGC");
        use AlignOp::*;
        let st = split(&q, &s, 0, 0, &[Match, Insertion, Deletion, Match], &m);
        assert_eq!(st.gap_opens, 2);
        assert_eq!((st.query_gaps, st.subject_gaps), (1, 1));
        assert_eq!(st.runs.len(), 2);
    }

    #[test]
    fn cigar_run_length() {
        use AlignOp::*;
        let c = cigar_string(&[Match, Match, Insertion, Match, Deletion, Deletion]);
        assert_eq!(c, "2M1I1M2D");
        assert_eq!(parse_cigar(&c), vec![(Match, 2), (Insertion, 1), (Match, 1), (Deletion, 2)]);
        assert_eq!(parse_cigar("3S5M"), vec![(Match, 5)]);
        assert_eq!(cigar_string(&[]), "");
    }
}
