use std::cmp::Ordering;

use serde::Serialize;

use super::splitter::UngappedRun;

/// 闭区间 [begin, end]，坐标相对于所属序列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    pub begin: u32,
    pub end: u32,
}

impl Range {
    pub fn new(begin: u32, end: u32) -> Self {
        debug_assert!(begin <= end);
        Self { begin, end }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.begin + 1
    }

    #[inline]
    pub fn contains(&self, pos: u32) -> bool {
        self.begin <= pos && pos <= self.end
    }

    pub fn includes(&self, other: &Range) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }
}

/// One reported local similarity between a query and a subject sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alignment {
    pub query_idx: usize,
    pub subject_idx: usize,
    pub query_range: Range,
    pub subject_range: Range,
    pub score: i32,
    pub bitscore: f64,
    pub evalue: f64,
    /// 比对列数（含空位）
    pub length: u32,
    pub identities: u32,
    pub positives: u32,
    pub misses: u32,
    /// 查询一侧的空位列数（对应主体残基）
    pub query_gaps: u32,
    /// 主体一侧的空位列数
    pub subject_gaps: u32,
    pub gap_opens: u32,
    /// 核酸查询的链方向：+1 / -1；蛋白为 None
    pub frame: Option<i8>,
    pub cigar: String,
    /// 组成该比对的无空位区段，用于对角线去重
    #[serde(skip)]
    pub runs: Vec<UngappedRun>,
}

impl Alignment {
    #[inline]
    pub fn diagonal(&self) -> i64 {
        self.query_range.begin as i64 - self.subject_range.begin as i64
    }

    pub fn percent_identity(&self) -> f64 {
        if self.length == 0 {
            0.0
        } else {
            100.0 * self.identities as f64 / self.length as f64
        }
    }

    /// 两条比对在查询与主体两侧都互相重叠
    pub fn overlaps(&self, other: &Alignment) -> bool {
        self.query_range.begin <= other.query_range.end
            && other.query_range.begin <= self.query_range.end
            && self.subject_range.begin <= other.subject_range.end
            && other.subject_range.begin <= self.subject_range.end
    }
}

/// 报告顺序：E 值升序，bit 分降序，再按坐标稳定排序
pub fn canonical_cmp(a: &Alignment, b: &Alignment) -> Ordering {
    a.evalue
        .total_cmp(&b.evalue)
        .then_with(|| b.bitscore.total_cmp(&a.bitscore))
        .then_with(|| a.query_idx.cmp(&b.query_idx))
        .then_with(|| a.subject_idx.cmp(&b.subject_idx))
        .then_with(|| a.query_range.begin.cmp(&b.query_range.begin))
        .then_with(|| a.subject_range.begin.cmp(&b.subject_range.begin))
        .then_with(|| a.query_range.end.cmp(&b.query_range.end))
        .then_with(|| a.subject_range.end.cmp(&b.subject_range.end))
}

#[cfg(test)]
pub(crate) fn sample(query_idx: usize, subject_idx: usize, q: (u32, u32), s: (u32, u32), bitscore: f64) -> Alignment {
    Alignment {
        query_idx,
        subject_idx,
        query_range: Range::new(q.0, q.1),
        subject_range: Range::new(s.0, s.1),
        score: bitscore as i32,
        bitscore,
        evalue: (-bitscore).exp(),
        length: q.1 - q.0 + 1,
        identities: q.1 - q.0 + 1,
        positives: q.1 - q.0 + 1,
        misses: 0,
        query_gaps: 0,
        subject_gaps: 0,
        gap_opens: 0,
        frame: None,
        cigar: format!("{}M", q.1 - q.0 + 1),
        runs: vec![UngappedRun { query_start: q.0, subject_start: s.0, len: q.1 - q.0 + 1 }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_prefers_low_evalue_then_high_bits() {
        let mut v = vec![sample(0, 1, (0, 9), (0, 9), 20.0), sample(0, 0, (0, 9), (0, 9), 40.0)];
        v.sort_by(canonical_cmp);
        assert_eq!(v[0].bitscore, 40.0);
        let mut a = sample(1, 0, (5, 9), (5, 9), 30.0);
        let b = sample(0, 0, (5, 9), (5, 9), 30.0);
        a.evalue = b.evalue;
        assert_eq!(canonical_cmp(&b, &a), Ordering::Less);
    }

    #[test]
    fn ranges_and_overlap() {
        let r = Range::new(3, 7);
        assert_eq!(r.len(), 5);
        assert!(r.contains(7) && !r.contains(8));
        assert!(r.includes(&Range::new(4, 6)));
        let a = sample(0, 0, (0, 10), (0, 10), 10.0);
        let b = sample(0, 0, (10, 20), (10, 20), 10.0);
        let c = sample(0, 0, (11, 20), (0, 5), 10.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(c.diagonal(), 11);
    }
}
