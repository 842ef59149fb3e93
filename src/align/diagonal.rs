//! 按对角线分桶的已知区间索引，用于回答“该种子是否已落在已知比对内”。

/// 桶数的以 2 为底的对数
pub const DIAGONAL_BITS: u32 = 12;
const DIAGONAL_MASK: u64 = (1 << DIAGONAL_BITS) - 1;
/// 对角线为 0 时，按主体序列编号折叠到多个桶，避免所有序列挤在同一个桶
pub const DIAGONAL_FOLD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    query: u32,
    subject: u32,
    diagonal: i64,
    /// 查询坐标闭区间
    start: u32,
    end: u32,
}

#[derive(Debug, Clone)]
pub struct DiagonalIndex {
    buckets: Vec<Vec<Interval>>,
    len: usize,
}

impl Default for DiagonalIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagonalIndex {
    pub fn new() -> Self {
        Self { buckets: vec![Vec::new(); 1 << DIAGONAL_BITS], len: 0 }
    }

    #[inline]
    pub fn bucket(diagonal: i64, subject: u32) -> usize {
        if diagonal == 0 {
            (subject as usize % DIAGONAL_FOLD) & DIAGONAL_MASK as usize
        } else {
            (diagonal as u64 & DIAGONAL_MASK) as usize
        }
    }

    /// 是否有同一序列对、同一对角线上的区间覆盖 `q_off`（允许 `band` 的容差）
    pub fn does_exist(&self, query: u32, subject: u32, q_off: u32, s_off: u32, band: u32) -> bool {
        let diagonal = q_off as i64 - s_off as i64;
        self.buckets[Self::bucket(diagonal, subject)].iter().any(|iv| {
            iv.query == query
                && iv.subject == subject
                && iv.diagonal == diagonal
                && iv.start.saturating_sub(band) <= q_off
                && q_off <= iv.end.saturating_add(band)
        })
    }

    /// 插入查询坐标 [q_start, q_end] 的区间，与重叠区间合并；完全被覆盖时返回 false
    pub fn insert(&mut self, query: u32, subject: u32, q_start: u32, s_start: u32, q_end: u32) -> bool {
        debug_assert!(q_start <= q_end);
        let diagonal = q_start as i64 - s_start as i64;
        let bucket = &mut self.buckets[Self::bucket(diagonal, subject)];
        let mut merged = Interval { query, subject, diagonal, start: q_start, end: q_end };
        let mut absorbed = 0usize;
        let mut k = 0;
        while k < bucket.len() {
            let iv = bucket[k];
            let same = iv.query == query && iv.subject == subject && iv.diagonal == diagonal;
            if same && iv.start <= q_start && q_end <= iv.end {
                return false;
            }
            if same && iv.start <= merged.end.saturating_add(1) && merged.start <= iv.end.saturating_add(1) {
                merged.start = merged.start.min(iv.start);
                merged.end = merged.end.max(iv.end);
                bucket.swap_remove(k);
                absorbed += 1;
                continue;
            }
            k += 1;
        }
        bucket.push(merged);
        self.len = self.len + 1 - absorbed;
        true
    }

    /// 并入另一个索引的全部区间（并行结果合并用）
    pub fn absorb(&mut self, other: DiagonalIndex) {
        for (dst, src) in self.buckets.iter_mut().zip(other.buckets) {
            dst.extend(src);
        }
        self.len += other.len;
    }

    /// 当前区间数
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existence_within_band() {
        let mut idx = DiagonalIndex::new();
        assert!(idx.insert(0, 1, 10, 5, 30));
        assert!(idx.does_exist(0, 1, 20, 15, 0));
        assert!(idx.does_exist(0, 1, 10, 5, 0));
        assert!(!idx.does_exist(0, 1, 31, 26, 0));
        assert!(idx.does_exist(0, 1, 33, 28, 3));
        // 其他对角线、其他序列
        assert!(!idx.does_exist(0, 1, 20, 14, 0));
        assert!(!idx.does_exist(0, 2, 20, 15, 0));
        assert!(!idx.does_exist(1, 1, 20, 15, 0));
    }

    #[test]
    fn insert_merges_and_detects_duplicates() {
        let mut idx = DiagonalIndex::new();
        assert!(idx.insert(0, 0, 0, 0, 10));
        assert!(idx.insert(0, 0, 8, 8, 20));
        assert_eq!(idx.len(), 1);
        assert!(!idx.insert(0, 0, 2, 2, 18));
        assert!(idx.does_exist(0, 0, 20, 20, 0));
        assert!(idx.insert(0, 0, 40, 40, 50));
        assert_eq!(idx.len(), 2);
        // 填补空隙后三段合一
        assert!(idx.insert(0, 0, 21, 21, 39));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn zero_diagonal_is_folded_by_subject() {
        assert_ne!(DiagonalIndex::bucket(0, 1), DiagonalIndex::bucket(0, 2));
        assert_eq!(DiagonalIndex::bucket(0, 3), DiagonalIndex::bucket(0, 3 + DIAGONAL_FOLD as u32));
        assert_eq!(DiagonalIndex::bucket(-1, 0), DIAGONAL_MASK as usize);
        let mut idx = DiagonalIndex::new();
        idx.insert(0, 70, 5, 5, 9);
        assert!(idx.does_exist(0, 70, 7, 7, 0));
        assert!(!idx.does_exist(0, 6, 7, 7, 0));
    }

    #[test]
    fn absorb_keeps_both_sides() {
        let mut a = DiagonalIndex::new();
        let mut b = DiagonalIndex::new();
        a.insert(0, 0, 0, 3, 5);
        b.insert(1, 0, 0, 3, 5);
        a.absorb(b);
        assert_eq!(a.len(), 2);
        assert!(a.does_exist(1, 0, 2, 5, 0));
    }
}
