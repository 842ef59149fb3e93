//! 无空位 X-drop 扩展：从种子两端逐残基延伸，累计分值跌破最大值 `xdrop` 即停止该方向。

use super::matrix::ScoreMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UngappedHit {
    pub score: i32,
    pub query_start: usize,
    pub subject_start: usize,
    pub length: usize,
}

impl UngappedHit {
    #[inline]
    pub fn query_end(&self) -> usize {
        self.query_start + self.length - 1
    }
}

/// 种子本身的分值
pub fn seed_score(query: &[u8], subject: &[u8], q_off: usize, s_off: usize, span: usize, matrix: &ScoreMatrix) -> i32 {
    (0..span).map(|k| matrix.score(query[q_off + k], subject[s_off + k])).sum()
}

/// 先向左、再从左侧最高点出发向右延伸
pub fn extend(
    query: &[u8],
    subject: &[u8],
    q_off: usize,
    s_off: usize,
    span: usize,
    matrix: &ScoreMatrix,
    xdrop: i32,
) -> UngappedHit {
    debug_assert!(q_off + span <= query.len() && s_off + span <= subject.len());
    let mut score = seed_score(query, subject, q_off, s_off, span, matrix);
    let mut best = score;

    let mut left = 0usize;
    let max_left = q_off.min(s_off);
    for i in 1..=max_left {
        score += matrix.score(query[q_off - i], subject[s_off - i]);
        if score > best {
            best = score;
            left = i;
        } else if best - score >= xdrop {
            break;
        }
    }

    score = best;
    let mut right = 0usize;
    let max_right = (query.len() - q_off - span).min(subject.len() - s_off - span);
    for i in 1..=max_right {
        let k = span + i - 1;
        score += matrix.score(query[q_off + k], subject[s_off + k]);
        if score > best {
            best = score;
            right = i;
        } else if best - score >= xdrop {
            break;
        }
    }
    debug_assert!((best as i64).abs() < (i32::MAX / 2) as i64);

    UngappedHit {
        score: best,
        query_start: q_off - left,
        subject_start: s_off - left,
        length: left + span + right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::protein;

    fn enc(s: &[u8]) -> Vec<u8> {
        s.iter().map(|&b| protein::to_code(b)).collect()
    }

    #[test]
    fn identical_sequences_extend_to_both_ends() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let q = enc(b"MKVLAAGIWHRTESPL");
        let hit = extend(&q, &q, 6, 6, 4, &m, 16);
        assert_eq!(hit.query_start, 0);
        assert_eq!(hit.length, q.len());
        let total: i32 = q.iter().map(|&c| m.score(c, c)).sum();
        assert_eq!(hit.score, total);
    }

    #[test]
    fn xdrop_stops_extension() {
        let m = ScoreMatrix::nucleotide(1, -3);
        // 种子 AAAA 之后是连续错配
        let mut q: Vec<u8> = vec![0, 0, 0, 0, 1, 1, 1];
        let mut s: Vec<u8> = vec![0, 0, 0, 0, 2, 2, 2];
        q.extend_from_slice(&[0; 10]);
        s.extend_from_slice(&[0; 10]);
        let hit = extend(&q, &s, 0, 0, 4, &m, 5);
        // 第二个错配后 best - score = 6 >= 5
        assert_eq!(hit.length, 4);
        assert_eq!(hit.score, 4);
        // 足够宽松时越过错配
        let hit = extend(&q, &s, 0, 0, 4, &m, 10);
        assert_eq!(hit.length, 17);
        assert_eq!(hit.score, 4 - 9 + 10);
    }

    #[test]
    fn extension_is_deterministic() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let q = enc(b"AAAWWWCCCPPPGGGHHH");
        let s = enc(b"AAKWWWCCCPPYGGGHHH");
        let a = extend(&q, &s, 3, 3, 4, &m, 12);
        let b = extend(&q, &s, 3, 3, 4, &m, 12);
        assert_eq!(a, b);
        assert!(a.score >= seed_score(&q, &s, 3, 3, 4, &m));
    }
}
