//! Karlin-Altschul 参数：内置查表 + 无空位参数的现场求解。

use crate::align::matrix::ScoreMatrix;

/// One row of a Karlin-Altschul table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KarlinEntry {
    pub open: i32,
    pub extend: i32,
    pub lambda: f64,
    pub k: f64,
    pub h: f64,
    pub alpha: f64,
    pub beta: f64,
}

const fn entry(open: i32, extend: i32, lambda: f64, k: f64, h: f64, alpha: f64, beta: f64) -> KarlinEntry {
    KarlinEntry { open, extend, lambda, k, h, alpha, beta }
}

/// 无空位条目在蛋白表中以 (MAX, MAX) 标记
pub const UNGAPPED: i32 = i32::MAX;

const BLOSUM62_TABLE: &[KarlinEntry] = &[
    entry(UNGAPPED, UNGAPPED, 0.3176, 0.134, 0.4012, 0.7916, -3.2),
    entry(11, 2, 0.297, 0.082, 0.27, 1.1, -10.0),
    entry(10, 2, 0.291, 0.075, 0.23, 1.3, -15.0),
    entry(9, 2, 0.279, 0.058, 0.19, 1.5, -19.0),
    entry(8, 2, 0.264, 0.045, 0.15, 1.8, -26.0),
    entry(7, 2, 0.239, 0.027, 0.10, 2.5, -46.0),
    entry(6, 2, 0.201, 0.012, 0.061, 3.3, -58.0),
    entry(13, 1, 0.292, 0.071, 0.23, 1.2, -11.0),
    entry(12, 1, 0.283, 0.059, 0.19, 1.5, -19.0),
    entry(11, 1, 0.267, 0.041, 0.14, 1.9, -30.0),
    entry(10, 1, 0.243, 0.024, 0.10, 2.5, -44.0),
    entry(9, 1, 0.206, 0.010, 0.052, 4.0, -87.0),
];

const BLOSUM45_TABLE: &[KarlinEntry] = &[
    entry(UNGAPPED, UNGAPPED, 0.2291, 0.0924, 0.2514, 0.9113, -5.7),
    entry(13, 3, 0.207, 0.049, 0.14, 1.5, -22.0),
    entry(12, 3, 0.199, 0.039, 0.11, 1.8, -34.0),
    entry(11, 3, 0.190, 0.031, 0.095, 2.0, -38.0),
    entry(10, 3, 0.179, 0.023, 0.075, 2.4, -51.0),
    entry(16, 2, 0.210, 0.051, 0.14, 1.5, -24.0),
    entry(15, 2, 0.203, 0.041, 0.12, 1.7, -31.0),
    entry(14, 2, 0.195, 0.032, 0.10, 1.9, -36.0),
    entry(13, 2, 0.185, 0.024, 0.084, 2.2, -45.0),
    entry(12, 2, 0.171, 0.016, 0.061, 2.8, -65.0),
    entry(19, 1, 0.205, 0.040, 0.11, 1.9, -43.0),
    entry(18, 1, 0.198, 0.032, 0.10, 2.0, -43.0),
    entry(17, 1, 0.189, 0.024, 0.079, 2.4, -57.0),
    entry(16, 1, 0.176, 0.016, 0.063, 2.8, -67.0),
];

// 核酸表按 (reward, |penalty|) 分组，只收录有空位条目
const BLASTN_1_4: &[KarlinEntry] = &[
    entry(1, 2, 1.36, 0.67, 1.2, 1.1, 0.0),
    entry(0, 2, 1.26, 0.43, 0.90, 1.4, -1.0),
    entry(2, 1, 1.35, 0.61, 1.1, 1.2, -1.0),
    entry(1, 1, 1.22, 0.35, 0.72, 1.7, -3.0),
];

const BLASTN_1_3: &[KarlinEntry] = &[
    entry(2, 2, 1.37, 0.70, 1.2, 1.1, 0.0),
    entry(1, 2, 1.35, 0.64, 1.1, 1.2, -1.0),
    entry(0, 2, 1.25, 0.42, 0.83, 1.5, -2.0),
    entry(2, 1, 1.34, 0.60, 1.1, 1.2, -1.0),
    entry(1, 1, 1.21, 0.34, 0.71, 1.7, -2.0),
];

const BLASTN_1_2: &[KarlinEntry] = &[
    entry(2, 2, 1.33, 0.62, 1.1, 1.2, 0.0),
    entry(1, 2, 1.30, 0.52, 0.93, 1.4, -2.0),
    entry(0, 2, 1.19, 0.34, 0.66, 1.8, -3.0),
    entry(3, 1, 1.32, 0.57, 1.0, 1.3, -1.0),
    entry(2, 1, 1.29, 0.49, 0.92, 1.4, -1.0),
    entry(1, 1, 1.14, 0.26, 0.52, 2.2, -5.0),
];

const BLASTN_2_3: &[KarlinEntry] = &[
    entry(4, 4, 0.63, 0.42, 0.84, 0.75, -2.0),
    entry(2, 4, 0.615, 0.37, 0.72, 0.85, -3.0),
    entry(0, 4, 0.55, 0.21, 0.46, 1.2, -5.0),
    entry(3, 3, 0.615, 0.37, 0.68, 0.9, -3.0),
    entry(6, 2, 0.63, 0.42, 0.84, 0.75, -2.0),
    entry(5, 2, 0.625, 0.41, 0.78, 0.8, -2.0),
    entry(4, 2, 0.61, 0.35, 0.68, 0.9, -3.0),
    entry(2, 2, 0.515, 0.14, 0.33, 1.55, -9.0),
];

const BLASTN_2_5: &[KarlinEntry] = &[
    entry(2, 4, 0.67, 0.59, 1.1, 0.6, -1.0),
    entry(0, 4, 0.62, 0.39, 0.78, 0.8, -2.0),
    entry(4, 2, 0.67, 0.61, 1.0, 0.65, -2.0),
    entry(2, 2, 0.56, 0.32, 0.59, 0.95, -4.0),
];

const BLASTN_1_1: &[KarlinEntry] = &[
    entry(3, 2, 1.09, 0.31, 0.55, 2.0, -2.0),
    entry(2, 2, 1.07, 0.27, 0.49, 2.2, -3.0),
    entry(1, 2, 1.02, 0.21, 0.36, 2.8, -6.0),
    entry(0, 2, 0.80, 0.064, 0.17, 4.8, -16.0),
    entry(4, 1, 1.08, 0.28, 0.54, 2.0, -2.0),
    entry(3, 1, 1.06, 0.25, 0.46, 2.3, -4.0),
    entry(2, 1, 0.99, 0.17, 0.30, 3.3, -10.0),
];

/// 蛋白矩阵对应的整张表（首行为无空位参数）
pub fn protein_table(matrix: &str) -> Option<&'static [KarlinEntry]> {
    match matrix.to_ascii_uppercase().as_str() {
        "BLOSUM62" => Some(BLOSUM62_TABLE),
        "BLOSUM45" => Some(BLOSUM45_TABLE),
        _ => None,
    }
}

pub fn nucleotide_table(reward: i32, penalty: i32) -> Option<&'static [KarlinEntry]> {
    match (reward, penalty.abs()) {
        (1, 4) => Some(BLASTN_1_4),
        (1, 3) => Some(BLASTN_1_3),
        (1, 2) => Some(BLASTN_1_2),
        (2, 3) => Some(BLASTN_2_3),
        (2, 5) => Some(BLASTN_2_5),
        (1, 1) => Some(BLASTN_1_1),
        _ => None,
    }
}

pub fn find_entry(table: &[KarlinEntry], open: i32, extend: i32) -> Option<KarlinEntry> {
    table.iter().copied().find(|e| e.open == open && e.extend == extend)
}

const LAMBDA_TOLERANCE: f64 = 1e-10;
const LAMBDA_MAX_ITER: usize = 100;
const K_SUMLIMIT: f64 = 1e-4;
const K_ITER_MAX: usize = 100;

/// 打分分布：score 从 `low` 到 `high` 的概率
#[derive(Debug, Clone)]
pub struct ScoreProfile {
    pub low: i32,
    pub high: i32,
    probs: Vec<f64>,
}

impl ScoreProfile {
    /// 由矩阵与两侧残基频率构造分值分布；频率数组覆盖可作种子的标准残基
    pub fn from_matrix(matrix: &ScoreMatrix, query_freqs: &[f64], subject_freqs: &[f64]) -> Option<Self> {
        let n = matrix.alphabet().seed_size().min(query_freqs.len()).min(subject_freqs.len());
        let (lo, hi) = matrix.standard_range();
        let mut probs = vec![0.0; (hi - lo + 1) as usize];
        for (i, &fq) in query_freqs.iter().take(n).enumerate() {
            for (j, &fs) in subject_freqs.iter().take(n).enumerate() {
                let s = matrix.score(i as u8, j as u8);
                probs[(s - lo) as usize] += fq * fs;
            }
        }
        Self::from_probs(lo, probs)
    }

    /// 去掉两端零概率后的分布；总概率为零时返回 None
    pub fn from_probs(low: i32, probs: Vec<f64>) -> Option<Self> {
        let first = probs.iter().position(|&p| p > 0.0)?;
        let last = probs.iter().rposition(|&p| p > 0.0)?;
        let total: f64 = probs[first..=last].iter().sum();
        let probs: Vec<f64> = probs[first..=last].iter().map(|p| p / total).collect();
        Some(Self { low: low + first as i32, high: low + last as i32, probs })
    }

    #[inline]
    pub fn prob(&self, score: i32) -> f64 {
        if score < self.low || score > self.high {
            0.0
        } else {
            self.probs[(score - self.low) as usize]
        }
    }

    pub fn mean(&self) -> f64 {
        (self.low..=self.high).map(|s| s as f64 * self.prob(s)).sum()
    }

    fn gcd(&self) -> i32 {
        let mut d = -self.low;
        for s in self.low + 1..=self.high {
            if d <= 1 {
                break;
            }
            if self.prob(s) != 0.0 {
                d = gcd(d, s - self.low);
            }
        }
        d.max(1)
    }

    /// Σ p(s)·e^{λs} - 1 及其导数
    fn phi(&self, lambda: f64) -> (f64, f64) {
        let mut f = -1.0;
        let mut df = 0.0;
        for (i, &p) in self.probs.iter().enumerate() {
            let s = (self.low + i as i32) as f64;
            let t = p * (lambda * s).exp();
            f += t;
            df += s * t;
        }
        (f, df)
    }
}

fn gcd(mut a: i32, mut b: i32) -> i32 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// 期望为负且存在正分时求 λ>0，使 Σ p(s)e^{λs} = 1；Newton 迭代加二分保护
pub fn solve_lambda(profile: &ScoreProfile) -> Option<f64> {
    if profile.mean() >= 0.0 || profile.high <= 0 {
        return None;
    }
    let mut lo = 0.0;
    let mut hi = 0.5;
    while profile.phi(hi).0 <= 0.0 {
        hi *= 2.0;
        if hi > 1e3 {
            return None;
        }
    }
    let mut x = hi;
    for _ in 0..LAMBDA_MAX_ITER {
        let (f, df) = profile.phi(x);
        if f > 0.0 {
            hi = x;
        } else {
            lo = x;
        }
        let newton = if df > 0.0 { x - f / df } else { f64::NAN };
        let next = if newton.is_finite() && newton > lo && newton < hi { newton } else { (lo + hi) / 2.0 };
        if (next - x).abs() < LAMBDA_TOLERANCE * x.max(1.0) || hi - lo < LAMBDA_TOLERANCE {
            return Some(next);
        }
        x = next;
    }
    Some(x)
}

/// 相对熵 H = λ Σ s·p(s)·e^{λs}
pub fn entropy(profile: &ScoreProfile, lambda: f64) -> f64 {
    lambda * profile.phi(lambda).1
}

/// K 参数：分值以最大公约数约化后按级数求和，两种特例用闭式
pub fn k_param(profile: &ScoreProfile, lambda: f64, h: f64) -> Option<f64> {
    if lambda <= 0.0 || h <= 0.0 || profile.mean() >= 0.0 {
        return None;
    }
    let d = profile.gcd();
    let low = profile.low / d;
    let high = profile.high / d;
    let lambda = lambda * d as f64;
    let h_over_lambda = h / lambda;

    if low == -1 && high == 1 {
        let pl = profile.prob(-d);
        let ph = profile.prob(d);
        return Some((pl - ph) * (pl - ph) / pl);
    }
    if low == -1 || high == 1 {
        let first = if high != 1 {
            let mean = profile.mean() / d as f64;
            mean * mean / h_over_lambda
        } else {
            h_over_lambda
        };
        return Some(first * (1.0 - (-lambda).exp()));
    }

    let range = (high - low) as usize;
    let step: Vec<f64> = (0..=range).map(|i| profile.prob((low + i as i32) * d)).collect();
    let mut dist = vec![1.0];
    let mut dist_low = 0i32;
    let mut outer = 0.0;
    for iter in 1..=K_ITER_MAX {
        let mut next = vec![0.0; dist.len() + range];
        for (i, &a) in dist.iter().enumerate() {
            if a == 0.0 {
                continue;
            }
            for (j, &b) in step.iter().enumerate() {
                next[i + j] += a * b;
            }
        }
        dist = next;
        dist_low += low;

        let mut inner = 0.0;
        for (i, &p) in dist.iter().enumerate() {
            let s = dist_low + i as i32;
            inner += if s < 0 { p * (lambda * s as f64).exp() } else { p };
        }
        inner /= iter as f64;
        outer += inner;
        if inner <= K_SUMLIMIT {
            break;
        }
    }
    let k = -(-2.0 * outer).exp() / (h_over_lambda * (-lambda).exp_m1());
    (k > 0.0 && k.is_finite()).then_some(k)
}

/// Ungapped (λ, K, H) for a score distribution.
pub fn ungapped_params(profile: &ScoreProfile) -> Option<(f64, f64, f64)> {
    let lambda = solve_lambda(profile)?;
    let h = entropy(profile, lambda);
    let k = k_param(profile, lambda, h)?;
    Some((lambda, k, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::protein;

    #[test]
    fn blosum62_ungapped_from_background() {
        let m = ScoreMatrix::protein("BLOSUM62").unwrap();
        let bg = protein::BACKGROUND_FREQUENCIES;
        let profile = ScoreProfile::from_matrix(&m, &bg, &bg).unwrap();
        assert!(profile.mean() < 0.0);
        let (lambda, k, h) = ungapped_params(&profile).unwrap();
        assert!((lambda - 0.3176).abs() < 3e-3, "lambda {}", lambda);
        assert!((k - 0.134).abs() < 0.02, "k {}", k);
        assert!((h - 0.4012).abs() < 0.05, "h {}", h);
    }

    #[test]
    fn nucleotide_closed_form_k() {
        let m = ScoreMatrix::nucleotide(1, -3);
        let uniform = [0.25; 4];
        let profile = ScoreProfile::from_matrix(&m, &uniform, &uniform).unwrap();
        let (lambda, k, h) = ungapped_params(&profile).unwrap();
        assert!((lambda - 1.374).abs() < 5e-3, "lambda {}", lambda);
        assert!((h - 1.31).abs() < 0.02, "h {}", h);
        assert!((k - 0.711).abs() < 0.02, "k {}", k);
    }

    #[test]
    fn positive_mean_has_no_lambda() {
        let profile = ScoreProfile::from_probs(-1, vec![0.2, 0.0, 0.8]).unwrap();
        assert!(solve_lambda(&profile).is_none());
    }

    #[test]
    fn table_lookup() {
        let t = protein_table("blosum62").unwrap();
        let e = find_entry(t, 11, 1).unwrap();
        assert_eq!((e.lambda, e.k, e.alpha, e.beta), (0.267, 0.041, 1.9, -30.0));
        assert!(find_entry(t, 3, 3).is_none());
        assert!(nucleotide_table(2, -3).is_some());
        assert!(nucleotide_table(7, -9).is_none());
    }
}
