/// 蛋白内部编码，顺序与替换矩阵一致：A R N D C Q E G H I L K M F P S T W Y V B Z X *
pub const LETTERS: &[u8; 24] = b"ARNDCQEGHILKMFPSTWYVBZX*";
pub const SIGMA: usize = 24;
/// 前 20 个为标准氨基酸，可参与种子编码
pub const SEED_SIGMA: usize = 20;
pub const CODE_X: u8 = 22;
pub const CODE_STOP: u8 = 23;

/// Robinson & Robinson 背景频率（标准 20 种氨基酸，矩阵顺序）
pub const BACKGROUND_FREQUENCIES: [f64; SEED_SIGMA] = [
    0.07805, 0.05129, 0.04487, 0.05364, 0.01925, 0.04264, 0.06295, 0.07377, 0.02199, 0.05142,
    0.09019, 0.05744, 0.02243, 0.03856, 0.05203, 0.07120, 0.05841, 0.01330, 0.03216, 0.06441,
];

#[inline]
pub fn to_code(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b'A' => 0,
        b'R' => 1,
        b'N' => 2,
        b'D' => 3,
        b'C' => 4,
        b'Q' => 5,
        b'E' => 6,
        b'G' => 7,
        b'H' => 8,
        b'I' => 9,
        b'L' => 10,
        b'K' => 11,
        b'M' => 12,
        b'F' => 13,
        b'P' => 14,
        b'S' => 15,
        b'T' => 16,
        b'W' => 17,
        b'Y' => 18,
        b'V' => 19,
        b'B' => 20,
        b'Z' => 21,
        b'*' => CODE_STOP,
        // U/O/J 等罕见字母按未知处理
        _ => CODE_X,
    }
}

#[inline]
pub fn from_code(c: u8) -> u8 {
    LETTERS.get(c as usize).copied().unwrap_or(b'X')
}

/// 统计编码序列中标准氨基酸的组成（归一化频率）
pub fn composition(seq: &[u8]) -> [f64; SEED_SIGMA] {
    let mut counts = [0usize; SEED_SIGMA];
    let mut total = 0usize;
    for &c in seq {
        if (c as usize) < SEED_SIGMA {
            counts[c as usize] += 1;
            total += 1;
        }
    }
    let mut freqs = [0.0; SEED_SIGMA];
    if total == 0 {
        return freqs;
    }
    for (f, &n) in freqs.iter_mut().zip(counts.iter()) {
        *f = n as f64 / total as f64;
    }
    freqs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_follows_matrix_order() {
        for (i, &b) in LETTERS.iter().enumerate() {
            assert_eq!(to_code(b) as usize, i);
            assert_eq!(from_code(i as u8), b);
        }
        assert_eq!(to_code(b'u'), CODE_X);
    }

    #[test]
    fn background_frequencies_sum_to_one() {
        let sum: f64 = BACKGROUND_FREQUENCIES.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn composition_ignores_ambiguous_residues() {
        let seq: Vec<u8> = b"AAXC".iter().map(|&b| to_code(b)).collect();
        let comp = composition(&seq);
        assert!((comp[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((comp[4] - 1.0 / 3.0).abs() < 1e-12);
    }
}
