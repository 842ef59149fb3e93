/// 核酸内部编码：A=0, C=1, G=2, T=3，其余一律视为 N=4
pub const SIGMA: usize = 5;
/// 参与种子编码的字母数（不含 N）
pub const SEED_SIGMA: usize = 4;
pub const CODE_N: u8 = 4;

#[inline]
pub fn to_code(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b'A' => 0,
        b'C' => 1,
        b'G' => 2,
        b'T' | b'U' => 3,
        _ => CODE_N, // map others to N
    }
}

#[inline]
pub fn from_code(c: u8) -> u8 {
    match c {
        0 => b'A',
        1 => b'C',
        2 => b'G',
        3 => b'T',
        _ => b'N',
    }
}

/// 编码后的互补碱基
#[inline]
pub fn complement_code(c: u8) -> u8 {
    if c < 4 {
        3 - c
    } else {
        CODE_N
    }
}

/// 对编码后的序列求反向互补
pub fn revcomp_codes(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&c| complement_code(c)).collect()
}
