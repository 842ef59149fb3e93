use serde::{Deserialize, Serialize};

use crate::error::{PlastError, Result};
use crate::util::Alphabet;

/// 种子编码空间的上限
const MAX_CODES: u64 = 1 << 26;

/// Exact k-mer seed model: a k-mer of seedable residues maps to a code in
/// `seed_size^span`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedModel {
    pub alphabet: Alphabet,
    pub span: usize,
}

impl SeedModel {
    pub fn new(alphabet: Alphabet, span: usize) -> Result<Self> {
        if span == 0 {
            return Err(PlastError::Config("seed span must be positive".into()));
        }
        let codes = (alphabet.seed_size() as u64).checked_pow(span as u32);
        match codes {
            Some(n) if n <= MAX_CODES => Ok(Self { alphabet, span }),
            _ => Err(PlastError::Config(format!("seed span {} too large for {:?} alphabet", span, alphabet))),
        }
    }

    pub fn code_count(&self) -> usize {
        self.alphabet.seed_size().pow(self.span as u32)
    }

    /// 含不可作种子残基时返回 None
    pub fn encode(&self, kmer: &[u8]) -> Option<u32> {
        if kmer.len() != self.span {
            return None;
        }
        let base = self.alphabet.seed_size() as u32;
        kmer.iter().try_fold(0u32, |code, &c| self.alphabet.is_seedable(c).then(|| code * base + c as u32))
    }

    /// 滚动计算序列上每个合法 k-mer 的 (起始偏移, 编码)
    pub fn for_each_code<F: FnMut(usize, u32)>(&self, seq: &[u8], mut f: F) {
        if seq.len() < self.span {
            return;
        }
        let base = self.alphabet.seed_size() as u32;
        let modulus = self.code_count() as u32 / base;
        let mut code = 0u32;
        let mut valid = 0usize;
        for (i, &c) in seq.iter().enumerate() {
            if !self.alphabet.is_seedable(c) {
                valid = 0;
                code = 0;
                continue;
            }
            code = (code % modulus) * base + c as u32;
            valid += 1;
            if valid >= self.span {
                f(i + 1 - self.span, code);
            }
        }
    }
}
