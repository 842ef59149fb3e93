use serde::{Deserialize, Serialize};

use crate::error::{PlastError, Result};
use crate::util::Alphabet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Program {
    /// 蛋白对蛋白
    Plastp,
    /// 核酸对核酸
    Plastn,
}

impl Program {
    pub fn alphabet(self) -> Alphabet {
        match self {
            Program::Plastp => Alphabet::Protein,
            Program::Plastn => Alphabet::Nucleotide,
        }
    }
}

/// 种子码在并行子源之间的分配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedPartition {
    /// 按频次排序后轮流分发
    Static,
    /// 子源从共享区间迭代器按块领取
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrandOption {
    Plus,
    Both,
}

/// Every tunable of a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub program: Program,
    pub matrix: String,
    pub reward: i32,
    pub penalty: i32,
    pub gap_open: i32,
    pub gap_extend: i32,
    pub seed_span: usize,
    pub evalue: f64,
    pub ungap_xdrop: i32,
    pub ungap_threshold: i32,
    pub small_gap: bool,
    pub small_gap_band: usize,
    pub small_gap_window: usize,
    pub small_gap_threshold: i32,
    pub vectorized: bool,
    pub gapped_xdrop_bits: f64,
    pub composition: bool,
    pub max_hits_per_query: Option<usize>,
    pub threads: usize,
    /// 0 表示与线程数相同
    pub splits: usize,
    pub partition: SeedPartition,
    pub strand: StrandOption,
}

impl SearchOptions {
    pub fn protein() -> Self {
        Self {
            program: Program::Plastp,
            matrix: "BLOSUM62".to_string(),
            reward: 1,
            penalty: -1,
            gap_open: 11,
            gap_extend: 1,
            seed_span: 4,
            evalue: 10.0,
            ungap_xdrop: 16,
            ungap_threshold: 38,
            small_gap: true,
            small_gap_band: 8,
            small_gap_window: 32,
            small_gap_threshold: 54,
            vectorized: true,
            gapped_xdrop_bits: 25.0,
            composition: false,
            max_hits_per_query: None,
            threads: 1,
            splits: 0,
            partition: SeedPartition::Static,
            strand: StrandOption::Plus,
        }
    }

    pub fn nucleotide() -> Self {
        Self {
            program: Program::Plastn,
            matrix: String::new(),
            reward: 2,
            penalty: -3,
            gap_open: 5,
            gap_extend: 2,
            seed_span: 11,
            ungap_xdrop: 20,
            ungap_threshold: 24,
            small_gap_threshold: 30,
            strand: StrandOption::Both,
            ..Self::protein()
        }
    }

    pub fn alphabet(&self) -> Alphabet {
        self.program.alphabet()
    }

    /// 实际使用的并行子流水线数
    pub fn split_count(&self) -> usize {
        if self.splits == 0 {
            self.threads.max(1)
        } else {
            self.splits
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(PlastError::Config(msg.to_string()));
        if !(self.evalue > 0.0) {
            return bad("evalue must be positive");
        }
        if self.threads == 0 {
            return bad("threads must be at least 1");
        }
        if self.seed_span == 0 {
            return bad("seed span must be positive");
        }
        if self.gap_open < 0 || self.gap_extend <= 0 {
            return bad("gap open must be >= 0 and gap extend > 0");
        }
        if self.ungap_xdrop <= 0 || !(self.gapped_xdrop_bits > 0.0) {
            return bad("x-drop values must be positive");
        }
        if self.small_gap && (self.small_gap_band == 0 || self.small_gap_window == 0) {
            return bad("small-gap band and window must be positive");
        }
        if self.max_hits_per_query == Some(0) {
            return bad("max hits per query must be positive");
        }
        match self.program {
            Program::Plastn => {
                if self.reward <= 0 || self.penalty >= 0 {
                    return bad("nucleotide reward must be > 0 and penalty < 0");
                }
                if self.composition {
                    return bad("composition adjustment applies to protein searches only");
                }
            }
            Program::Plastp => {
                if self.matrix.is_empty() {
                    return bad("protein search needs a scoring matrix");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SearchOptions::protein().validate().unwrap();
        SearchOptions::nucleotide().validate().unwrap();
        assert_eq!(SearchOptions::nucleotide().alphabet(), Alphabet::Nucleotide);
    }

    #[test]
    fn impossible_settings_are_rejected() {
        let mut o = SearchOptions::protein();
        o.evalue = 0.0;
        assert!(matches!(o.validate(), Err(PlastError::Config(_))));
        let mut o = SearchOptions::nucleotide();
        o.composition = true;
        assert!(o.validate().is_err());
        let mut o = SearchOptions::protein();
        o.threads = 0;
        assert!(o.validate().is_err());
    }

    #[test]
    fn split_count_follows_threads() {
        let mut o = SearchOptions::protein();
        o.threads = 4;
        assert_eq!(o.split_count(), 4);
        o.splits = 8;
        assert_eq!(o.split_count(), 8);
    }
}
