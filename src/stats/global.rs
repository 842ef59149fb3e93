use std::f64::consts::LN_2;

use serde::Serialize;
use tracing::{debug, warn};

use super::karlin::{self, KarlinEntry, ScoreProfile, UNGAPPED};
use crate::align::matrix::ScoreMatrix;
use crate::error::{PlastError, Result};
use crate::util::{protein, Alphabet};

/// Karlin-Altschul parameters for one scoring configuration; built once per
/// search and shared read-only by every worker.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalParameters {
    pub matrix: String,
    pub open: i32,
    pub extend: i32,
    pub lambda: f64,
    pub k: f64,
    pub log_k: f64,
    pub h: f64,
    pub alpha: f64,
    pub beta: f64,
    /// 无空位参数，用于组成校正的基准 λ
    pub ungapped_lambda: f64,
    pub ungapped_k: f64,
    pub ungapped_h: f64,
    /// 正链序列总长与条数
    pub db_length: u64,
    pub db_sequences: u64,
}

impl GlobalParameters {
    /// 蛋白查表；核酸先查表，缺项时退回现场计算的无空位参数
    pub fn build(matrix: &ScoreMatrix, open: i32, extend: i32, db_length: u64, db_sequences: u64) -> Result<Self> {
        let failure = || PlastError::GlobalParametersFailure {
            matrix: matrix.name().to_string(),
            open,
            extend,
        };
        let (gapped, ungapped) = match matrix.alphabet() {
            Alphabet::Protein => {
                let table = karlin::protein_table(matrix.name()).ok_or_else(failure)?;
                let gapped = karlin::find_entry(table, open, extend).ok_or_else(failure)?;
                let ungapped = karlin::find_entry(table, UNGAPPED, UNGAPPED).ok_or_else(failure)?;
                (gapped, ungapped)
            }
            Alphabet::Nucleotide => {
                let uniform = [0.25; 4];
                let profile = ScoreProfile::from_matrix(matrix, &uniform, &uniform).ok_or_else(failure)?;
                let (lambda, k, h) = karlin::ungapped_params(&profile).ok_or_else(failure)?;
                let ungapped = KarlinEntry { open: 0, extend: 0, lambda, k, h, alpha: lambda / h, beta: 0.0 };
                let (reward, penalty) = nucleotide_scores(matrix);
                let gapped = match karlin::nucleotide_table(reward, penalty)
                    .and_then(|t| karlin::find_entry(t, open, extend))
                {
                    Some(e) => e,
                    None => {
                        warn!(reward, penalty, open, extend, "no gapped table entry, using ungapped parameters");
                        ungapped
                    }
                };
                (gapped, ungapped)
            }
        };
        let params = Self {
            matrix: matrix.name().to_string(),
            open,
            extend,
            lambda: gapped.lambda,
            k: gapped.k,
            log_k: gapped.k.ln(),
            h: gapped.h,
            alpha: gapped.alpha,
            beta: gapped.beta,
            ungapped_lambda: ungapped.lambda,
            ungapped_k: ungapped.k,
            ungapped_h: ungapped.h,
            db_length,
            db_sequences,
        };
        debug!(lambda = params.lambda, k = params.k, h = params.h, "global parameters");
        Ok(params)
    }

    /// E = effsp · e^{-λS + logK}
    #[inline]
    pub fn score_to_evalue(&self, eff_searchsp: f64, score: i32) -> f64 {
        eff_searchsp * (-self.lambda * score as f64 + self.log_k).exp()
    }

    #[inline]
    pub fn score_to_bitscore(&self, score: i32) -> f64 {
        (self.lambda * score as f64 - self.log_k) / LN_2
    }

    /// 满足 E 值阈值的最小整数分（至少为 1）
    pub fn evalue_to_cutoff(&self, eff_searchsp: f64, evalue: f64) -> i32 {
        if eff_searchsp <= 0.0 || evalue <= 0.0 {
            return 1;
        }
        let raw = (self.log_k + eff_searchsp.ln() - evalue.ln()) / self.lambda;
        let mut cutoff = (raw.ceil() as i32).max(1);
        // 浮点边界修正，保证 cutoff 恰为最小满足值
        while cutoff > 1 && self.score_to_evalue(eff_searchsp, cutoff - 1) <= evalue {
            cutoff -= 1;
        }
        while self.score_to_evalue(eff_searchsp, cutoff) > evalue {
            cutoff += 1;
        }
        cutoff
    }

    /// X-drop 等以 bit 表示的量换算成原始分
    pub fn bits_to_raw(&self, bits: f64) -> i32 {
        (bits * LN_2 / self.lambda).ceil() as i32
    }

    /// 边缘效应长度校正：求 ell = α/λ·(logK + ln((m-ell)(n-N·ell))) + β 的不动点
    pub fn length_adjustment(&self, query_length: usize) -> usize {
        const MAX_ITERATIONS: usize = 20;
        let m = query_length as f64;
        let n = self.db_length as f64;
        let nseq = self.db_sequences.max(1) as f64;
        if m <= 0.0 || n <= 0.0 {
            return 0;
        }
        let alpha_d_lambda = self.alpha / self.lambda;
        let c = n * m - m.max(n) / self.k;
        if c < 0.0 {
            return 0;
        }
        let mb = m * nseq + n;
        let disc = mb * mb - 4.0 * nseq * c;
        if disc < 0.0 {
            return 0;
        }
        let mut ell_max = 2.0 * c / (mb + disc.sqrt());
        let mut ell_min = 0.0f64;
        let mut ell_next = 0.0f64;
        let mut converged = false;
        let fixed = |ell: f64| alpha_d_lambda * (self.log_k + ((m - ell) * (n - nseq * ell)).ln()) + self.beta;

        for i in 1..=MAX_ITERATIONS {
            let ell = ell_next;
            let ell_bar = fixed(ell);
            if ell_bar >= ell {
                ell_min = ell;
                if ell_bar - ell_min <= 1.0 {
                    converged = true;
                    break;
                }
                if ell_min == ell_max {
                    break;
                }
            } else {
                ell_max = ell;
            }
            ell_next = if ell_min <= ell_bar && ell_bar <= ell_max {
                ell_bar
            } else if i == 1 {
                ell_max
            } else {
                (ell_min + ell_max) / 2.0
            };
        }

        let mut adjust = ell_min as usize;
        if converged {
            let ceil = ell_min.ceil();
            if ceil <= ell_max && fixed(ceil) >= ceil {
                adjust = ceil as usize;
            }
        }
        adjust
    }

    /// 组成校正用：给定两侧频率求新的无空位 λ
    pub fn composition_lambda(matrix: &ScoreMatrix, query: &[f64], subject: &[f64]) -> Option<f64> {
        let profile = ScoreProfile::from_matrix(matrix, query, subject)?;
        karlin::solve_lambda(&profile)
    }

    /// 背景频率下的理想无空位 λ（蛋白）
    pub fn ideal_lambda(matrix: &ScoreMatrix) -> Option<f64> {
        let bg = protein::BACKGROUND_FREQUENCIES;
        Self::composition_lambda(matrix, &bg, &bg)
    }
}

fn nucleotide_scores(matrix: &ScoreMatrix) -> (i32, i32) {
    (matrix.score(0, 0), matrix.score(0, 1))
}
