use serde::Serialize;
use tracing::debug;

use super::composition::{CompositionConfig, CompositionStage, NullComposition};
use super::full_gap::{FullGapConfig, FullGapStage};
use super::small_gap::{SmallGapConfig, SmallGapStage};
use super::ungap::{UngapConfig, UngapStage};
use super::{HitSource, SearchContext};
use crate::align::banded::SmallGapParams;
use crate::align::ScoreMatrix;
use crate::config::SearchOptions;
use crate::error::{PlastError, Result};
use crate::stats::GlobalParameters;

/// 单个阶段的配置，均为可复制的值
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum StageConfig {
    Ungap(UngapConfig),
    SmallGap(SmallGapConfig),
    FullGap(FullGapConfig),
    Composition(CompositionConfig),
    NullComposition,
}

/// 按顺序排列的阶段配置；同一描述可对多个种子子源各实例化一次
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineDescriptor {
    pub stages: Vec<StageConfig>,
}

impl PipelineDescriptor {
    /// Ungap → SmallGap（可选）→ FullGap → Composition / NullComposition
    pub fn from_options(options: &SearchOptions, matrix: &ScoreMatrix, params: &GlobalParameters) -> Result<Self> {
        let mut stages = vec![StageConfig::Ungap(UngapConfig {
            xdrop: options.ungap_xdrop,
            threshold: options.ungap_threshold,
        })];

        if options.small_gap {
            let sg = SmallGapParams {
                gap_open: options.gap_open,
                gap_extend: options.gap_extend,
                band_width: options.small_gap_band,
                window: options.small_gap_window,
            };
            let fits = sg.fits_i16(matrix);
            if options.vectorized && !fits {
                return Err(PlastError::Config(format!(
                    "small-gap window {} is too long for the 16-bit kernel with {}",
                    options.small_gap_window,
                    matrix.name()
                )));
            }
            stages.push(StageConfig::SmallGap(SmallGapConfig {
                gap_open: sg.gap_open,
                gap_extend: sg.gap_extend,
                band_width: sg.band_width,
                window: sg.window,
                threshold: options.small_gap_threshold,
                vectorized: options.vectorized,
            }));
        }

        stages.push(StageConfig::FullGap(FullGapConfig {
            gap_open: options.gap_open,
            gap_extend: options.gap_extend,
            xdrop: params.bits_to_raw(options.gapped_xdrop_bits),
        }));

        if options.composition {
            let ideal_lambda = GlobalParameters::ideal_lambda(matrix).ok_or_else(|| {
                PlastError::Config(format!("no ideal lambda for matrix {}", matrix.name()))
            })?;
            stages.push(StageConfig::Composition(CompositionConfig { evalue: options.evalue, ideal_lambda }));
        } else {
            stages.push(StageConfig::NullComposition);
        }
        debug!(stages = stages.len(), "pipeline descriptor built");
        Ok(Self { stages })
    }

    /// 在 `source` 之上依次套上各阶段，返回最下游的阶段
    pub fn instantiate<'a>(&self, source: Box<dyn HitSource + 'a>, ctx: &'a SearchContext<'a>) -> Box<dyn HitSource + 'a> {
        self.stages.iter().fold(source, |src, stage| -> Box<dyn HitSource + 'a> {
            match *stage {
                StageConfig::Ungap(cfg) => Box::new(UngapStage::new(src, ctx, cfg)),
                StageConfig::SmallGap(cfg) => Box::new(SmallGapStage::new(src, ctx, cfg)),
                StageConfig::FullGap(cfg) => Box::new(FullGapStage::new(src, ctx, cfg)),
                StageConfig::Composition(cfg) => Box::new(CompositionStage::new(src, ctx, cfg)),
                StageConfig::NullComposition => Box::new(NullComposition::new(src)),
            }
        })
    }
}
