use crate::prelude::{ConfigError, SampleDomain, StageKind};
use crate::processing::decode::SampleFormat;
use crate::processing::fir::FirCoefficients;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SAMPLES: usize = 200_000;

/// Where the FIR filter sits relative to the magnitude reduction. The two
/// orders give numerically different streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingOrder {
    /// FIR on the complex I/Q signal, magnitude afterwards.
    FilterThenMagnitude,
    /// Magnitude first, FIR on the real magnitude stream.
    MagnitudeThenFilter,
}

impl ProcessingOrder {
    pub fn fir_domain(self) -> SampleDomain {
        match self {
            ProcessingOrder::FilterThenMagnitude => SampleDomain::Iq,
            ProcessingOrder::MagnitudeThenFilter => SampleDomain::Magnitude,
        }
    }

    pub fn default_dc_alpha(self) -> f32 {
        match self {
            ProcessingOrder::FilterThenMagnitude => 0.005,
            ProcessingOrder::MagnitudeThenFilter => 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcBlockConfig {
    pub alpha: f32,
}

/// Stage toggles and stream layout consumed when a pipeline is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub format: SampleFormat,
    pub order: ProcessingOrder,
    #[serde(default)]
    pub dc_block: Option<DcBlockConfig>,
    /// Q scale factor of the bias correction; `None` disables the stage.
    #[serde(default)]
    pub bias_correction: Option<f32>,
    #[serde(default = "default_chunk_samples")]
    pub chunk_samples: usize,
}

fn default_chunk_samples() -> usize {
    DEFAULT_CHUNK_SAMPLES
}

impl PipelineConfig {
    pub fn new(format: SampleFormat, order: ProcessingOrder) -> Self {
        Self {
            format,
            order,
            dc_block: None,
            bias_correction: None,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
        }
    }

    /// Enables DC removal; without an explicit alpha the order's default is used.
    pub fn with_dc_block(mut self, alpha: Option<f32>) -> Self {
        let alpha = alpha.unwrap_or_else(|| self.order.default_dc_alpha());
        self.dc_block = Some(DcBlockConfig { alpha });
        self
    }

    pub fn with_bias_correction(mut self, factor: f32) -> Self {
        self.bias_correction = Some(factor);
        self
    }

    pub fn with_chunk_samples(mut self, chunk_samples: usize) -> Self {
        self.chunk_samples = chunk_samples;
        self
    }

    /// Rejects every combination a pipeline cannot honour.
    pub fn validate(&self, coefficients: &FirCoefficients) -> Result<(), ConfigError> {
        if self.chunk_samples == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if let Some(dc) = self.dc_block {
            if !(dc.alpha > 0.0 && dc.alpha < 1.0) {
                return Err(ConfigError::InvalidAlpha(dc.alpha));
            }
        }
        if let Some(factor) = self.bias_correction {
            if !factor.is_finite() {
                return Err(ConfigError::InvalidBiasFactor(factor));
            }
            if self.chunk_samples % 2 != 0 {
                return Err(ConfigError::OddChunkSize(self.chunk_samples));
            }
        }

        if self.format.domain() == SampleDomain::Magnitude {
            if self.dc_block.is_some() {
                return Err(ConfigError::MagnitudeInput(StageKind::DcBlock));
            }
            if self.bias_correction.is_some() {
                return Err(ConfigError::MagnitudeInput(StageKind::BiasCorrect));
            }
            if self.order == ProcessingOrder::FilterThenMagnitude {
                return Err(ConfigError::DomainMismatch {
                    stage: StageKind::Decode,
                    expected: SampleDomain::Iq,
                    found: SampleDomain::Magnitude,
                });
            }
        }

        let fir_domain = self.order.fir_domain();
        if coefficients.domain() != fir_domain {
            return Err(ConfigError::DomainMismatch {
                stage: StageKind::Fir,
                expected: fir_domain,
                found: coefficients.domain(),
            });
        }
        Ok(())
    }
}
