use crate::prelude::{
    ConfigError, ProcessingStage, SampleChunk, SampleDomain, StageKind, StageResult,
};
use num_complex::Complex32;

/// Undoes the alternating sign bias of HackRF-style front ends and rescales Q.
///
/// Even samples have both channels negated; Q is scaled by the factor on
/// every sample. Sample parity is taken relative to the chunk, so callers
/// must only pass chunks that start on an even stream index.
#[derive(Debug, Clone, Copy)]
pub struct BiasCorrector {
    factor: f32,
}

impl BiasCorrector {
    pub fn new(factor: f32) -> Result<Self, ConfigError> {
        if !factor.is_finite() {
            return Err(ConfigError::InvalidBiasFactor(factor));
        }
        Ok(Self { factor })
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn apply(&self, samples: &mut [Complex32]) {
        for (n, sample) in samples.iter_mut().enumerate() {
            if n % 2 == 0 {
                sample.re = -sample.re;
                sample.im = -sample.im * self.factor;
            } else {
                sample.im *= self.factor;
            }
        }
    }
}

impl ProcessingStage for BiasCorrector {
    fn kind(&self) -> StageKind {
        StageKind::BiasCorrect
    }

    fn execute(&mut self, chunk: SampleChunk) -> StageResult<SampleChunk> {
        match chunk {
            SampleChunk::Iq(mut samples) => {
                self.apply(&mut samples);
                Ok(SampleChunk::Iq(samples))
            }
            SampleChunk::Magnitude(_) => Err(ConfigError::DomainMismatch {
                stage: StageKind::BiasCorrect,
                expected: SampleDomain::Iq,
                found: SampleDomain::Magnitude,
            }
            .into()),
        }
    }

    fn reset(&mut self) {}
}
