use crate::prelude::{
    ConfigError, ProcessingStage, SampleChunk, SampleDomain, StageKind, StageResult,
};
use num_complex::Complex32;

/// Reduces complex samples to `sqrt(I^2 + Q^2)`. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagnitudeStage;

impl MagnitudeStage {
    pub fn new() -> Self {
        Self
    }

    pub fn magnitude(samples: &[Complex32]) -> Vec<f32> {
        samples.iter().map(|s| s.norm_sqr().sqrt()).collect()
    }
}

impl ProcessingStage for MagnitudeStage {
    fn kind(&self) -> StageKind {
        StageKind::Magnitude
    }

    fn execute(&mut self, chunk: SampleChunk) -> StageResult<SampleChunk> {
        match chunk {
            SampleChunk::Iq(samples) => Ok(SampleChunk::Magnitude(Self::magnitude(&samples))),
            SampleChunk::Magnitude(_) => Err(ConfigError::DomainMismatch {
                stage: StageKind::Magnitude,
                expected: SampleDomain::Iq,
                found: SampleDomain::Magnitude,
            }
            .into()),
        }
    }

    fn reset(&mut self) {}
}
