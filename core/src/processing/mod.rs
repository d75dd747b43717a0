pub mod bias;
pub mod dc_block;
pub mod decode;
pub mod fir;
pub mod magnitude;

pub use bias::BiasCorrector;
pub use dc_block::{DcBlocker, DcState, DcStates};
pub use decode::{Encoding, SampleDecoder, SampleFormat};
pub use fir::{FilterState, FirCoefficients, FirFilter, FirStates};
pub use magnitude::MagnitudeStage;

use crate::prelude::{ProcessingStage, SampleChunk, StageKind, StageResult};

/// One enabled stage of a pipeline, cloneable so a chunk can run against a
/// staged copy of the state.
#[derive(Debug, Clone)]
pub enum Stage {
    DcBlock(DcBlocker),
    BiasCorrect(BiasCorrector),
    Fir(FirFilter),
    Magnitude(MagnitudeStage),
}

impl ProcessingStage for Stage {
    fn kind(&self) -> StageKind {
        match self {
            Stage::DcBlock(stage) => stage.kind(),
            Stage::BiasCorrect(stage) => stage.kind(),
            Stage::Fir(stage) => stage.kind(),
            Stage::Magnitude(stage) => stage.kind(),
        }
    }

    fn execute(&mut self, chunk: SampleChunk) -> StageResult<SampleChunk> {
        match self {
            Stage::DcBlock(stage) => stage.execute(chunk),
            Stage::BiasCorrect(stage) => stage.execute(chunk),
            Stage::Fir(stage) => stage.execute(chunk),
            Stage::Magnitude(stage) => stage.execute(chunk),
        }
    }

    fn reset(&mut self) {
        match self {
            Stage::DcBlock(stage) => stage.reset(),
            Stage::BiasCorrect(stage) => stage.reset(),
            Stage::Fir(stage) => stage.reset(),
            Stage::Magnitude(stage) => stage.reset(),
        }
    }
}
