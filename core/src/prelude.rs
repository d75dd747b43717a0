use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain a chunk of samples (or a filter) lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleDomain {
    /// Complex baseband, one I/Q pair per index.
    Iq,
    /// Real-valued magnitude, one scalar per index.
    Magnitude,
}

impl fmt::Display for SampleDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleDomain::Iq => write!(f, "I/Q"),
            SampleDomain::Magnitude => write!(f, "magnitude"),
        }
    }
}

/// Ordered block of normalized samples taken from one stream.
///
/// Chunks carry no identity beyond their position in the stream, so they
/// must be handed to a pipeline strictly in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleChunk {
    Iq(Vec<Complex32>),
    Magnitude(Vec<f32>),
}

impl SampleChunk {
    /// Pairs two equally long channels into an I/Q chunk.
    #[cfg(test)]
    pub(crate) fn from_channels(i: &[f32], q: &[f32]) -> Self {
        assert_eq!(i.len(), q.len(), "I and Q channels differ in length");
        SampleChunk::Iq(
            i.iter()
                .zip(q)
                .map(|(&re, &im)| Complex32::new(re, im))
                .collect(),
        )
    }

    pub fn domain(&self) -> SampleDomain {
        match self {
            SampleChunk::Iq(_) => SampleDomain::Iq,
            SampleChunk::Magnitude(_) => SampleDomain::Magnitude,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleChunk::Iq(samples) => samples.len(),
            SampleChunk::Magnitude(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits an I/Q chunk into its two channels.
    pub fn channels(&self) -> Option<(Vec<f32>, Vec<f32>)> {
        match self {
            SampleChunk::Iq(samples) => Some((
                samples.iter().map(|s| s.re).collect(),
                samples.iter().map(|s| s.im).collect(),
            )),
            SampleChunk::Magnitude(_) => None,
        }
    }

    /// Unwraps the magnitude samples, failing for I/Q chunks.
    pub fn into_magnitude(self, stage: StageKind) -> StageResult<Vec<f32>> {
        match self {
            SampleChunk::Magnitude(samples) => Ok(samples),
            SampleChunk::Iq(_) => Err(ConfigError::DomainMismatch {
                stage,
                expected: SampleDomain::Magnitude,
                found: SampleDomain::Iq,
            }
            .into()),
        }
    }
}

/// Identifies a stage in errors, logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    Decode,
    DcBlock,
    BiasCorrect,
    Fir,
    Magnitude,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Decode => "decode",
            StageKind::DcBlock => "dc-block",
            StageKind::BiasCorrect => "bias-correct",
            StageKind::Fir => "fir",
            StageKind::Magnitude => "magnitude",
        };
        f.write_str(name)
    }
}

/// Malformed or unsupported sample/tap data.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("odd number of words ({0}) in interleaved I/Q data")]
    OddWordCount(usize),
    #[error("{remainder} trailing byte(s) do not form a complete {word_bytes}-byte word")]
    TrailingBytes { remainder: usize, word_bytes: usize },
    #[error("unrecognized sample format '{0}'")]
    UnknownFormat(String),
    #[error("{effective} effective bits are inconsistent with {storage}-bit {encoding} storage")]
    BitWidth {
        storage: u8,
        effective: u8,
        encoding: &'static str,
    },
    #[error("tap file line {line}: cannot parse '{text}'")]
    TapParse { line: usize, text: String },
    #[error("tap file contains no coefficients")]
    EmptyTapFile,
    #[error("tap sum {0} cannot be normalized to unity DC gain")]
    TapSum(f32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Internally inconsistent pipeline configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("FIR filter needs at least one tap")]
    EmptyTaps,
    #[error("tap sum {0} is not strictly positive")]
    NonPositiveTapSum(f32),
    #[error("{stage} stage expects {expected} samples but got {found}")]
    DomainMismatch {
        stage: StageKind,
        expected: SampleDomain,
        found: SampleDomain,
    },
    #[error("DC blocker alpha {0} is outside (0, 1)")]
    InvalidAlpha(f32),
    #[error("bias correction factor {0} is not finite")]
    InvalidBiasFactor(f32),
    #[error("chunk size must be positive")]
    ZeroChunkSize,
    #[error("chunk size {0} must be even when bias correction is enabled")]
    OddChunkSize(usize),
    #[error("chunk starts at odd stream index {0}, bias correction needs even alignment")]
    MisalignedChunk(u64),
    #[error("{0} stage cannot run on magnitude input")]
    MagnitudeInput(StageKind),
    #[error("no decoder build for input rate {0} Hz")]
    UnsupportedRate(u32),
}

/// Carried filter state that no longer matches the configured taps.
///
/// Never returned as a failure: the owner resets the state and logs it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("filter state holds {found} values but {expected} are required, resetting to zeros")]
pub struct StateError {
    pub expected: usize,
    pub found: usize,
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type StageResult<T> = Result<T, StageError>;

/// A chunk-oriented processing stage.
///
/// `execute` either returns the transformed chunk and advances any internal
/// state, or fails without touching that state.
pub trait ProcessingStage {
    fn kind(&self) -> StageKind;
    fn execute(&mut self, chunk: SampleChunk) -> StageResult<SampleChunk>;
    fn reset(&mut self);
}
