//! Stage composition and chunked stream processing.
//!
//! A pipeline is bound to one stream. It decodes raw chunks, runs them
//! through its fixed list of stages and yields magnitude samples. Every chunk
//! runs against a staged copy of the stage state which is only committed once
//! the whole chunk succeeded, so a failed chunk leaves no trace.

use crate::config::{PipelineConfig, ProcessingOrder};
use crate::interface::source::ChunkReader;
use crate::math::stats::StatsHelper;
use crate::prelude::{
    ConfigError, ProcessingStage, SampleChunk, SampleDomain, StageError, StageKind,
};
use crate::processing::{
    BiasCorrector, DcBlocker, FirCoefficients, FirFilter, MagnitudeStage, SampleDecoder, Stage,
};
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use std::io::Read;

/// A stage failure, tagged with the stage that raised it.
#[derive(thiserror::Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: StageKind,
    #[source]
    pub source: StageError,
}

pub struct Pipeline {
    config: PipelineConfig,
    decoder: SampleDecoder,
    stages: Vec<Stage>,
    position: u64,
    logger: LogManager,
    metrics: MetricsRecorder,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, coefficients: FirCoefficients) -> Result<Self, ConfigError> {
        Self::for_stream("stream", config, coefficients)
    }

    /// Builds a pipeline whose log lines carry `name`.
    pub fn for_stream(
        name: &str,
        config: PipelineConfig,
        coefficients: FirCoefficients,
    ) -> Result<Self, ConfigError> {
        config.validate(&coefficients)?;

        let mut stages = Vec::new();
        if let Some(dc) = config.dc_block {
            stages.push(Stage::DcBlock(DcBlocker::new(dc.alpha)?));
        }
        if let Some(factor) = config.bias_correction {
            stages.push(Stage::BiasCorrect(BiasCorrector::new(factor)?));
        }

        let logger = LogManager::for_stream(name);
        logger.record(&format!(
            "FIR {} taps, DC gain {:.4}, Nyquist gain {:.4}",
            coefficients.len(),
            coefficients.dc_gain(),
            coefficients.nyquist_gain()
        ));

        let fir = Stage::Fir(FirFilter::new(coefficients));
        match config.order {
            ProcessingOrder::FilterThenMagnitude => {
                stages.push(fir);
                stages.push(Stage::Magnitude(MagnitudeStage::new()));
            }
            ProcessingOrder::MagnitudeThenFilter => {
                if config.format.domain() == SampleDomain::Iq {
                    stages.push(Stage::Magnitude(MagnitudeStage::new()));
                }
                stages.push(fir);
            }
        }

        let names: Vec<String> = stages.iter().map(|s| s.kind().to_string()).collect();
        logger.record(&format!(
            "pipeline {:?}: decode -> {}",
            config.order,
            names.join(" -> ")
        ));

        Ok(Self {
            decoder: SampleDecoder::new(config.format),
            config,
            stages,
            position: 0,
            logger,
            metrics: MetricsRecorder::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stages after decoding, in execution order.
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    /// Samples consumed since stream start.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn fir(&self) -> Option<&FirFilter> {
        self.stages.iter().find_map(|stage| match stage {
            Stage::Fir(fir) => Some(fir),
            _ => None,
        })
    }

    /// Decodes one raw chunk and runs it through every stage.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Result<Vec<f32>, PipelineError> {
        let chunk = match self.decoder.decode(bytes) {
            Ok(chunk) => chunk,
            Err(err) => return Err(self.fail(StageKind::Decode, err.into())),
        };
        self.process_chunk(chunk)
    }

    /// Runs one already-decoded chunk through every stage.
    pub fn process_chunk(&mut self, chunk: SampleChunk) -> Result<Vec<f32>, PipelineError> {
        let expected = self.decoder.format().domain();
        if chunk.domain() != expected {
            let err = ConfigError::DomainMismatch {
                stage: StageKind::Decode,
                expected,
                found: chunk.domain(),
            };
            return Err(self.fail(StageKind::Decode, err.into()));
        }
        if self.config.bias_correction.is_some() && self.position % 2 != 0 {
            let err = ConfigError::MisalignedChunk(self.position);
            return Err(self.fail(StageKind::BiasCorrect, err.into()));
        }

        let samples = chunk.len();
        let mut staged = self.stages.clone();
        let mut current = chunk;
        for stage in staged.iter_mut() {
            current = match stage.execute(current) {
                Ok(next) => next,
                Err(err) => return Err(self.fail(stage.kind(), err)),
            };
        }
        let output = match current.into_magnitude(StageKind::Magnitude) {
            Ok(output) => output,
            Err(err) => return Err(self.fail(StageKind::Magnitude, err)),
        };

        self.stages = staged;
        self.position += samples as u64;
        self.metrics.record_chunk(samples);
        self.logger.detail(&format!(
            "chunk of {} samples at {}, output RMS {:.5}",
            samples,
            self.position - samples as u64,
            StatsHelper::rms(&output)
        ));
        Ok(output)
    }

    /// Swaps the FIR taps mid-stream. History that no longer fits the new tap
    /// count is reset to zeros and logged.
    pub fn replace_coefficients(
        &mut self,
        coefficients: FirCoefficients,
    ) -> Result<(), PipelineError> {
        let outcome = self
            .stages
            .iter_mut()
            .find_map(|stage| match stage {
                Stage::Fir(fir) => Some(fir.set_coefficients(coefficients.clone())),
                _ => None,
            })
            .unwrap_or(Err(ConfigError::EmptyTaps));

        match outcome {
            Ok(Some(mismatch)) => {
                self.metrics.record_state_reset();
                self.logger.warn(&format!("FIR state cold restart: {}", mismatch));
                Ok(())
            }
            Ok(None) => {
                self.logger
                    .record(&format!("FIR taps replaced, {} taps", coefficients.len()));
                Ok(())
            }
            Err(err) => Err(self.fail(StageKind::Fir, err.into())),
        }
    }

    /// Zeroes every stage state and rewinds the stream position.
    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
        self.position = 0;
        self.metrics.reset();
    }

    /// Lazily processes a byte source in chunks of the configured size.
    pub fn stream<R: Read>(&mut self, reader: R) -> MagnitudeStream<'_, R> {
        let source = ChunkReader::new(reader, &self.config.format, self.config.chunk_samples);
        MagnitudeStream {
            pipeline: self,
            source,
            failed: false,
        }
    }

    /// Processes a whole byte source chunk by chunk and concatenates the output.
    pub fn process_all<R: Read>(&mut self, reader: R) -> Result<Vec<f32>, PipelineError> {
        let mut magnitudes = Vec::new();
        for chunk in self.stream(reader) {
            magnitudes.extend(chunk?);
        }
        Ok(magnitudes)
    }

    fn fail(&self, stage: StageKind, source: StageError) -> PipelineError {
        self.metrics.record_error();
        self.logger
            .warn(&format!("{} stage failed at sample {}: {}", stage, self.position, source));
        PipelineError { stage, source }
    }
}

/// Iterator over the magnitude output of successive chunks. Stops after the
/// first error.
pub struct MagnitudeStream<'a, R> {
    pipeline: &'a mut Pipeline,
    source: ChunkReader<R>,
    failed: bool,
}

impl<R: Read> Iterator for MagnitudeStream<'_, R> {
    type Item = Result<Vec<f32>, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = match self.source.next()? {
            Ok(bytes) => self.pipeline.process_bytes(&bytes),
            Err(err) => Err(self.pipeline.fail(StageKind::Decode, err.into())),
        };
        self.failed = result.is_err();
        Some(result)
    }
}
