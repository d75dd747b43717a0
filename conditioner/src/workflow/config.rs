use anyhow::Context;
use magcore::config::{PipelineConfig, ProcessingOrder};
use magcore::interface::DecoderCommand;
use magcore::processing::{FirCoefficients, SampleFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which samples come in and where the FIR filter runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Magnitude file -> FIR
    Mag,
    /// Raw I/Q -> magnitude -> FIR
    RawMag,
    /// Raw I/Q -> FIR -> magnitude
    RawIq,
}

impl Mode {
    pub fn order(self) -> ProcessingOrder {
        match self {
            Mode::Mag | Mode::RawMag => ProcessingOrder::MagnitudeThenFilter,
            Mode::RawIq => ProcessingOrder::FilterThenMagnitude,
        }
    }

    pub fn is_raw(self) -> bool {
        !matches!(self, Mode::Mag)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecoderSettings {
    pub dir: PathBuf,
    #[serde(default)]
    pub upsample_rate: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub mode: Mode,
    /// Sample format name; inferred from mode and input rate when absent.
    pub format: Option<String>,
    pub input_rate: u32,
    /// Tap file; a single unit tap when absent.
    pub taps: Option<PathBuf>,
    pub dc: bool,
    pub dc_alpha: Option<f32>,
    pub bias_factor: Option<f32>,
    pub stream: bool,
    pub chunk_samples: usize,
    pub decoder: Option<DecoderSettings>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Mag,
            format: None,
            input_rate: 6_000_000,
            taps: None,
            dc: false,
            dc_alpha: None,
            bias_factor: None,
            stream: false,
            chunk_samples: magcore::config::DEFAULT_CHUNK_SAMPLES,
            decoder: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Raw modes correct the front-end bias with a unit factor by default.
    pub fn from_args(mode: Mode, input_rate: u32, taps: Option<PathBuf>) -> Self {
        Self {
            mode,
            input_rate,
            taps,
            bias_factor: if mode.is_raw() { Some(1.0) } else { None },
            ..Default::default()
        }
    }

    pub fn sample_format(&self) -> anyhow::Result<SampleFormat> {
        match &self.format {
            Some(name) => SampleFormat::from_name(name).context("resolving sample format"),
            None if self.mode.is_raw() => Ok(SampleFormat::for_sample_rate(self.input_rate)),
            None => Ok(SampleFormat::MAGNITUDE_F32),
        }
    }

    pub fn to_pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = PipelineConfig::new(self.sample_format()?, self.mode.order())
            .with_chunk_samples(self.chunk_samples);
        if self.dc {
            config = config.with_dc_block(self.dc_alpha);
        }
        if let Some(factor) = self.bias_factor {
            config = config.with_bias_correction(factor);
        }
        Ok(config)
    }

    pub fn load_coefficients(&self) -> anyhow::Result<FirCoefficients> {
        let domain = self.mode.order().fir_domain();
        match &self.taps {
            Some(path) => FirCoefficients::load(path, domain)
                .with_context(|| format!("loading filter taps {}", path.display())),
            None => Ok(FirCoefficients::identity(domain)),
        }
    }

    pub fn decoder_command(&self) -> anyhow::Result<Option<DecoderCommand>> {
        self.decoder
            .as_ref()
            .map(|settings| {
                DecoderCommand::for_rate(&settings.dir, self.input_rate, settings.upsample_rate)
                    .context("selecting decoder build")
            })
            .transpose()
    }
}
