use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use log::info;
use magcore::interface::{encode_magnitudes, RecordSummary};
use magcore::math::stats::StatsHelper;
use magcore::telemetry::MetricsSnapshot;
use magcore::Pipeline;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tokio::runtime::Builder as TokioBuilder;

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub label: String,
    #[serde(skip)]
    pub magnitudes: Vec<f32>,
    pub sample_count: usize,
    pub mean: f32,
    pub rms: f32,
    pub peak: f32,
    /// Decoder record counts; absent when the decoder was not run.
    pub records: Option<RecordSummary>,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute_file(&self, path: &Path) -> anyhow::Result<WorkflowResult> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        self.execute(&path.display().to_string(), BufReader::new(file))
    }

    pub fn execute<R: Read>(&self, label: &str, mut reader: R) -> anyhow::Result<WorkflowResult> {
        let mut pipeline = Pipeline::for_stream(
            label,
            self.config.to_pipeline_config()?,
            self.config.load_coefficients()?,
        )
        .context("building pipeline")?;

        let magnitudes = if self.config.stream {
            pipeline
                .process_all(reader)
                .context("streaming samples through pipeline")?
        } else {
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .with_context(|| format!("reading samples for {}", label))?;
            pipeline
                .process_bytes(&bytes)
                .context("processing samples in one pass")?
        };

        let records = match self.config.decoder_command()? {
            Some(command) => {
                let output = command
                    .run(&encode_magnitudes(&magnitudes))
                    .with_context(|| format!("running {}", command.program.display()))?;
                let summary = output.summary();
                info!("{}: decoder reported {} records", label, summary.records);
                Some(summary)
            }
            None => None,
        };

        Ok(WorkflowResult {
            label: label.to_string(),
            sample_count: magnitudes.len(),
            mean: StatsHelper::mean(&magnitudes),
            rms: StatsHelper::rms(&magnitudes),
            peak: StatsHelper::peak(&magnitudes),
            magnitudes,
            records,
            metrics: pipeline.metrics(),
        })
    }

    /// Runs every file as an independent stream on the blocking pool. Results
    /// keep the input order.
    pub fn execute_many(&self, paths: &[PathBuf]) -> anyhow::Result<Vec<WorkflowResult>> {
        let runtime = TokioBuilder::new_multi_thread()
            .build()
            .context("creating runtime for concurrent streams")?;

        runtime.block_on(async {
            let handles: Vec<_> = paths
                .iter()
                .cloned()
                .map(|path| {
                    let runner = self.clone();
                    tokio::task::spawn_blocking(move || {
                        runner
                            .execute_file(&path)
                            .with_context(|| format!("processing {}", path.display()))
                    })
                })
                .collect();

            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                results.push(handle.await.context("stream task panicked")??);
            }
            Ok::<_, anyhow::Error>(results)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_raw_u12, GeneratorConfig};
    use crate::workflow::config::Mode;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn synthetic(samples: usize, seed: u64) -> Vec<u8> {
        build_raw_u12(&GeneratorConfig {
            samples,
            seed,
            ..Default::default()
        })
        .unwrap()
    }

    fn raw_config(mode: Mode) -> WorkflowConfig {
        let mut cfg = WorkflowConfig::from_args(mode, 6_000_000, None);
        cfg.dc = true;
        cfg
    }

    #[test]
    fn stream_and_batch_runs_agree() {
        let bytes = synthetic(10_000, 3);
        for mode in [Mode::RawIq, Mode::RawMag] {
            let batch = Runner::new(raw_config(mode));
            let mut streaming_cfg = raw_config(mode);
            streaming_cfg.stream = true;
            streaming_cfg.chunk_samples = 998;
            let streaming = Runner::new(streaming_cfg);

            let a = batch.execute("batch", Cursor::new(bytes.clone())).unwrap();
            let b = streaming.execute("stream", Cursor::new(bytes.clone())).unwrap();
            assert_eq!(a.magnitudes, b.magnitudes);
            assert_eq!(a.sample_count, 10_000);
            assert_eq!(b.metrics.chunks, 11);
            assert!(a.records.is_none());
        }
    }

    #[test]
    fn tap_file_is_applied() {
        let mut taps = NamedTempFile::new().unwrap();
        writeln!(taps, "# smoothing").unwrap();
        writeln!(taps, "1\n1\n1\n1").unwrap();
        let taps = taps.into_temp_path();

        let bytes = synthetic(4_000, 1);
        let plain = Runner::new(raw_config(Mode::RawMag))
            .execute("plain", Cursor::new(bytes.clone()))
            .unwrap();
        let mut cfg = raw_config(Mode::RawMag);
        cfg.taps = Some(taps.to_path_buf());
        let smoothed = Runner::new(cfg).execute("smoothed", Cursor::new(bytes)).unwrap();

        assert_eq!(plain.sample_count, smoothed.sample_count);
        assert_ne!(plain.magnitudes, smoothed.magnitudes);
        let expected = (plain.magnitudes[0] + plain.magnitudes[1]) / 4.0;
        assert!((smoothed.magnitudes[1] - expected).abs() < 1e-6);
    }

    #[test]
    fn concurrent_streams_match_sequential_runs() {
        let mut paths = Vec::new();
        let mut temps = Vec::new();
        for seed in 0..3 {
            let mut file = NamedTempFile::new().unwrap();
            file.write_all(&synthetic(3_000, seed)).unwrap();
            let path = file.into_temp_path();
            paths.push(path.to_path_buf());
            temps.push(path);
        }

        let runner = Runner::new(raw_config(Mode::RawIq));
        let concurrent = runner.execute_many(&paths).unwrap();
        assert_eq!(concurrent.len(), 3);
        for (path, result) in paths.iter().zip(&concurrent) {
            let sequential = runner.execute_file(path).unwrap();
            assert_eq!(result.label, sequential.label);
            assert_eq!(result.magnitudes, sequential.magnitudes);
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let runner = Runner::new(raw_config(Mode::RawIq));
        let err = runner
            .execute_file(Path::new("/nonexistent/capture.bin"))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/capture.bin"));
    }

    #[test]
    fn truncated_recording_fails() {
        let mut bytes = synthetic(100, 0);
        bytes.pop();
        let runner = Runner::new(raw_config(Mode::RawIq));
        assert!(runner.execute("short", Cursor::new(bytes)).is_err());
    }
}
