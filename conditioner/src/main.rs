use anyhow::Context;
use clap::Parser;
use generator::profile::{build_raw_u12, GeneratorConfig};
use magcore::interface::write_magnitudes;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::PathBuf;
use workflow::config::{DecoderSettings, Mode, WorkflowConfig};
use workflow::runner::{Runner, WorkflowResult};

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Conditions receiver samples for stream1090")]
struct Args {
    /// Sample files, each processed as an independent stream
    inputs: Vec<PathBuf>,
    /// Load a workflow config from YAML instead of the flags below
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Process a generated 12-bit raw recording instead of input files
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// FIR tap file, one coefficient per line
    #[arg(long)]
    taps: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Mode::Mag)]
    mode: Mode,
    /// Sample format name; inferred from the mode and --fs when omitted
    #[arg(long)]
    format: Option<String>,
    /// Input sample rate in Hz
    #[arg(long, default_value_t = 6_000_000)]
    fs: u32,
    /// Q scale factor of the bias correction in raw modes
    #[arg(long)]
    hbc: Option<f32>,
    #[arg(long, default_value_t = false)]
    no_hbc: bool,
    /// Remove the DC offset of raw I/Q input
    #[arg(long, default_value_t = false)]
    dc: bool,
    #[arg(long)]
    dc_alpha: Option<f32>,
    /// Read the input in fixed-size chunks instead of all at once
    #[arg(long, default_value_t = false)]
    stream: bool,
    #[arg(long, default_value_t = magcore::config::DEFAULT_CHUNK_SAMPLES)]
    chunk_samples: usize,
    /// Save the magnitude stream as little-endian f32
    #[arg(long)]
    save_mag: Option<PathBuf>,
    /// Skip the stream1090 decoder
    #[arg(long, default_value_t = false)]
    no1090: bool,
    #[arg(long)]
    upsample_rate: Option<u32>,
    #[arg(long, default_value = "../build")]
    stream1090_dir: PathBuf,
    /// Write a JSON summary of every stream
    #[arg(long)]
    report: Option<PathBuf>,
}

fn workflow_from_args(args: &Args) -> WorkflowConfig {
    let mut config = WorkflowConfig::from_args(args.mode, args.fs, args.taps.clone());
    config.format = args.format.clone();
    config.dc = args.dc;
    config.dc_alpha = args.dc_alpha;
    if let Some(factor) = args.hbc {
        config.bias_factor = Some(factor);
    }
    if args.no_hbc {
        config.bias_factor = None;
    }
    config.stream = args.stream;
    config.chunk_samples = args.chunk_samples;
    if !args.no1090 {
        config.decoder = Some(DecoderSettings {
            dir: args.stream1090_dir.clone(),
            upsample_rate: args.upsample_rate,
        });
    }
    config
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = match &args.workflow {
        Some(path) => WorkflowConfig::load(path)?,
        None => workflow_from_args(&args),
    };
    if args.synthetic {
        anyhow::ensure!(
            workflow_config.mode.is_raw(),
            "synthetic input needs a raw mode (raw-mag or raw-iq)"
        );
        workflow_config.format = Some("u16".into());
    }

    let runner = Runner::new(workflow_config);
    let results = if args.synthetic {
        let generator = GeneratorConfig {
            seed: args.seed,
            ..Default::default()
        };
        let bytes = build_raw_u12(&generator)?;
        vec![runner.execute("synthetic", Cursor::new(bytes))?]
    } else {
        match args.inputs.as_slice() {
            [] => anyhow::bail!("no input files given (pass paths or --synthetic)"),
            [single] => vec![runner.execute_file(single)?],
            many => runner.execute_many(many)?,
        }
    };

    for result in &results {
        print_summary(result);
    }

    if let Some(path) = &args.save_mag {
        anyhow::ensure!(
            results.len() == 1,
            "--save-mag needs exactly one stream, got {}",
            results.len()
        );
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        write_magnitudes(&mut writer, &results[0].magnitudes)
            .and_then(|_| writer.flush())
            .with_context(|| format!("writing magnitudes to {}", path.display()))?;
        println!("Saved {} magnitude samples to {}", results[0].sample_count, path.display());
    }

    if let Some(path) = &args.report {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let report = serde_json::to_string_pretty(&results).context("serializing run report")?;
        fs::write(path, report).with_context(|| format!("writing report {}", path.display()))?;
    }

    Ok(())
}

fn print_summary(result: &WorkflowResult) {
    println!(
        "{} -> {} magnitude samples, mean {:.5}, rms {:.5}, peak {:.5}",
        result.label, result.sample_count, result.mean, result.rms, result.peak
    );
    if let Some(records) = &result.records {
        println!(
            "  Total messages: {} (extended squitter {})",
            records.records, records.extended_squitter
        );
    }
}
