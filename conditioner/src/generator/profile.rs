use crate::generator::template::{chip_envelope, ppm_chips};
use anyhow::Context;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Bits in a long (extended squitter) Mode S reply.
const LONG_REPLY_BITS: usize = 112;
/// Largest 12-bit code held in each 16-bit word.
const MAX_CODE: f32 = 4095.0;

/// Configuration for a synthetic 12-in-16 raw I/Q recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Complex samples to generate.
    pub samples: usize,
    /// Samples per 0.5 µs chip; 3 at 6 MHz.
    pub samples_per_chip: usize,
    /// Samples between the starts of consecutive replies.
    pub burst_period: usize,
    /// Constant offset added to both channels, in normalized units.
    pub dc_offset: f32,
    pub pulse_amplitude: f32,
    /// Carrier offset in cycles per sample.
    pub carrier: f32,
    pub noise: f32,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            samples: 60_000,
            samples_per_chip: 3,
            burst_period: 6_000,
            dc_offset: 0.05,
            pulse_amplitude: 0.6,
            carrier: 0.01,
            noise: 0.02,
            seed: 0,
        }
    }
}

/// Normalized I/Q pairs: replies with random payload bits on a noisy,
/// DC-offset background.
pub fn build_iq(config: &GeneratorConfig) -> Vec<(f32, f32)> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let period = config.burst_period.max(1);
    let mut envelope = Vec::new();

    let mut samples = Vec::with_capacity(config.samples);
    for n in 0..config.samples {
        if n % period == 0 {
            let bits: Vec<bool> = (0..LONG_REPLY_BITS).map(|_| rng.gen()).collect();
            envelope = chip_envelope(&ppm_chips(&bits), config.samples_per_chip.max(1));
        }
        let amplitude = envelope.get(n % period).copied().unwrap_or(0.0) * config.pulse_amplitude;
        let phase = 2.0 * PI * config.carrier * n as f32;
        let i = config.dc_offset + amplitude * phase.cos() + jitter(&mut rng, config.noise);
        let q = config.dc_offset + amplitude * phase.sin() + jitter(&mut rng, config.noise);
        samples.push((i, q));
    }
    samples
}

fn jitter(rng: &mut StdRng, noise: f32) -> f32 {
    if noise > 0.0 {
        rng.gen_range(-noise..noise)
    } else {
        0.0
    }
}

/// Quantizes to offset-binary 12-bit codes stored as little-endian 16-bit words.
pub fn build_raw_u12(config: &GeneratorConfig) -> anyhow::Result<Vec<u8>> {
    let byte_count = config
        .samples
        .checked_mul(4)
        .context("overflow computing byte count for generator")?;
    let half = (MAX_CODE + 1.0) / 2.0 - 0.5;

    let mut bytes = Vec::with_capacity(byte_count);
    for (i, q) in build_iq(config) {
        for value in [i, q] {
            let code = (value * half + half).round().clamp(0.0, MAX_CODE) as u16;
            bytes.extend_from_slice(&code.to_le_bytes());
        }
    }
    Ok(bytes)
}
