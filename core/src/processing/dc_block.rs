//! Single-pole DC blocker: `y[n] = x[n] - x[n-1] + (1 - alpha) * y[n-1]`.
//!
//! State starts at zero, so the first outputs carry the usual start-up
//! transient. Splitting a stream into chunks does not change a single bit of
//! the output as long as the state is carried forward.

use crate::prelude::{
    ConfigError, ProcessingStage, SampleChunk, SampleDomain, StageKind, StageResult,
};
use num_complex::Complex32;

/// Recursion memory of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DcState {
    pub prev_input: f32,
    pub prev_output: f32,
}

impl DcState {
    fn step(&mut self, pole: f32, x: f32) -> f32 {
        let y = x - self.prev_input + pole * self.prev_output;
        self.prev_input = x;
        self.prev_output = y;
        y
    }
}

/// I and Q channel states, never shared between streams.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DcStates {
    pub i: DcState,
    pub q: DcState,
}

#[derive(Debug, Clone)]
pub struct DcBlocker {
    alpha: f32,
    state: DcStates,
}

impl DcBlocker {
    pub fn new(alpha: f32) -> Result<Self, ConfigError> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(ConfigError::InvalidAlpha(alpha));
        }
        Ok(Self {
            alpha,
            state: DcStates::default(),
        })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn state(&self) -> DcStates {
        self.state
    }

    /// Filters one block given the incoming state and returns the outgoing
    /// state alongside the output.
    pub fn process(&self, input: &[Complex32], incoming: DcStates) -> (Vec<Complex32>, DcStates) {
        let pole = 1.0 - self.alpha;
        let mut state = incoming;
        let output = input
            .iter()
            .map(|s| {
                Complex32::new(
                    state.i.step(pole, s.re),
                    state.q.step(pole, s.im),
                )
            })
            .collect();
        (output, state)
    }
}

impl ProcessingStage for DcBlocker {
    fn kind(&self) -> StageKind {
        StageKind::DcBlock
    }

    fn execute(&mut self, chunk: SampleChunk) -> StageResult<SampleChunk> {
        match chunk {
            SampleChunk::Iq(samples) => {
                let (output, state) = self.process(&samples, self.state);
                self.state = state;
                Ok(SampleChunk::Iq(output))
            }
            SampleChunk::Magnitude(_) => Err(ConfigError::DomainMismatch {
                stage: StageKind::DcBlock,
                expected: SampleDomain::Iq,
                found: SampleDomain::Magnitude,
            }
            .into()),
        }
    }

    fn reset(&mut self) {
        self.state = DcStates::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(len: usize, i: f32, q: f32) -> Vec<Complex32> {
        vec![Complex32::new(i, q); len]
    }

    #[test]
    fn first_output_is_the_raw_step() {
        let blocker = DcBlocker::new(0.1).unwrap();
        let (output, state) = blocker.process(&constant(2, 0.5, -0.25), DcStates::default());
        assert_eq!(output[0], Complex32::new(0.5, -0.25));
        assert!((output[1].re - 0.45).abs() < 1e-7);
        assert_eq!(state.i.prev_input, 0.5);
        assert_eq!(state.i.prev_output, output[1].re);
    }

    #[test]
    fn constant_input_decays_towards_zero() {
        let alpha = 0.05;
        let mut blocker = DcBlocker::new(alpha).unwrap();
        let output = match blocker.execute(SampleChunk::Iq(constant(400, 0.8, 0.3))).unwrap() {
            SampleChunk::Iq(samples) => samples,
            other => panic!("unexpected chunk {:?}", other),
        };

        // Each step scales the remaining offset by (1 - alpha).
        let expected_at_100 = 0.8 * (1.0f32 - alpha).powi(100);
        assert!((output[100].re - expected_at_100).abs() < 1e-4);
        assert!(output[399].re.abs() < 1e-6);
        assert!(output[399].im.abs() < 1e-6);
    }

    #[test]
    fn chunked_output_is_bit_identical() {
        let input: Vec<Complex32> = (0..97)
            .map(|n| Complex32::new(0.3 + (n as f32 * 0.21).sin(), -0.1 + (n as f32 * 0.07).cos()))
            .collect();

        let mut whole = DcBlocker::new(0.005).unwrap();
        let expected = whole.execute(SampleChunk::Iq(input.clone())).unwrap();

        let mut chunked = DcBlocker::new(0.005).unwrap();
        let mut collected = Vec::new();
        for part in [&input[..1], &input[1..10], &input[10..11], &input[11..64], &input[64..]] {
            if let SampleChunk::Iq(samples) =
                chunked.execute(SampleChunk::Iq(part.to_vec())).unwrap()
            {
                collected.extend(samples);
            }
        }

        assert_eq!(SampleChunk::Iq(collected), expected);
        assert_eq!(chunked.state(), whole.state());
    }

    #[test]
    fn alpha_outside_unit_interval_is_rejected() {
        assert_eq!(DcBlocker::new(0.0).unwrap_err(), ConfigError::InvalidAlpha(0.0));
        assert!(DcBlocker::new(1.0).is_err());
        assert!(DcBlocker::new(f32::NAN).is_err());
    }

    #[test]
    fn magnitude_chunks_are_rejected_without_state_change() {
        let mut blocker = DcBlocker::new(0.01).unwrap();
        blocker.execute(SampleChunk::Iq(constant(3, 0.2, 0.2))).unwrap();
        let before = blocker.state();
        assert!(blocker.execute(SampleChunk::Magnitude(vec![1.0])).is_err());
        assert_eq!(blocker.state(), before);

        blocker.reset();
        assert_eq!(blocker.state(), DcStates::default());
    }
}
