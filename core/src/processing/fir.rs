//! Stateful FIR filtering in either the I/Q or the magnitude domain.
//!
//! Each channel keeps the last `N - 1` inputs as history, so filtering a
//! stream chunk by chunk yields the same output as convolving it in one go,
//! whatever the chunk lengths (including chunks shorter than the filter).

use crate::math::convolve::filter_block;
use crate::prelude::{
    ConfigError, FormatError, ProcessingStage, SampleChunk, SampleDomain, StageKind,
    StageResult, StateError,
};
use num_complex::Complex32;
use std::fs;
use std::path::Path;

/// Tap set together with the domain it is meant to run in.
#[derive(Debug, Clone, PartialEq)]
pub struct FirCoefficients {
    taps: Vec<f32>,
    domain: SampleDomain,
}

impl FirCoefficients {
    pub fn new(taps: Vec<f32>, domain: SampleDomain) -> Result<Self, ConfigError> {
        if taps.is_empty() {
            return Err(ConfigError::EmptyTaps);
        }
        let sum: f32 = taps.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return Err(ConfigError::NonPositiveTapSum(sum));
        }
        Ok(Self { taps, domain })
    }

    /// Single unit tap: passes samples through untouched.
    pub fn identity(domain: SampleDomain) -> Self {
        Self {
            taps: vec![1.0],
            domain,
        }
    }

    /// Parses a tap file (one float per line, `#` comments allowed) and
    /// normalizes the taps to unity DC gain.
    pub fn parse(text: &str, domain: SampleDomain) -> Result<Self, FormatError> {
        let mut taps = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let tap = trimmed.parse::<f32>().map_err(|_| FormatError::TapParse {
                line: index + 1,
                text: trimmed.to_string(),
            })?;
            taps.push(tap);
        }

        if taps.is_empty() {
            return Err(FormatError::EmptyTapFile);
        }
        let sum: f32 = taps.iter().sum();
        if sum == 0.0 || !sum.is_finite() {
            return Err(FormatError::TapSum(sum));
        }
        for tap in taps.iter_mut() {
            *tap /= sum;
        }
        if taps.iter().any(|tap| !tap.is_finite()) {
            return Err(FormatError::TapSum(sum));
        }
        Ok(Self { taps, domain })
    }

    pub fn load<P: AsRef<Path>>(path: P, domain: SampleDomain) -> Result<Self, FormatError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, domain)
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn domain(&self) -> SampleDomain {
        self.domain
    }

    /// Number of history values each channel carries.
    pub fn state_len(&self) -> usize {
        self.taps.len().saturating_sub(1)
    }

    pub fn dc_gain(&self) -> f32 {
        self.taps.iter().sum()
    }

    pub fn nyquist_gain(&self) -> f32 {
        self.taps
            .iter()
            .enumerate()
            .map(|(k, &h)| if k % 2 == 0 { h } else { -h })
            .sum()
    }
}

/// History of one channel, exactly `taps - 1` values long.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    history: Vec<f32>,
}

impl FilterState {
    pub fn zeroed(len: usize) -> Self {
        Self {
            history: vec![0.0; len],
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Cold-restarts the state when it no longer fits `len`.
    fn conform(&mut self, len: usize) -> Option<StateError> {
        if self.history.len() == len {
            return None;
        }
        let mismatch = StateError {
            expected: len,
            found: self.history.len(),
        };
        self.history = vec![0.0; len];
        Some(mismatch)
    }

    fn clear(&mut self) {
        self.history.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Per-channel states; the layout follows the filter's domain.
#[derive(Debug, Clone, PartialEq)]
pub enum FirStates {
    Iq { i: FilterState, q: FilterState },
    Magnitude(FilterState),
}

impl FirStates {
    fn zeroed(domain: SampleDomain, len: usize) -> Self {
        match domain {
            SampleDomain::Iq => FirStates::Iq {
                i: FilterState::zeroed(len),
                q: FilterState::zeroed(len),
            },
            SampleDomain::Magnitude => FirStates::Magnitude(FilterState::zeroed(len)),
        }
    }

    fn channels_mut(&mut self) -> Vec<&mut FilterState> {
        match self {
            FirStates::Iq { i, q } => vec![i, q],
            FirStates::Magnitude(state) => vec![state],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirFilter {
    coefficients: FirCoefficients,
    states: FirStates,
}

impl FirFilter {
    pub fn new(coefficients: FirCoefficients) -> Self {
        let states = FirStates::zeroed(coefficients.domain(), coefficients.state_len());
        Self {
            coefficients,
            states,
        }
    }

    pub fn coefficients(&self) -> &FirCoefficients {
        &self.coefficients
    }

    pub fn domain(&self) -> SampleDomain {
        self.coefficients.domain()
    }

    pub fn states(&self) -> &FirStates {
        &self.states
    }

    /// Swaps in a new tap set of the same domain.
    ///
    /// History that still has the right length is kept, it is the true input
    /// history of the stream. Otherwise every channel is reset to zeros and
    /// the mismatch is handed back for logging.
    pub fn set_coefficients(
        &mut self,
        coefficients: FirCoefficients,
    ) -> Result<Option<StateError>, ConfigError> {
        if coefficients.domain() != self.domain() {
            return Err(ConfigError::DomainMismatch {
                stage: StageKind::Fir,
                expected: self.domain(),
                found: coefficients.domain(),
            });
        }
        let len = coefficients.state_len();
        self.coefficients = coefficients;

        let mut mismatch = None;
        for state in self.states.channels_mut() {
            if let Some(err) = state.conform(len) {
                mismatch.get_or_insert(err);
            }
        }
        Ok(mismatch)
    }

    fn run_channel(&self, state: &FilterState, input: &[f32]) -> (Vec<f32>, FilterState) {
        let (output, history) = filter_block(self.coefficients.taps(), state.values(), input);
        (output, FilterState { history })
    }
}

impl ProcessingStage for FirFilter {
    fn kind(&self) -> StageKind {
        StageKind::Fir
    }

    fn execute(&mut self, chunk: SampleChunk) -> StageResult<SampleChunk> {
        if chunk.domain() != self.domain() {
            return Err(ConfigError::DomainMismatch {
                stage: StageKind::Fir,
                expected: self.domain(),
                found: chunk.domain(),
            }
            .into());
        }

        let (output, states) = match (&chunk, &self.states) {
            (SampleChunk::Iq(samples), FirStates::Iq { i, q }) => {
                let in_i: Vec<f32> = samples.iter().map(|s| s.re).collect();
                let in_q: Vec<f32> = samples.iter().map(|s| s.im).collect();
                let (out_i, next_i) = self.run_channel(i, &in_i);
                let (out_q, next_q) = self.run_channel(q, &in_q);
                let output = out_i
                    .into_iter()
                    .zip(out_q)
                    .map(|(re, im)| Complex32::new(re, im))
                    .collect();
                (
                    SampleChunk::Iq(output),
                    FirStates::Iq {
                        i: next_i,
                        q: next_q,
                    },
                )
            }
            (SampleChunk::Magnitude(samples), FirStates::Magnitude(state)) => {
                let (output, next) = self.run_channel(state, samples);
                (SampleChunk::Magnitude(output), FirStates::Magnitude(next))
            }
            _ => {
                return Err(ConfigError::DomainMismatch {
                    stage: StageKind::Fir,
                    expected: self.domain(),
                    found: chunk.domain(),
                }
                .into())
            }
        };

        self.states = states;
        Ok(output)
    }

    fn reset(&mut self) {
        for state in self.states.channels_mut() {
            state.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Direct-form convolution of the whole signal, truncated to its length.
    fn reference(taps: &[f32], signal: &[f32]) -> Vec<f32> {
        (0..signal.len())
            .map(|n| {
                (0..taps.len())
                    .filter(|&k| k <= n)
                    .map(|k| taps[k] * signal[n - k])
                    .sum()
            })
            .collect()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (n, (a, e)) in actual.iter().zip(expected).enumerate() {
            let tolerance = 1e-5 * e.abs().max(1.0);
            assert!((a - e).abs() <= tolerance, "sample {}: {} vs {}", n, a, e);
        }
    }

    fn random_partition(rng: &mut StdRng, total: usize, max_len: usize) -> Vec<usize> {
        let mut lengths = Vec::new();
        let mut remaining = total;
        while remaining > 0 {
            let len = rng.gen_range(1..=max_len.min(remaining));
            lengths.push(len);
            remaining -= len;
        }
        lengths
    }

    #[test]
    fn chunked_magnitude_filtering_matches_single_pass() {
        let mut rng = StdRng::seed_from_u64(7);
        let taps: Vec<f32> = (0..31).map(|_| rng.gen_range(-0.2..0.6)).collect();
        let coefficients = FirCoefficients::new(taps.clone(), SampleDomain::Magnitude).unwrap();
        let signal: Vec<f32> = (0..2_000).map(|_| rng.gen_range(0.0..1.0)).collect();
        let expected = reference(&taps, &signal);

        for round in 0..5 {
            let mut filter = FirFilter::new(coefficients.clone());
            let mut collected = Vec::new();
            let mut offset = 0;
            for len in random_partition(&mut rng, signal.len(), 10 + round * 40) {
                let chunk = SampleChunk::Magnitude(signal[offset..offset + len].to_vec());
                match filter.execute(chunk).unwrap() {
                    SampleChunk::Magnitude(out) => collected.extend(out),
                    other => panic!("unexpected chunk {:?}", other),
                }
                offset += len;
            }
            assert_close(&collected, &expected);
        }
    }

    #[test]
    fn iq_channels_are_filtered_independently() {
        let mut rng = StdRng::seed_from_u64(11);
        let taps = vec![0.1, 0.3, 0.4, 0.2, -0.05];
        let i: Vec<f32> = (0..300).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let q: Vec<f32> = (0..300).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut filter =
            FirFilter::new(FirCoefficients::new(taps.clone(), SampleDomain::Iq).unwrap());
        let mut out_i = Vec::new();
        let mut out_q = Vec::new();
        for range in [0..1, 1..3, 3..150, 150..151, 151..300] {
            let chunk = SampleChunk::from_channels(&i[range.clone()], &q[range]);
            let (ci, cq) = filter.execute(chunk).unwrap().channels().unwrap();
            out_i.extend(ci);
            out_q.extend(cq);
        }

        assert_close(&out_i, &reference(&taps, &i));
        assert_close(&out_q, &reference(&taps, &q));
        match filter.states() {
            FirStates::Iq { i: si, q: sq } => {
                assert_eq!(si.values(), &i[296..]);
                assert_eq!(sq.values(), &q[296..]);
            }
            other => panic!("unexpected states {:?}", other),
        }
    }

    #[test]
    fn identity_filter_passes_input_without_state() {
        for domain in [SampleDomain::Iq, SampleDomain::Magnitude] {
            let mut filter = FirFilter::new(FirCoefficients::identity(domain));
            let chunk = match domain {
                SampleDomain::Iq => SampleChunk::from_channels(&[0.25, -0.5], &[0.75, 1.0]),
                SampleDomain::Magnitude => SampleChunk::Magnitude(vec![0.25, 0.5, 2.0]),
            };
            assert_eq!(filter.execute(chunk.clone()).unwrap(), chunk);
            let lengths: Vec<usize> = match filter.states() {
                FirStates::Iq { i, q } => vec![i.len(), q.len()],
                FirStates::Magnitude(state) => vec![state.len()],
            };
            assert!(lengths.iter().all(|&len| len == 0));
        }
    }

    #[test]
    fn single_tap_scales_samples() {
        let mut filter = FirFilter::new(
            FirCoefficients::new(vec![0.5], SampleDomain::Magnitude).unwrap(),
        );
        let output = filter.execute(SampleChunk::Magnitude(vec![2.0, 4.0])).unwrap();
        assert_eq!(output, SampleChunk::Magnitude(vec![1.0, 2.0]));
    }

    #[test]
    fn empty_and_non_positive_tap_sets_are_rejected() {
        assert_eq!(
            FirCoefficients::new(vec![], SampleDomain::Iq).unwrap_err(),
            ConfigError::EmptyTaps
        );
        assert!(matches!(
            FirCoefficients::new(vec![0.5, -0.5], SampleDomain::Iq),
            Err(ConfigError::NonPositiveTapSum(_))
        ));
    }

    #[test]
    fn domain_mismatch_leaves_state_untouched() {
        let mut filter = FirFilter::new(
            FirCoefficients::new(vec![0.5, 0.5], SampleDomain::Magnitude).unwrap(),
        );
        filter.execute(SampleChunk::Magnitude(vec![1.0, 3.0])).unwrap();
        let before = filter.states().clone();

        let err = filter
            .execute(SampleChunk::from_channels(&[1.0], &[1.0]))
            .unwrap_err();
        assert!(err.to_string().contains("fir stage expects magnitude"));
        assert_eq!(filter.states(), &before);
    }

    #[test]
    fn replacing_taps_with_new_length_resets_state() {
        let mut filter = FirFilter::new(
            FirCoefficients::new(vec![0.25; 4], SampleDomain::Magnitude).unwrap(),
        );
        filter.execute(SampleChunk::Magnitude(vec![1.0; 8])).unwrap();

        let mismatch = filter
            .set_coefficients(
                FirCoefficients::new(vec![0.5, 0.5], SampleDomain::Magnitude).unwrap(),
            )
            .unwrap();
        assert_eq!(mismatch, Some(StateError { expected: 1, found: 3 }));
        assert_eq!(filter.states(), &FirStates::Magnitude(FilterState::zeroed(1)));

        let output = filter.execute(SampleChunk::Magnitude(vec![2.0])).unwrap();
        assert_eq!(output, SampleChunk::Magnitude(vec![1.0]));
    }

    #[test]
    fn replacing_taps_with_same_length_keeps_history() {
        let mut filter = FirFilter::new(
            FirCoefficients::new(vec![0.5, 0.5], SampleDomain::Magnitude).unwrap(),
        );
        filter.execute(SampleChunk::Magnitude(vec![4.0])).unwrap();
        let mismatch = filter
            .set_coefficients(
                FirCoefficients::new(vec![0.0, 1.0], SampleDomain::Magnitude).unwrap(),
            )
            .unwrap();
        assert_eq!(mismatch, None);
        let output = filter.execute(SampleChunk::Magnitude(vec![0.0])).unwrap();
        assert_eq!(output, SampleChunk::Magnitude(vec![4.0]));

        assert!(filter
            .set_coefficients(FirCoefficients::identity(SampleDomain::Iq))
            .is_err());
    }

    #[test]
    fn reset_zeroes_history() {
        let mut filter = FirFilter::new(
            FirCoefficients::new(vec![0.5, 0.5], SampleDomain::Iq).unwrap(),
        );
        filter
            .execute(SampleChunk::from_channels(&[1.0], &[2.0]))
            .unwrap();
        filter.reset();
        assert_eq!(
            filter.states(),
            &FirStates::Iq {
                i: FilterState::zeroed(1),
                q: FilterState::zeroed(1),
            }
        );
    }

    #[test]
    fn tap_file_is_parsed_and_normalized() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"# best filter\n1.0\n2.0\n\n1.0\n").unwrap();
        let coefficients = FirCoefficients::load(file.path(), SampleDomain::Magnitude).unwrap();
        assert_eq!(coefficients.taps(), &[0.25, 0.5, 0.25]);
        assert_eq!(coefficients.dc_gain(), 1.0);
        assert_eq!(coefficients.nyquist_gain(), 0.0);
        assert_eq!(coefficients.state_len(), 2);
    }

    #[test]
    fn zero_sum_and_malformed_tap_files_are_rejected() {
        assert!(matches!(
            FirCoefficients::parse("0.5\n-0.5\n", SampleDomain::Iq),
            Err(FormatError::TapSum(_))
        ));
        assert!(matches!(
            FirCoefficients::parse("0.5\nabc\n", SampleDomain::Iq),
            Err(FormatError::TapParse { line: 2, .. })
        ));
        assert!(matches!(
            FirCoefficients::parse("\n\n", SampleDomain::Iq),
            Err(FormatError::EmptyTapFile)
        ));
    }

    #[test]
    fn nearly_cancelling_tap_sum_is_rejected() {
        let err = FirCoefficients::parse("3e38\n-3e38\n1e-30\n", SampleDomain::Magnitude)
            .unwrap_err();
        assert!(matches!(err, FormatError::TapSum(sum) if sum == 1e-30));
    }
}
