/// On/off pattern of the 8 µs Mode S preamble in 0.5 µs chips: pulses at
/// 0, 1.0, 3.5 and 4.5 µs.
pub const PREAMBLE_CHIPS: [bool; 16] = [
    true, false, true, false, false, false, false, true, false, true, false, false, false, false,
    false, false,
];

/// Preamble followed by pulse-position chips, two per bit: a one is sent as
/// pulse-then-gap, a zero as gap-then-pulse.
pub fn ppm_chips(bits: &[bool]) -> Vec<bool> {
    let mut chips = Vec::with_capacity(PREAMBLE_CHIPS.len() + bits.len() * 2);
    chips.extend_from_slice(&PREAMBLE_CHIPS);
    for &bit in bits {
        chips.push(bit);
        chips.push(!bit);
    }
    chips
}

/// Expands chips into a 0/1 amplitude envelope at `samples_per_chip` samples each.
pub fn chip_envelope(chips: &[bool], samples_per_chip: usize) -> Vec<f32> {
    chips
        .iter()
        .flat_map(|&on| std::iter::repeat(if on { 1.0 } else { 0.0 }).take(samples_per_chip))
        .collect()
}
