/// Runs one block of a real FIR filter against the carried input history.
///
/// `history` holds the last `taps.len() - 1` inputs of the previous block
/// (zeros at stream start). Returns the block output and the history to
/// carry into the next block.
pub fn filter_block(taps: &[f32], history: &[f32], input: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let order = taps.len().saturating_sub(1);
    debug_assert_eq!(history.len(), order);

    let mut extended = Vec::with_capacity(order + input.len());
    extended.extend_from_slice(history);
    extended.extend_from_slice(input);

    let output = (0..input.len())
        .map(|n| {
            taps.iter()
                .enumerate()
                .fold(0.0f32, |acc, (k, &h)| acc + h * extended[n + order - k])
        })
        .collect();
    let next_history = extended[extended.len() - order..].to_vec();

    (output, next_history)
}
