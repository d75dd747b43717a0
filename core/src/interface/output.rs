use std::io::{self, Write};

/// Encodes magnitudes as the decoder expects them: little-endian f32, no
/// header, no framing.
pub fn encode_magnitudes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn write_magnitudes<W: Write>(writer: &mut W, samples: &[f32]) -> io::Result<()> {
    for sample in samples {
        writer.write_all(&sample.to_le_bytes())?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_flat_little_endian() {
        let bytes = encode_magnitudes(&[1.0, -2.5]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-2.5f32).to_le_bytes());
    }

    #[test]
    fn writer_matches_encoder() {
        let samples = [0.125, 0.5, 3.0];
        let mut sink = Vec::new();
        write_magnitudes(&mut sink, &samples).unwrap();
        assert_eq!(sink, encode_magnitudes(&samples));
    }
}
