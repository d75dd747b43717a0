use serde::{Deserialize, Serialize};

/// First byte of every decoded message record.
pub const RECORD_MARKER: u8 = b'@';
/// Hex digits of the timestamp that follows the marker.
pub const TIMESTAMP_DIGITS: usize = 12;

/// Counts of the line-oriented records emitted by the external decoder.
/// Payloads are never interpreted beyond their first nibble.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub records: usize,
    /// Records whose payload starts with downlink format 17.
    pub extended_squitter: usize,
    pub other_lines: usize,
}

impl RecordSummary {
    pub fn from_output(output: &[u8]) -> Self {
        let mut summary = Self::default();
        for line in lines(output) {
            if line.first() == Some(&RECORD_MARKER) {
                summary.records += 1;
                if line.get(1 + TIMESTAMP_DIGITS) == Some(&b'8') {
                    summary.extended_squitter += 1;
                }
            } else {
                summary.other_lines += 1;
            }
        }
        summary
    }
}

/// Record lines of a decoder output, in order, for forwarding.
pub fn record_lines(output: &[u8]) -> impl Iterator<Item = &[u8]> {
    lines(output).filter(|line| line.first() == Some(&RECORD_MARKER))
}

fn lines(output: &[u8]) -> impl Iterator<Item = &[u8]> {
    output
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &[u8] = b"@0000001A2B3C8D4840D6202CC371C32CE0576098;\r\n\
@0000001A2B405D4840D6E1A2B3;\n\
stats: 2 messages\n\
\n\
@0000001A2C0002E197B00179C3;\n";

    #[test]
    fn counts_records_and_extended_squitter() {
        let summary = RecordSummary::from_output(OUTPUT);
        assert_eq!(
            summary,
            RecordSummary {
                records: 3,
                extended_squitter: 1,
                other_lines: 1,
            }
        );
    }

    #[test]
    fn record_lines_are_forwarded_verbatim() {
        let lines: Vec<&[u8]> = record_lines(OUTPUT).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], b"@0000001A2B405D4840D6E1A2B3;");
    }

    #[test]
    fn empty_output_has_no_records() {
        assert_eq!(RecordSummary::from_output(b""), RecordSummary::default());
    }
}
