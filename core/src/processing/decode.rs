use crate::prelude::{FormatError, SampleChunk, SampleDomain};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

/// How the logical value of a word is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    Unsigned,
    Signed,
    Float,
}

impl Encoding {
    fn name(self) -> &'static str {
        match self {
            Encoding::Unsigned => "unsigned",
            Encoding::Signed => "signed",
            Encoding::Float => "float",
        }
    }
}

/// Layout of a raw sample buffer. All multi-byte words are little-endian.
///
/// Deserialized layouts go through [`SampleFormat::new`], so every value of
/// this type has a width the decoder can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SampleFormatRecord")]
pub struct SampleFormat {
    storage_bits: u8,
    effective_bits: u8,
    encoding: Encoding,
    interleaved: bool,
}

/// Unchecked wire form of [`SampleFormat`].
#[derive(Deserialize)]
struct SampleFormatRecord {
    storage_bits: u8,
    effective_bits: u8,
    encoding: Encoding,
    interleaved: bool,
}

impl TryFrom<SampleFormatRecord> for SampleFormat {
    type Error = FormatError;

    fn try_from(record: SampleFormatRecord) -> Result<Self, Self::Error> {
        SampleFormat::new(
            record.storage_bits,
            record.effective_bits,
            record.encoding,
            record.interleaved,
        )
    }
}

impl SampleFormat {
    /// RTL-SDR style unsigned 8-bit I/Q.
    pub const RAW_U8: Self = Self {
        storage_bits: 8,
        effective_bits: 8,
        encoding: Encoding::Unsigned,
        interleaved: true,
    };

    /// Unsigned 12-bit I/Q carried in 16-bit words (Airspy/HackRF raw dumps).
    pub const RAW_U12_IN_16: Self = Self {
        storage_bits: 16,
        effective_bits: 12,
        encoding: Encoding::Unsigned,
        interleaved: true,
    };

    /// Signed 16-bit I/Q.
    pub const RAW_S16: Self = Self {
        storage_bits: 16,
        effective_bits: 16,
        encoding: Encoding::Signed,
        interleaved: true,
    };

    /// Pre-computed float magnitude.
    pub const MAGNITUDE_F32: Self = Self {
        storage_bits: 32,
        effective_bits: 32,
        encoding: Encoding::Float,
        interleaved: false,
    };

    /// Interleaved float I/Q, passed through without scaling.
    pub const IQ_F32: Self = Self {
        storage_bits: 32,
        effective_bits: 32,
        encoding: Encoding::Float,
        interleaved: true,
    };

    pub fn new(
        storage_bits: u8,
        effective_bits: u8,
        encoding: Encoding,
        interleaved: bool,
    ) -> Result<Self, FormatError> {
        let consistent = match encoding {
            Encoding::Float => storage_bits == 32 && effective_bits == 32,
            Encoding::Unsigned | Encoding::Signed => {
                matches!(storage_bits, 8 | 16) && (1..=storage_bits).contains(&effective_bits)
            }
        };
        if !consistent {
            return Err(FormatError::BitWidth {
                storage: storage_bits,
                effective: effective_bits,
                encoding: encoding.name(),
            });
        }
        Ok(Self {
            storage_bits,
            effective_bits,
            encoding,
            interleaved,
        })
    }

    /// Looks up one of the known layouts by name.
    pub fn from_name(name: &str) -> Result<Self, FormatError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "u8" | "raw8" | "rtl-sdr" | "rtlsdr" => Ok(Self::RAW_U8),
            "u16" | "raw16" | "airspy" | "hackrf" => Ok(Self::RAW_U12_IN_16),
            "s16" | "raw16s" | "i16" => Ok(Self::RAW_S16),
            "mag" | "magnitude" | "f32" => Ok(Self::MAGNITUDE_F32),
            "cf32" | "iq-f32" => Ok(Self::IQ_F32),
            _ => Err(FormatError::UnknownFormat(name.to_string())),
        }
    }

    /// Raw layout implied by the receiver sample rate: 2.4 MHz recordings come
    /// from 8-bit dongles, everything else from 12-bit front ends.
    pub fn for_sample_rate(rate_hz: u32) -> Self {
        if rate_hz == 2_400_000 {
            Self::RAW_U8
        } else {
            Self::RAW_U12_IN_16
        }
    }

    pub fn storage_bits(&self) -> u8 {
        self.storage_bits
    }

    pub fn effective_bits(&self) -> u8 {
        self.effective_bits
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn is_interleaved(&self) -> bool {
        self.interleaved
    }

    pub fn domain(&self) -> SampleDomain {
        if self.interleaved {
            SampleDomain::Iq
        } else {
            SampleDomain::Magnitude
        }
    }

    pub fn bytes_per_word(&self) -> usize {
        usize::from(self.storage_bits / 8)
    }

    /// Bytes making up one output sample (an I/Q pair or one magnitude).
    pub fn bytes_per_sample(&self) -> usize {
        let words = if self.interleaved { 2 } else { 1 };
        self.bytes_per_word() * words
    }

    fn read_word(&self, bytes: &[u8]) -> Result<u32, FormatError> {
        match (self.storage_bits, bytes) {
            (8, [b0]) => Ok(u32::from(*b0)),
            (16, [b0, b1]) => Ok(u32::from(u16::from_le_bytes([*b0, *b1]))),
            (32, [b0, b1, b2, b3]) => Ok(u32::from_le_bytes([*b0, *b1, *b2, *b3])),
            _ => Err(FormatError::BitWidth {
                storage: self.storage_bits,
                effective: self.effective_bits,
                encoding: self.encoding.name(),
            }),
        }
    }

    /// Maps one stored word to a float, centring unsigned ranges on zero.
    pub fn normalize(&self, word: u32) -> f32 {
        let bits = u32::from(self.effective_bits);
        match self.encoding {
            Encoding::Unsigned => {
                let mask = (1u32 << bits) - 1;
                let half = (1u32 << (bits - 1)) as f32;
                ((word & mask) as f32 - half + 0.5) / (half - 0.5)
            }
            Encoding::Signed => {
                let shift = 32 - bits;
                let value = ((word << shift) as i32) >> shift;
                value as f32 / (1u32 << (bits - 1)) as f32
            }
            Encoding::Float => f32::from_bits(word),
        }
    }
}

/// Turns raw byte buffers into normalized sample chunks.
#[derive(Debug, Clone, Copy)]
pub struct SampleDecoder {
    format: SampleFormat,
}

impl SampleDecoder {
    pub fn new(format: SampleFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> &SampleFormat {
        &self.format
    }

    /// Decodes a whole buffer. Interleaved layouts put even words on I and
    /// odd words on Q.
    pub fn decode(&self, bytes: &[u8]) -> Result<SampleChunk, FormatError> {
        let word_bytes = self.format.bytes_per_word();
        let remainder = bytes.len() % word_bytes;
        if remainder != 0 {
            return Err(FormatError::TrailingBytes {
                remainder,
                word_bytes,
            });
        }

        let word_count = bytes.len() / word_bytes;
        if self.format.interleaved && word_count % 2 != 0 {
            return Err(FormatError::OddWordCount(word_count));
        }

        let values = bytes
            .chunks_exact(word_bytes)
            .map(|word| Ok(self.format.normalize(self.format.read_word(word)?)))
            .collect::<Result<Vec<f32>, FormatError>>()?;

        if self.format.interleaved {
            let samples = values
                .chunks_exact(2)
                .map(|pair| Complex32::new(pair[0], pair[1]))
                .collect();
            Ok(SampleChunk::Iq(samples))
        } else {
            Ok(SampleChunk::Magnitude(values))
        }
    }
}
