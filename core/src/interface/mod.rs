pub mod decoder;
pub mod output;
pub mod record;
pub mod source;

pub use decoder::{DecoderCommand, DecoderOutput, SubprocessError};
pub use output::{encode_magnitudes, write_magnitudes};
pub use record::{record_lines, RecordSummary};
pub use source::ChunkReader;
