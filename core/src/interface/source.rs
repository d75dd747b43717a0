use crate::prelude::FormatError;
use crate::processing::decode::SampleFormat;
use std::io::{ErrorKind, Read};

/// Lazily splits a byte source into chunks of whole samples.
///
/// Every chunk holds exactly `chunk_samples` samples except the last one,
/// which may be shorter. A trailing partial word is left for the decoder to
/// reject.
pub struct ChunkReader<R> {
    reader: R,
    chunk_bytes: usize,
    finished: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R, format: &SampleFormat, chunk_samples: usize) -> Self {
        Self {
            reader,
            chunk_bytes: chunk_samples.max(1) * format.bytes_per_sample(),
            finished: false,
        }
    }

    pub fn chunk_bytes(&self) -> usize {
        self.chunk_bytes
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Vec<u8>, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buffer = vec![0u8; self.chunk_bytes];
        let mut filled = 0;
        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err.into()));
                }
            }
        }

        if filled < buffer.len() {
            self.finished = true;
        }
        if filled == 0 {
            return None;
        }
        buffer.truncate(filled);
        Some(Ok(buffer))
    }
}
