//! Bridge to the external pulse-position decoder.
//!
//! The exchange is one synchronous request/response: the whole magnitude
//! stream goes to the decoder's stdin, then everything it prints is read
//! until it exits. Any failure fails the call as a unit.

use crate::interface::record::RecordSummary;
use crate::prelude::ConfigError;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

#[derive(thiserror::Error, Debug)]
pub enum SubprocessError {
    #[error("failed to launch decoder {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write magnitude stream to decoder: {0}")]
    Write(#[source] io::Error),
    #[error("failed to read decoder output: {0}")]
    Read(#[source] io::Error),
    #[error("decoder exited abnormally ({0})")]
    AbnormalExit(ExitStatus),
}

/// Everything the decoder printed on stdout.
#[derive(Debug, Clone, Default)]
pub struct DecoderOutput {
    pub stdout: Vec<u8>,
}

impl DecoderOutput {
    pub fn summary(&self) -> RecordSummary {
        RecordSummary::from_output(&self.stdout)
    }
}

/// Program and arguments used to launch the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl DecoderCommand {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Picks the decoder build for the input rate and asks it for magnitude
    /// input, adding an upsampling factor when it differs from the input rate.
    pub fn for_rate(
        dir: &Path,
        input_rate: u32,
        upsample_rate: Option<u32>,
    ) -> Result<Self, ConfigError> {
        let binary = match input_rate {
            2_400_000 => "stream1090",
            6_000_000 => "stream1090_6M",
            10_000_000 => "stream1090_10M",
            other => return Err(ConfigError::UnsupportedRate(other)),
        };

        let mut command = Self::new(dir.join(binary)).arg("-m");
        if let Some(upsample) = upsample_rate.filter(|&rate| rate != input_rate) {
            command = command.arg("-u").arg((upsample / 1_000_000).to_string());
        }
        Ok(command)
    }

    pub fn run(&self, magnitudes: &[u8]) -> Result<DecoderOutput, SubprocessError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SubprocessError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            SubprocessError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "decoder stdin not captured",
            ))
        })?;

        // Feed stdin from a second thread so a chatty decoder cannot fill its
        // stdout pipe while we are still writing.
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || -> io::Result<()> {
                stdin.write_all(magnitudes)?;
                stdin.flush()
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });

        let output = output.map_err(SubprocessError::Read)?;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(SubprocessError::Write(err)),
            Err(_) => {
                return Err(SubprocessError::Write(io::Error::new(
                    io::ErrorKind::Other,
                    "decoder writer thread panicked",
                )))
            }
        }
        if !output.status.success() {
            return Err(SubprocessError::AbnormalExit(output.status));
        }

        Ok(DecoderOutput {
            stdout: output.stdout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_selects_binary_and_flags() {
        let dir = Path::new("build");
        let plain = DecoderCommand::for_rate(dir, 6_000_000, None).unwrap();
        assert_eq!(plain.program, dir.join("stream1090_6M"));
        assert_eq!(plain.args, vec!["-m"]);

        let upsampled = DecoderCommand::for_rate(dir, 10_000_000, Some(24_000_000)).unwrap();
        assert_eq!(upsampled.program, dir.join("stream1090_10M"));
        assert_eq!(upsampled.args, vec!["-m", "-u", "24"]);

        let same = DecoderCommand::for_rate(dir, 2_400_000, Some(2_400_000)).unwrap();
        assert_eq!(same.args, vec!["-m"]);
    }

    #[test]
    fn unknown_rate_is_a_config_error() {
        assert_eq!(
            DecoderCommand::for_rate(Path::new("."), 8_000_000, None).unwrap_err(),
            ConfigError::UnsupportedRate(8_000_000)
        );
    }

    #[test]
    fn missing_program_fails_to_launch() {
        let err = DecoderCommand::new("/nonexistent/stream1090")
            .run(&[0u8; 4])
            .unwrap_err();
        assert!(matches!(err, SubprocessError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn decoder_output_is_collected_after_input() {
        let command = DecoderCommand::new("sh")
            .arg("-c")
            .arg("wc -c; printf '@0000000000018D4840D6202CC3;\\n@000000000002A8000000;\\n'");
        let output = command.run(&[0u8; 4096]).unwrap();
        let text = String::from_utf8(output.stdout.clone()).unwrap();

        assert_eq!(text.lines().next().unwrap().trim(), "4096");
        assert_eq!(output.summary().records, 2);
        assert_eq!(output.summary().extended_squitter, 1);
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_abnormal() {
        let command = DecoderCommand::new("sh").arg("-c").arg("cat > /dev/null; exit 3");
        let err = command.run(&[1u8; 16]).unwrap_err();
        assert!(matches!(err, SubprocessError::AbnormalExit(_)));
    }
}
