//! Streaming signal-conditioning core for 1090 MHz receiver samples.
//!
//! Raw I/Q words (or pre-computed magnitudes) are decoded, optionally
//! DC-blocked and bias corrected, FIR filtered in either the I/Q or the
//! magnitude domain and reduced to the flat magnitude stream consumed by the
//! external pulse-position decoder. Processing a stream chunk by chunk gives
//! the same output as processing it in one pass.

pub mod config;
pub mod interface;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use config::{DcBlockConfig, PipelineConfig, ProcessingOrder};
pub use pipeline::{MagnitudeStream, Pipeline, PipelineError};
pub use prelude::{ProcessingStage, SampleChunk, SampleDomain, StageKind};
