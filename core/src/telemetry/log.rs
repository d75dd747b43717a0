use log::{debug, info, warn};

/// Thin wrapper over the `log` facade, tagged with the owning stream.
pub struct LogManager {
    stream: String,
}

impl LogManager {
    pub fn new() -> Self {
        Self::for_stream("stream")
    }

    pub fn for_stream(name: &str) -> Self {
        Self {
            stream: name.to_string(),
        }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.stream, message);
    }

    pub fn detail(&self, message: &str) {
        debug!("[{}] {}", self.stream, message);
    }

    pub fn warn(&self, message: &str) {
        warn!("[{}] {}", self.stream, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}
