use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::config::LogFormat;

/// Handler-facing log writer.
///
/// Lines go to stdout by default, where the platform collects them. With
/// [`LogFormat::Json`] each line is wrapped as `{"level":..,"message":..}`.
#[derive(Clone)]
pub struct Logger {
    format: LogFormat,
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub fn stdout(format: LogFormat) -> Self {
        Self::with_sink(format, std::io::stdout())
    }

    pub fn with_sink(format: LogFormat, sink: impl Write + Send + 'static) -> Self {
        Self {
            format,
            sink: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn log(&self, message: &str) {
        self.write_line("INFO", message);
    }

    pub fn error(&self, message: &str) {
        self.write_line("ERROR", message);
    }

    /// Write bytes as-is, bypassing the JSON envelope.
    pub fn log_bytes(&self, bytes: &[u8]) {
        self.write_raw(bytes);
    }

    fn write_line(&self, level: &str, message: &str) {
        let mut line = match self.format {
            LogFormat::Text => message.to_string(),
            LogFormat::Json => {
                serde_json::json!({ "level": level, "message": message }).to_string()
            }
        };
        line.push('\n');
        self.write_raw(line.as_bytes());
    }

    fn write_raw(&self, bytes: &[u8]) {
        let mut sink = self
            .sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = sink.write_all(bytes).and_then(|()| sink.flush()) {
            tracing::warn!(error = %e, "Failed to write handler log line");
        }
    }
}

/// In-memory sink that can be cloned into a [`Logger`] and read back.
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
