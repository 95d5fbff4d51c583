use llmo_cli::helpers::load_config::LoggingConfig;
use llmo_cli::instrumentation::tracing::LoggingContext;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// In-memory log sink shared across threads.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Captured {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Logging context with default settings writing into this sink.
    pub fn context(&self) -> LoggingContext {
        let sink = self.clone();
        LoggingContext::with_writer(
            &LoggingConfig::default(),
            BoxMakeWriter::new(move || sink.clone()),
        )
        .unwrap()
    }
}
