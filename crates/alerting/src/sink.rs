//! Alert sinks

use std::io::Write;
use std::time::Duration;

use tracing::{info, warn};

use crate::AlertError;

/// Destination for alert edges (audio, display, log, ...)
pub trait AlertSink: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Sustained closure crossed the alert threshold
    fn on_raised(&mut self, closed_for: Duration, blink_count: u64) -> Result<(), AlertError>;

    /// Eyes reopened after an alert
    fn on_cleared(&mut self, closed_for: Duration) -> Result<(), AlertError>;
}

/// Writes alerts to the tracing log
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn on_raised(&mut self, closed_for: Duration, blink_count: u64) -> Result<(), AlertError> {
        warn!(
            closed_for_ms = closed_for.as_millis() as u64,
            blink_count, "DROWSINESS ALERT TRIGGERED!"
        );
        Ok(())
    }

    fn on_cleared(&mut self, closed_for: Duration) -> Result<(), AlertError> {
        info!(closed_for_ms = closed_for.as_millis() as u64, "Drowsiness alert cleared");
        Ok(())
    }
}

/// Rings the terminal bell once per raised alert
pub struct BellSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> BellSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl BellSink<std::io::Stderr> {
    /// Bell on stderr, keeping stdout free for event output
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> AlertSink for BellSink<W> {
    fn name(&self) -> &str {
        "bell"
    }

    fn on_raised(&mut self, _closed_for: Duration, _blink_count: u64) -> Result<(), AlertError> {
        self.out.write_all(b"\x07")?;
        self.out.flush()?;
        Ok(())
    }

    fn on_cleared(&mut self, _closed_for: Duration) -> Result<(), AlertError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_rings_only_on_raise() {
        let mut bell = BellSink::new(Vec::new());
        bell.on_raised(Duration::from_secs(5), 3).unwrap();
        bell.on_cleared(Duration::from_secs(6)).unwrap();
        assert_eq!(bell.into_inner(), b"\x07".to_vec());
    }

    #[test]
    fn test_log_sink_never_fails() {
        let mut log = LogSink;
        assert!(log.on_raised(Duration::from_secs(5), 1).is_ok());
        assert!(log.on_cleared(Duration::from_secs(5)).is_ok());
        assert_eq!(log.name(), "log");
    }
}
