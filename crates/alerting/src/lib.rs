//! Alerting System
//!
//! Turns drowsiness alert edges into exactly-once calls on pluggable sinks
//! (log, terminal bell, or an external audio / UI backend).

mod manager;
mod sink;

pub use manager::{AlertConfig, AlertEvent, AlertManager};
pub use sink::{AlertSink, BellSink, LogSink};

use thiserror::Error;

/// Alert delivery errors
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Alert sink {sink} failed: {message}")]
    Sink { sink: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
