//! Alert Manager Implementation

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::sink::{AlertSink, BellSink, LogSink};

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Ring the audible alert on raise
    pub sound_enabled: bool,
    /// Log raise / clear edges
    pub log_enabled: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            log_enabled: true,
        }
    }
}

/// Alert edge reported by the drowsiness state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    Raised { closed_for: Duration, blink_count: u64 },
    Cleared { closed_for: Duration },
}

/// Delivers each alert edge to every sink exactly once
pub struct AlertManager {
    /// Configuration
    config: AlertConfig,
    /// Registered sinks
    sinks: Vec<Box<dyn AlertSink>>,
    /// Alert currently raised
    active: bool,
    /// Number of times raised this session
    fire_count: usize,
}

impl AlertManager {
    /// Create an alert manager with no sinks
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self {
            config,
            sinks: Vec::new(),
            active: false,
            fire_count: 0,
        }
    }

    /// Create an alert manager with the sinks enabled in `config`
    pub fn from_config(config: AlertConfig) -> Self {
        let log_enabled = config.log_enabled;
        let sound_enabled = config.sound_enabled;
        let mut manager = Self::new(config);
        if log_enabled {
            manager.add_sink(Box::new(LogSink));
        }
        if sound_enabled {
            manager.add_sink(Box::new(BellSink::stderr()));
        }
        manager
    }

    pub fn add_sink(&mut self, sink: Box<dyn AlertSink>) {
        debug!("Registered alert sink: {}", sink.name());
        self.sinks.push(sink);
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Dispatch an edge; returns whether it was delivered.
    ///
    /// A raise while already raised, or a clear while idle, is dropped.
    pub fn handle(&mut self, event: &AlertEvent) -> bool {
        match *event {
            AlertEvent::Raised { closed_for, blink_count } => {
                if self.active {
                    debug!("Alert already active, ignoring duplicate raise");
                    return false;
                }
                self.active = true;
                self.fire_count += 1;
                for sink in &mut self.sinks {
                    if let Err(e) = sink.on_raised(closed_for, blink_count) {
                        error!("Failed to deliver alert to {}: {}", sink.name(), e);
                    }
                }
            }
            AlertEvent::Cleared { closed_for } => {
                if !self.active {
                    debug!("No active alert, ignoring clear");
                    return false;
                }
                self.active = false;
                for sink in &mut self.sinks {
                    if let Err(e) = sink.on_cleared(closed_for) {
                        error!("Failed to clear alert on {}: {}", sink.name(), e);
                    }
                }
            }
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Alerts raised this session
    pub fn fire_count(&self) -> usize {
        self.fire_count
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}
