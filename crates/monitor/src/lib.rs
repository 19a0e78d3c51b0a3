//! Drowsiness Monitor
//!
//! Drives frames from a `FrameSource` through preprocessing and the DMS
//! pipeline, and forwards drowsiness alert edges to the alert sinks.

mod config;
mod fps;

pub use config::{MonitorConfig, OutputConfig, ENV_PREFIX};
pub use fps::FpsCounter;

use std::future::Future;
use std::io::Write;
use std::time::{Duration, Instant};

use alerting::{AlertEvent, AlertManager};
use camera_capture::{CameraError, FrameSource, ImageSequenceSource, Preprocessing, VideoFrame};
use dms::{DmsAnalysis, DmsError, DmsEvent, DmsModule, RegionExtractor};
use serde::Serialize;
use thiserror::Error;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("DMS error: {0}")]
    Dms(#[from] DmsError),

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Initialize logging on stderr; level from `RUST_LOG`, default `info`
pub fn init_logging() -> Result<(), MonitorError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| MonitorError::Logging(e.to_string()))
}

/// End-of-run statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub frames: u64,
    pub blinks: u64,
    pub alerts_raised: usize,
    pub elapsed: Duration,
    pub average_fps: f64,
}

/// One JSON output line
#[derive(Debug, Serialize)]
struct FrameRecord<'a> {
    sequence: u32,
    timestamp_ms: u64,
    #[serde(flatten)]
    analysis: &'a DmsAnalysis,
}

/// One monitoring session over a frame source
pub struct Monitor<S: FrameSource, W: Write> {
    source: S,
    preprocessing: Preprocessing,
    dms: DmsModule,
    alerts: AlertManager,
    output: OutputConfig,
    out: W,
    fps: FpsCounter,
    frames: u64,
    skipped: u64,
}

impl Monitor<ImageSequenceSource, std::io::Stdout> {
    /// Build the image-replay pipeline described by `config`
    pub fn from_config(config: &MonitorConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        let source = ImageSequenceSource::open(&config.camera)?;
        let extractor = RegionExtractor::proportional(&config.detector)?;
        let dms = DmsModule::new(config.dms.clone(), extractor)?;
        let alerts = AlertManager::from_config(config.alerting.clone());
        Ok(Self::new(
            source,
            config.preprocessing.clone(),
            dms,
            alerts,
            config.output.clone(),
            std::io::stdout(),
        ))
    }
}

impl<S: FrameSource, W: Write> Monitor<S, W> {
    pub fn new(
        source: S,
        preprocessing: Preprocessing,
        dms: DmsModule,
        alerts: AlertManager,
        output: OutputConfig,
        out: W,
    ) -> Self {
        Self {
            source,
            preprocessing,
            dms,
            alerts,
            output,
            out,
            fps: FpsCounter::default(),
            frames: 0,
            skipped: 0,
        }
    }

    pub fn dms(&self) -> &DmsModule {
        &self.dms
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    /// Analyze one frame; `Ok(None)` when the detectors failed and the frame was skipped
    pub fn process_frame(&mut self, frame: &VideoFrame) -> Result<Option<DmsAnalysis>, MonitorError> {
        let gray = self.preprocessing.apply(&frame.to_gray_image()?);

        let analysis = match self.dms.analyze(&gray, frame.timestamp()) {
            Ok(analysis) => analysis,
            Err(DmsError::Detection(e)) => {
                warn!("Skipping frame {}: {}", frame.sequence, e);
                self.skipped += 1;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        for event in &analysis.events {
            let alert = match *event {
                DmsEvent::DrowsinessAlertRaised { closed_for_ms } => AlertEvent::Raised {
                    closed_for: Duration::from_millis(closed_for_ms),
                    blink_count: analysis.blink_count,
                },
                DmsEvent::DrowsinessAlertCleared { closed_for_ms } => AlertEvent::Cleared {
                    closed_for: Duration::from_millis(closed_for_ms),
                },
                DmsEvent::Blink { .. } => continue,
            };
            self.alerts.handle(&alert);
        }

        self.frames += 1;
        let fps = self.fps.tick(Instant::now());

        if self.output.json_lines {
            let record = FrameRecord {
                sequence: frame.sequence,
                timestamp_ms: u64::try_from(frame.timestamp().as_millis()).unwrap_or(u64::MAX),
                analysis: &analysis,
            };
            serde_json::to_writer(&mut self.out, &record)?;
            self.out.write_all(b"\n")?;
        }

        if self.output.log_every_frames > 0 && self.frames % self.output.log_every_frames == 0 {
            info!(
                "Processed {} frames ({:.1} FPS), blinks: {}, alerts: {}",
                self.frames,
                fps,
                self.dms.state().blink_count(),
                self.alerts.fire_count()
            );
        }

        Ok(Some(analysis))
    }

    /// Run until the source is exhausted or `shutdown` resolves.
    ///
    /// With `pace` set, frames are fetched at most once per period.
    pub async fn run<F>(mut self, pace: Option<Duration>, shutdown: F) -> Result<SessionSummary, MonitorError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = pace.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let started = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping monitor");
                    break;
                }
                _ = next_tick(&mut ticker) => {}
            }

            let Some(frame) = self.source.next_frame()? else {
                info!("Frame source exhausted");
                break;
            };
            self.process_frame(&frame)?;
        }

        self.out.flush()?;
        let elapsed = started.elapsed();
        let secs = elapsed.as_secs_f64();
        let summary = SessionSummary {
            frames: self.frames,
            blinks: self.dms.state().blink_count(),
            alerts_raised: self.alerts.fire_count(),
            elapsed,
            average_fps: if secs > 0.0 { self.frames as f64 / secs } else { 0.0 },
        };
        if self.skipped > 0 {
            debug!("{} frames skipped after detector errors", self.skipped);
        }
        info!(
            "Session complete: {} frames, {} blinks, {} alerts, {:.1} FPS average",
            summary.frames, summary.blinks, summary.alerts_raised, summary.average_fps
        );
        Ok(summary)
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    if let Some(ticker) = ticker {
        ticker.tick().await;
    }
}

/// Run the configured monitor until the frames run out or ctrl-c
pub async fn run_monitor(config: MonitorConfig) -> Result<SessionSummary, MonitorError> {
    let monitor = Monitor::from_config(&config)?;
    let pace = config
        .camera
        .realtime
        .then(|| Duration::from_nanos(config.camera.frame_interval_ns()));

    info!(
        "Monitoring {} at {} FPS (alert after {:.1}s of closure)",
        config.camera.source_dir.display(),
        config.camera.fps,
        config.dms.alert_threshold_secs
    );

    monitor
        .run(pace, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::AlertConfig;
    use dms::{DetectorConfig, DmsConfig, Region};
    use image::GrayImage;
    use std::collections::VecDeque;

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 480;
    const INTERVAL_NS: u64 = 33_333_333;

    /// Uniform skin-tone frames: no dark pupil anywhere, so eyes read closed
    struct ScriptedSource {
        frames: VecDeque<VideoFrame>,
    }

    impl ScriptedSource {
        fn closed(count: u32) -> Self {
            let frames = (0..count)
                .map(|seq| {
                    VideoFrame::new(
                        vec![200; (WIDTH * HEIGHT * 3) as usize],
                        WIDTH,
                        HEIGHT,
                        u64::from(seq) * INTERVAL_NS,
                        seq,
                    )
                })
                .collect();
            Self { frames }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
            Ok(self.frames.pop_front())
        }
    }

    fn monitor(source: ScriptedSource, json_lines: bool) -> Monitor<ScriptedSource, Vec<u8>> {
        let extractor = RegionExtractor::proportional(&DetectorConfig::default()).unwrap();
        let dms = DmsModule::new(DmsConfig::default(), extractor).unwrap();
        let alerts = AlertManager::from_config(AlertConfig {
            sound_enabled: false,
            log_enabled: true,
        });
        let output = OutputConfig {
            json_lines,
            log_every_frames: 50,
        };
        Monitor::new(source, Preprocessing::none(), dms, alerts, output, Vec::new())
    }

    #[tokio::test]
    async fn test_sustained_closure_raises_one_alert() {
        // 150 frames at 30 FPS is five seconds of closed eyes
        let summary = monitor(ScriptedSource::closed(150), false)
            .run(None, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.frames, 150);
        assert_eq!(summary.blinks, 1);
        assert_eq!(summary.alerts_raised, 1);
    }

    #[tokio::test]
    async fn test_short_closure_does_not_alert() {
        let summary = monitor(ScriptedSource::closed(60), false)
            .run(None, std::future::pending())
            .await
            .unwrap();
        assert_eq!(summary.blinks, 1);
        assert_eq!(summary.alerts_raised, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_first_frame() {
        let summary = monitor(ScriptedSource::closed(10), false)
            .run(None, async {})
            .await
            .unwrap();
        assert_eq!(summary.frames, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_run_processes_all_frames() {
        let summary = monitor(ScriptedSource::closed(5), false)
            .run(Some(Duration::from_nanos(INTERVAL_NS)), std::future::pending())
            .await
            .unwrap();
        assert_eq!(summary.frames, 5);
    }

    #[test]
    fn test_json_lines_output() {
        let mut monitor = monitor(ScriptedSource::closed(0), true);
        let frame = VideoFrame::new(vec![200; (WIDTH * HEIGHT * 3) as usize], WIDTH, HEIGHT, 0, 7);
        let analysis = monitor.process_frame(&frame).unwrap().unwrap();
        assert_eq!(analysis.face_bbox, Some(Region::new(192, 96, 256, 240)));

        let text = String::from_utf8(monitor.out.clone()).unwrap();
        assert_eq!(text.lines().count(), 1);
        let line: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(line["sequence"], 7);
        assert_eq!(line["timestamp_ms"], 0);
        assert_eq!(line["blink_count"], 1);
        assert_eq!(line["events"][0]["event"], "blink");
    }

    #[test]
    fn test_detector_failure_skips_frame() {
        let face = |_: &GrayImage| -> Result<Vec<Region>, DmsError> {
            Err(DmsError::Detection("model unavailable".into()))
        };
        let eyes = |_: &GrayImage| -> Result<Vec<Region>, DmsError> { Ok(vec![]) };
        let dms = DmsModule::new(
            DmsConfig::default(),
            RegionExtractor::new(Box::new(face), Box::new(eyes)),
        )
        .unwrap();
        let mut monitor = Monitor::new(
            ScriptedSource::closed(0),
            Preprocessing::none(),
            dms,
            AlertManager::default(),
            OutputConfig::default(),
            Vec::new(),
        );

        let frame = VideoFrame::new(vec![200; (WIDTH * HEIGHT * 3) as usize], WIDTH, HEIGHT, 0, 0);
        assert!(monitor.process_frame(&frame).unwrap().is_none());
        assert_eq!(monitor.skipped, 1);
        assert_eq!(monitor.frames, 0);
    }
}
