//! Control loop.
//!
//! One thread, one frame per iteration, in a fixed order:
//! capture, process, dispatch signals, render, poll commands, check quit.
//! Per-iteration failures are logged and the loop carries on; only a capture
//! failure, the quit key, Ctrl-C or a frame limit ends it. Whatever ends it,
//! the video source, platform connection and render surface are released.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channel::SerialChannel;
use crate::command::CommandListener;
use crate::detect::FaceBackend;
use crate::error::FacelinkError;
use crate::frame::Resolution;
use crate::ingest::VideoSource;
use crate::platform::Platform;
use crate::processor::FrameProcessor;
use crate::registry::KnownSet;
use crate::render::{self, RenderSurface};
use crate::signal::{SignalDispatcher, SignalMap};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// External collaborators, owned by the loop for its whole lifetime.
pub struct Collaborators {
    pub source: Box<dyn VideoSource>,
    pub backend: Box<dyn FaceBackend>,
    pub channel: Box<dyn SerialChannel>,
    pub platform: Box<dyn Platform>,
    pub surface: Box<dyn RenderSurface>,
    pub listener: Box<dyn CommandListener>,
}

#[derive(Clone, Debug)]
pub struct LoopOptions {
    pub working: Resolution,
    pub throttle: Duration,
    /// Stop after this many frames; `None` runs until quit.
    pub max_frames: Option<u64>,
}

/// Why the loop stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    QuitKey,
    Interrupted,
    FrameLimit,
    CaptureFailed(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub processed: u64,
    pub skipped: u64,
    pub detection_failures: u64,
    pub signals_sent: u64,
    pub write_failures: u64,
    pub read_failures: u64,
    pub render_failures: u64,
    pub actions: u64,
}

#[derive(Clone, Debug)]
pub struct LoopOutcome {
    pub termination: Termination,
    pub stats: LoopStats,
}

pub struct ControlLoop {
    parts: Collaborators,
    known: KnownSet,
    signals: SignalMap,
    processor: FrameProcessor,
    dispatcher: SignalDispatcher,
    working: Resolution,
    max_frames: Option<u64>,
    shutdown: Arc<AtomicBool>,
    stats: LoopStats,
    started: bool,
    released: bool,
}

impl ControlLoop {
    pub fn new(
        parts: Collaborators,
        known: KnownSet,
        signals: SignalMap,
        options: LoopOptions,
    ) -> Self {
        Self {
            parts,
            known,
            signals,
            processor: FrameProcessor::new(options.working),
            dispatcher: SignalDispatcher::new(options.throttle),
            working: options.working,
            max_frames: options.max_frames,
            shutdown: Arc::new(AtomicBool::new(false)),
            stats: LoopStats::default(),
            started: false,
            released: false,
        }
    }

    /// Flag that ends the loop at the next quit check once set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Start the collaborators, run until terminated, release everything.
    pub fn run(&mut self) -> Result<LoopOutcome> {
        let result = self.start().and_then(|()| self.iterate());
        self.release();
        let termination = result?;
        log::info!(
            "loop terminated ({:?}): frames={} processed={} signals={} actions={}",
            termination,
            self.stats.frames,
            self.stats.processed,
            self.stats.signals_sent,
            self.stats.actions
        );
        Ok(LoopOutcome {
            termination,
            stats: self.stats.clone(),
        })
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        let platform = self.parts.platform.as_mut();
        platform.connect()?;
        match platform.battery() {
            Ok(level) => log::info!("platform battery {}%", level),
            Err(e) => log::warn!("battery query failed: {:#}", e),
        }
        platform.stream_on()?;
        self.parts.source.start()?;
        log::info!(
            "control loop running: {} identities, serial {}, throttle {:?}",
            self.known.len(),
            self.parts.channel.describe(),
            self.dispatcher.interval()
        );
        Ok(())
    }

    fn iterate(&mut self) -> Result<Termination> {
        let mut last_health_log = Instant::now();

        loop {
            let frame = match self.parts.source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("capture failed: {:#}", e);
                    return Ok(Termination::CaptureFailed(format!("{:#}", e)));
                }
            };
            self.stats.frames += 1;

            let annotations = match self.processor.step(
                &frame,
                &self.known,
                self.parts.backend.as_mut(),
            ) {
                Ok(step) => {
                    if step.processed() {
                        self.stats.processed += 1;
                        if !step.result.is_empty() {
                            let report = self.dispatcher.dispatch(
                                &step.result.names,
                                &self.signals,
                                self.parts.channel.as_mut(),
                            );
                            self.stats.signals_sent += report.sent.len() as u64;
                            if report.failed {
                                self.stats.write_failures += 1;
                            }
                        }
                    } else {
                        self.stats.skipped += 1;
                    }
                    render::annotations(step.result, frame.resolution(), self.working)
                }
                Err(e) => {
                    self.stats.detection_failures += 1;
                    log_recoverable(&e);
                    Vec::new()
                }
            };

            if let Err(e) = self.parts.surface.present(&frame, &annotations) {
                self.stats.render_failures += 1;
                log_recoverable(&e);
            }

            match self
                .parts
                .listener
                .poll(self.parts.channel.as_mut(), self.parts.platform.as_mut())
            {
                Ok(Some(_)) => self.stats.actions += 1,
                Ok(None) => {}
                Err(e) => {
                    self.stats.read_failures += 1;
                    log_recoverable(&e);
                }
            }

            match self.parts.surface.poll_quit() {
                Ok(true) => return Ok(Termination::QuitKey),
                Ok(false) => {}
                Err(e) => {
                    self.stats.render_failures += 1;
                    log_recoverable(&e);
                }
            }
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(Termination::Interrupted);
            }
            if self.max_frames.is_some_and(|max| self.stats.frames >= max) {
                return Ok(Termination::FrameLimit);
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let source = self.parts.source.stats();
                log::info!(
                    "video health={} frames={} source={} processed={} signals={} actions={}",
                    self.parts.source.is_healthy(),
                    source.frames_captured,
                    source.source,
                    self.stats.processed,
                    self.stats.signals_sent,
                    self.stats.actions
                );
                last_health_log = Instant::now();
            }
        }
    }

    /// Release every collaborator once. Individual failures are logged so the
    /// remaining ones still get released.
    fn release(&mut self) {
        if self.released || !self.started {
            return;
        }
        self.released = true;

        if let Err(e) = self.parts.source.stop() {
            log::warn!("video source stop failed: {:#}", e);
        }
        if let Err(e) = self.parts.platform.stream_off() {
            log::warn!("platform stream off failed: {:#}", e);
        }
        if let Err(e) = self.parts.platform.disconnect() {
            log::warn!("platform disconnect failed: {:#}", e);
        }
        if let Err(e) = self.parts.surface.close() {
            log::warn!("render surface close failed: {:#}", e);
        }
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        self.release();
    }
}

fn log_recoverable(err: &anyhow::Error) {
    let code = FacelinkError::classify(err).map_or("UNCLASSIFIED", FacelinkError::code);
    log::warn!("[{}] {:#}", code, err);
}
