//! facelinkd - face-recognition control loop daemon
//!
//! Startup:
//! 1. Load configuration (file, environment, then command-line flags)
//! 2. Register known identities from their reference images
//! 3. Open the serial link, the platform client and the video stream
//! 4. Run the control loop until the quit key, Ctrl-C or a capture failure

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use facelink::command::PollingCommandListener;
use facelink::config::{parse_platform_kind, FacelinkConfig, RenderMode};
use facelink::registry::{self, IdentitySource};
use facelink::{
    build_backend, build_platform, build_surface, open_channel, Collaborators, ControlLoop,
    FacelinkError, LoopOptions, SignalMap, Termination, VideoStream,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Recognize faces from a camera drone and signal them to a serial microcontroller"
)]
struct Args {
    /// Config file (TOML when the extension is .toml, JSON otherwise).
    #[arg(long, env = "FACELINK_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Serial device of the microcontroller (`stub://...` for an in-memory link).
    #[arg(long, value_name = "PORT")]
    serial_port: Option<String>,

    /// Video stream URL, `stub://...`, or a directory of images to replay.
    #[arg(long, value_name = "URL")]
    video_url: Option<String>,

    /// Platform client (tello|simulated).
    #[arg(long, value_name = "KIND")]
    platform: Option<String>,

    /// Do not open a window; runs end on Ctrl-C or --max-frames.
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames.
    #[arg(long, env = "FACELINK_MAX_FRAMES")]
    max_frames: Option<u64>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::StartupUi::new(
        args.ui,
        std::io::stderr().is_terminal(),
        std::io::stdout().is_terminal(),
    );

    let cfg = {
        let step = ui.step("Load configuration");
        let cfg = load_config(&args)?;
        step.done(format!("{} identities", cfg.identities.len()));
        cfg
    };

    let mut backend = build_backend(&cfg.detector)?;

    let known = {
        let step = ui.step("Register identities");
        let sources: Vec<IdentitySource> = cfg.identities.iter().map(IdentitySource::from).collect();
        let known = registry::load(&sources, backend.as_mut()).map_err(|e| {
            if let Some(kind) = FacelinkError::classify(&e) {
                log::error!("[{}] identity registry failed", kind.code());
            }
            e
        })?;
        step.done(known.names().join(", "));
        known
    };

    let signals = SignalMap::from_config(&cfg)?;
    signals.ensure_covers(&known)?;

    let channel = {
        let step = ui.step("Open serial link");
        let channel = open_channel(&cfg.serial)?;
        step.done(channel.describe());
        channel
    };

    let platform = build_platform(&cfg.platform)?;
    let source = VideoStream::open(&cfg.video)?;
    let surface = build_surface(&cfg.render)?;

    let parts = Collaborators {
        source: Box::new(source),
        backend,
        channel,
        platform,
        surface,
        listener: Box::new(PollingCommandListener::new(cfg.serial.settle)),
    };
    let mut control = ControlLoop::new(
        parts,
        known,
        signals,
        LoopOptions {
            working: cfg.video.working,
            throttle: cfg.serial.throttle,
            max_frames: args.max_frames,
        },
    );

    let shutdown = control.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let outcome = control.run()?;
    log::info!(
        "facelinkd stopped: frames={} processed={} skipped={} signals={} write_failures={} render_failures={} actions={}",
        outcome.stats.frames,
        outcome.stats.processed,
        outcome.stats.skipped,
        outcome.stats.signals_sent,
        outcome.stats.write_failures,
        outcome.stats.render_failures,
        outcome.stats.actions
    );
    if let Termination::CaptureFailed(reason) = outcome.termination {
        log::warn!("video capture ended: {}", reason);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<FacelinkConfig> {
    let mut cfg = FacelinkConfig::load_from(args.config.as_deref())?;
    if let Some(port) = &args.serial_port {
        cfg.serial.port = port.clone();
    }
    if let Some(url) = &args.video_url {
        cfg.video.url = url.clone();
    }
    if let Some(kind) = &args.platform {
        cfg.platform.kind = parse_platform_kind(kind)?;
    }
    if args.headless {
        cfg.render.mode = RenderMode::Headless;
    }
    cfg.validate()?;
    Ok(cfg)
}
