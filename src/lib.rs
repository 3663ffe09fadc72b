//! Facelink
//!
//! A single-threaded control loop that connects a camera drone, a face
//! recognizer and a serial microcontroller.
//!
//! # Data flow
//!
//! Each iteration takes one frame from the drone's video stream, recognizes
//! faces on every second frame, writes one ASCII digit per face to the serial
//! link, draws the labelled boxes, then checks the link for a takeoff/land
//! command byte.
//!
//! # Module Structure
//!
//! - `registry`: known identities, built once from reference images
//! - `processor`: alternate-frame recognition with result carry-over
//! - `signal`: throttled outbound digits
//! - `command`: edge-triggered inbound commands
//! - `control`: the loop itself, with guaranteed release of its collaborators
//! - `channel`, `platform`, `ingest`, `render`, `detect`: the external
//!   collaborators behind traits

pub mod channel;
pub mod command;
pub mod config;
pub mod control;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod platform;
pub mod processor;
pub mod registry;
pub mod render;
pub mod signal;

pub use channel::{open_channel, MemoryChannel, SerialChannel};
pub use command::{Command, CommandListener, CommandState, PollingCommandListener};
pub use config::FacelinkConfig;
pub use control::{Collaborators, ControlLoop, LoopOptions, LoopOutcome, LoopStats, Termination};
pub use detect::{build_backend, Embedding, FaceBackend, StubBackend};
pub use error::FacelinkError;
pub use frame::{BoundingBox, Frame, PixelFormat, Resolution, WORKING_RESOLUTION};
pub use ingest::{SourceStats, VideoSource, VideoStream};
pub use platform::{build_platform, Platform, PlatformAction, SimulatedPlatform};
pub use processor::{Cadence, FrameProcessor, FrameResult, UNKNOWN_LABEL};
pub use registry::{Identity, IdentitySource, KnownSet};
pub use render::{build_surface, Annotation, HeadlessSurface, RenderSurface};
pub use signal::{DispatchReport, SignalDispatcher, SignalMap};
