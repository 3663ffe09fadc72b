//! Flight platform control.
//!
//! The loop only issues takeoff and land; connection, stream bracketing and a
//! one-off battery read happen at startup and shutdown.

mod simulated;
mod tello;

use anyhow::Result;
use std::fmt;

pub use simulated::SimulatedPlatform;
pub use tello::TelloPlatform;

use crate::config::{PlatformKind, PlatformSettings};

/// Action requested by an inbound command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformAction {
    Takeoff,
    Land,
}

impl fmt::Display for PlatformAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformAction::Takeoff => write!(f, "takeoff"),
            PlatformAction::Land => write!(f, "land"),
        }
    }
}

pub trait Platform {
    fn connect(&mut self) -> Result<()>;

    fn takeoff(&mut self) -> Result<()>;

    fn land(&mut self) -> Result<()>;

    /// Battery charge in percent.
    fn battery(&mut self) -> Result<u8>;

    /// Start the platform's video stream.
    fn stream_on(&mut self) -> Result<()> {
        Ok(())
    }

    fn stream_off(&mut self) -> Result<()> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()>;

    fn perform(&mut self, action: PlatformAction) -> Result<()> {
        match action {
            PlatformAction::Takeoff => self.takeoff(),
            PlatformAction::Land => self.land(),
        }
    }
}

/// Build the configured platform client (not yet connected).
pub fn build_platform(settings: &PlatformSettings) -> Result<Box<dyn Platform>> {
    match settings.kind {
        PlatformKind::Tello => Ok(Box::new(TelloPlatform::new(
            &settings.address,
            settings.command_timeout,
        )?)),
        PlatformKind::Simulated => Ok(Box::new(SimulatedPlatform::new())),
    }
}
