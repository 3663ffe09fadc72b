//! Command listener.
//!
//! Polls the serial link for single-byte commands from the microcontroller.
//! Commands are edge-triggered: a byte only counts when it differs from the
//! previous one, so a held button yields one action. After each new byte the
//! loop settles for a while to ride out contact bounce.

use anyhow::Result;
use std::time::Duration;

use crate::channel::SerialChannel;
use crate::platform::{Platform, PlatformAction};

/// Decoded inbound byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Idle,
    Takeoff,
    Land,
    Ack,
    Unrecognized(u8),
}

impl Command {
    pub fn decode(byte: u8) -> Self {
        match byte {
            0x00 => Command::Idle,
            0x01 => Command::Takeoff,
            0x02 => Command::Land,
            0x03 => Command::Ack,
            other => Command::Unrecognized(other),
        }
    }

    pub fn action(self) -> Option<PlatformAction> {
        match self {
            Command::Takeoff => Some(PlatformAction::Takeoff),
            Command::Land => Some(PlatformAction::Land),
            Command::Idle | Command::Ack | Command::Unrecognized(_) => None,
        }
    }
}

/// Last byte seen on the link. Starts empty, which no real byte equals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandState {
    last: Option<u8>,
}

impl CommandState {
    pub fn last(&self) -> Option<u8> {
        self.last
    }

    /// Record `byte`; returns `true` when it differs from the previous one.
    pub fn observe(&mut self, byte: u8) -> bool {
        if self.last == Some(byte) {
            return false;
        }
        self.last = Some(byte);
        true
    }
}

/// Source of platform actions. Polling today; an event-driven backend can
/// replace it without touching the loop.
pub trait CommandListener {
    /// Check for a new command and carry it out on `platform`.
    ///
    /// Returns the action issued, if any. Must return promptly when nothing is
    /// waiting. Platform refusals are reported, not returned as errors.
    fn poll(
        &mut self,
        channel: &mut dyn SerialChannel,
        platform: &mut dyn Platform,
    ) -> Result<Option<PlatformAction>>;
}

pub struct PollingCommandListener {
    state: CommandState,
    settle: Duration,
}

impl PollingCommandListener {
    pub fn new(settle: Duration) -> Self {
        Self {
            state: CommandState::default(),
            settle,
        }
    }

    pub fn state(&self) -> &CommandState {
        &self.state
    }
}

impl CommandListener for PollingCommandListener {
    fn poll(
        &mut self,
        channel: &mut dyn SerialChannel,
        platform: &mut dyn Platform,
    ) -> Result<Option<PlatformAction>> {
        if channel.bytes_available()? == 0 {
            return Ok(None);
        }
        let byte = channel.read_byte()?;
        if !self.state.observe(byte) {
            return Ok(None);
        }

        let command = Command::decode(byte);
        match command {
            Command::Unrecognized(_) => log::info!("received command {} (unrecognized, ignored)", byte),
            _ => log::info!("received command {} ({:?})", byte, command),
        }

        let action = command.action();
        if let Some(action) = action {
            match platform.perform(action) {
                Ok(()) => log::info!("platform {} issued", action),
                Err(e) => log::error!("platform {} failed: {:#}", action, e),
            }
        }

        std::thread::sleep(self.settle);
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::platform::SimulatedPlatform;
    use std::time::Instant;

    fn connected_platform() -> SimulatedPlatform {
        let mut platform = SimulatedPlatform::new();
        platform.connect().expect("connect simulated platform");
        platform
    }

    #[test]
    fn decoding_table() {
        assert_eq!(Command::decode(0).action(), None);
        assert_eq!(Command::decode(1).action(), Some(PlatformAction::Takeoff));
        assert_eq!(Command::decode(2).action(), Some(PlatformAction::Land));
        assert_eq!(Command::decode(3), Command::Ack);
        assert_eq!(Command::decode(9), Command::Unrecognized(9));
        assert_eq!(Command::decode(9).action(), None);
    }

    #[test]
    fn state_is_edge_triggered() {
        let mut state = CommandState::default();
        assert_eq!(state.last(), None);
        assert!(state.observe(0));
        assert!(!state.observe(0));
        assert!(state.observe(1));
        assert_eq!(state.last(), Some(1));
    }

    #[test]
    fn returns_immediately_when_nothing_buffered() -> Result<()> {
        let mut channel = MemoryChannel::new("stub://test");
        let mut platform = connected_platform();
        let mut listener = PollingCommandListener::new(Duration::from_secs(5));

        let started = Instant::now();
        assert_eq!(listener.poll(&mut channel, &mut platform)?, None);
        assert!(started.elapsed() < Duration::from_secs(1));
        Ok(())
    }

    #[test]
    fn repeated_bytes_fire_once() -> Result<()> {
        let mut channel = MemoryChannel::new("stub://test");
        let platform = connected_platform();
        let mut handle = platform.clone();
        let mut listener = PollingCommandListener::new(Duration::from_millis(1));

        channel.push_inbound(&[0x00, 0x00, 0x01, 0x01, 0x02]);
        let mut issued = Vec::new();
        for _ in 0..5 {
            issued.push(listener.poll(&mut channel, &mut handle)?);
        }

        assert_eq!(
            issued,
            vec![
                None,
                None,
                Some(PlatformAction::Takeoff),
                None,
                Some(PlatformAction::Land)
            ]
        );
        assert_eq!(
            platform.performed(),
            vec![PlatformAction::Takeoff, PlatformAction::Land]
        );
        Ok(())
    }

    #[test]
    fn refused_action_is_reported_not_retried() -> Result<()> {
        let mut channel = MemoryChannel::new("stub://test");
        let mut platform = SimulatedPlatform::with_battery(3);
        platform.connect()?;
        let mut listener = PollingCommandListener::new(Duration::from_millis(1));

        channel.push_inbound(&[0x01, 0x01]);
        assert_eq!(
            listener.poll(&mut channel, &mut platform)?,
            Some(PlatformAction::Takeoff)
        );
        assert_eq!(listener.state().last(), Some(0x01));
        assert_eq!(listener.poll(&mut channel, &mut platform)?, None);
        assert!(platform.performed().is_empty());
        Ok(())
    }

    #[test]
    fn unrecognized_byte_is_a_change_without_action() -> Result<()> {
        let mut channel = MemoryChannel::new("stub://test");
        let platform = connected_platform();
        let mut handle = platform.clone();
        let mut listener = PollingCommandListener::new(Duration::from_millis(1));

        channel.push_inbound(&[0x01, 0x07, 0x01]);
        assert_eq!(
            listener.poll(&mut channel, &mut handle)?,
            Some(PlatformAction::Takeoff)
        );
        assert_eq!(listener.poll(&mut channel, &mut handle)?, None);
        assert_eq!(listener.state().last(), Some(0x07));
        assert_eq!(
            listener.poll(&mut channel, &mut handle)?,
            Some(PlatformAction::Takeoff)
        );
        assert_eq!(platform.performed().len(), 2);
        Ok(())
    }

    #[test]
    fn settles_after_a_new_byte() -> Result<()> {
        let mut channel = MemoryChannel::new("stub://test");
        let mut platform = connected_platform();
        let settle = Duration::from_millis(20);
        let mut listener = PollingCommandListener::new(settle);

        channel.push_inbound(&[0x03]);
        let started = Instant::now();
        listener.poll(&mut channel, &mut platform)?;
        assert!(started.elapsed() >= settle);
        Ok(())
    }
}
