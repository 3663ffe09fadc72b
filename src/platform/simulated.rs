use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Platform, PlatformAction};
use crate::error::FacelinkError;

/// Takeoff is refused below this charge, as the real platform does.
const MIN_TAKEOFF_BATTERY: u8 = 10;

#[derive(Debug)]
struct SimulatedState {
    connected: bool,
    streaming: bool,
    airborne: bool,
    battery: u8,
    performed: Vec<PlatformAction>,
}

/// In-process platform for dry runs and tests.
///
/// Clones share state, so a test can inspect what the loop asked for.
#[derive(Clone, Debug)]
pub struct SimulatedPlatform {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::with_battery(100)
    }

    pub fn with_battery(battery: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                connected: false,
                streaming: false,
                airborne: false,
                battery,
                performed: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Actions the platform accepted, in order.
    pub fn performed(&self) -> Vec<PlatformAction> {
        self.state().performed.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn is_streaming(&self) -> bool {
        self.state().streaming
    }

    pub fn is_airborne(&self) -> bool {
        self.state().airborne
    }

    fn ensure_connected(state: &SimulatedState) -> Result<()> {
        if !state.connected {
            return Err(FacelinkError::PlatformAction("platform not connected".to_string()).into());
        }
        Ok(())
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SimulatedPlatform {
    fn connect(&mut self) -> Result<()> {
        self.state().connected = true;
        log::info!("simulated platform connected");
        Ok(())
    }

    fn takeoff(&mut self) -> Result<()> {
        let mut state = self.state();
        Self::ensure_connected(&state)?;
        if state.battery < MIN_TAKEOFF_BATTERY {
            return Err(FacelinkError::PlatformAction(format!(
                "takeoff refused: battery at {}%",
                state.battery
            ))
            .into());
        }
        state.airborne = true;
        state.performed.push(PlatformAction::Takeoff);
        Ok(())
    }

    fn land(&mut self) -> Result<()> {
        let mut state = self.state();
        Self::ensure_connected(&state)?;
        state.airborne = false;
        state.performed.push(PlatformAction::Land);
        Ok(())
    }

    fn battery(&mut self) -> Result<u8> {
        let state = self.state();
        Self::ensure_connected(&state)?;
        Ok(state.battery)
    }

    fn stream_on(&mut self) -> Result<()> {
        self.state().streaming = true;
        Ok(())
    }

    fn stream_off(&mut self) -> Result<()> {
        self.state().streaming = false;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state();
        state.connected = false;
        state.streaming = false;
        log::info!("simulated platform disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_battery_refuses_takeoff() -> Result<()> {
        let mut platform = SimulatedPlatform::with_battery(5);
        platform.connect()?;
        assert!(platform.takeoff().is_err());
        assert!(platform.performed().is_empty());
        assert!(!platform.is_airborne());
        Ok(())
    }

    #[test]
    fn records_performed_actions() -> Result<()> {
        let handle = SimulatedPlatform::new();
        let mut platform = handle.clone();
        platform.connect()?;
        platform.perform(PlatformAction::Takeoff)?;
        platform.perform(PlatformAction::Land)?;
        assert_eq!(
            handle.performed(),
            vec![PlatformAction::Takeoff, PlatformAction::Land]
        );
        Ok(())
    }

    #[test]
    fn actions_require_connection() {
        let mut platform = SimulatedPlatform::new();
        assert!(platform.takeoff().is_err());
    }
}
