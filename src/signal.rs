//! Signal dispatcher.
//!
//! Every face of a processed frame becomes one ASCII digit on the serial link.
//! The receiver polls slower than we can write, so each write is followed by a
//! hold of the throttle interval; no two writes are ever closer than that.

use anyhow::Result;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::channel::SerialChannel;
use crate::config::FacelinkConfig;
use crate::error::FacelinkError;
use crate::processor::UNKNOWN_LABEL;
use crate::registry::KnownSet;

/// Identity name → outbound symbol, plus the reserved unknown symbol.
#[derive(Clone, Debug)]
pub struct SignalMap {
    symbols: HashMap<String, u8>,
    unknown: u8,
}

impl SignalMap {
    pub fn new<I, S>(entries: I, unknown: char) -> Result<Self>
    where
        I: IntoIterator<Item = (S, char)>,
        S: Into<String>,
    {
        let unknown = to_symbol(unknown)?;
        let mut symbols = HashMap::new();
        for (name, symbol) in entries {
            let name = name.into();
            let symbol = to_symbol(symbol)?;
            if symbol == unknown {
                return Err(FacelinkError::Config(format!(
                    "signal for '{}' collides with the unknown signal",
                    name
                ))
                .into());
            }
            symbols.insert(name, symbol);
        }
        Ok(Self { symbols, unknown })
    }

    pub fn from_config(cfg: &FacelinkConfig) -> Result<Self> {
        Self::new(
            cfg.identities
                .iter()
                .map(|identity| (identity.name.clone(), identity.signal)),
            cfg.unknown_signal,
        )
    }

    /// Fail unless every known identity has a symbol.
    pub fn ensure_covers(&self, known: &KnownSet) -> Result<()> {
        for name in known.names() {
            if !self.symbols.contains_key(name) {
                return Err(FacelinkError::Config(format!(
                    "identity '{}' has no signal assigned",
                    name
                ))
                .into());
            }
        }
        Ok(())
    }

    pub fn unknown_symbol(&self) -> u8 {
        self.unknown
    }

    /// Symbol for a matched name; `Unknown` and unmapped names get the unknown symbol.
    pub fn symbol_for(&self, name: &str) -> u8 {
        if name == UNKNOWN_LABEL {
            return self.unknown;
        }
        self.symbols.get(name).copied().unwrap_or(self.unknown)
    }
}

fn to_symbol(symbol: char) -> Result<u8> {
    if !symbol.is_ascii_digit() {
        return Err(FacelinkError::Config(format!(
            "signal '{}' is not an ASCII digit",
            symbol
        ))
        .into());
    }
    Ok(symbol as u8)
}

/// Minimum spacing between outbound writes.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_write: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_write: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until a write is allowed.
    pub fn wait_ready(&self) {
        if let Some(last) = self.last_write {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
    }

    /// Record a write and hold the loop for the full interval.
    pub fn hold(&mut self) {
        self.last_write = Some(Instant::now());
        std::thread::sleep(self.interval);
    }
}

/// What a dispatch call put on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: Vec<u8>,
    pub failed: bool,
}

pub struct SignalDispatcher {
    throttle: Throttle,
}

impl SignalDispatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            throttle: Throttle::new(interval),
        }
    }

    pub fn interval(&self) -> Duration {
        self.throttle.interval()
    }

    /// Write one symbol per name. Empty `names` is a no-op.
    ///
    /// A write failure is logged and ends this dispatch; the remaining names of
    /// the frame are dropped rather than hammering a device that just went away.
    pub fn dispatch(
        &mut self,
        names: &[String],
        map: &SignalMap,
        channel: &mut dyn SerialChannel,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        for name in names {
            let symbol = map.symbol_for(name);
            self.throttle.wait_ready();
            if let Err(e) = channel.write_byte(symbol) {
                log::warn!("signal '{}' for {} not sent: {:#}", symbol as char, name, e);
                report.failed = true;
                break;
            }
            log::debug!("sent signal '{}' for {}", symbol as char, name);
            report.sent.push(symbol);
            self.throttle.hold();
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    fn map() -> SignalMap {
        SignalMap::new([("A", '1'), ("B", '2'), ("C", '3')], '4').expect("signal map")
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_symbols() {
        let map = map();
        assert_eq!(map.symbol_for("B"), b'2');
        assert_eq!(map.symbol_for(UNKNOWN_LABEL), b'4');
        assert_eq!(map.symbol_for("stranger"), b'4');
    }

    #[test]
    fn rejects_non_digit_symbols() {
        assert!(SignalMap::new([("A", 'x')], '4').is_err());
        assert!(SignalMap::new([("A", '4')], '4').is_err());
    }

    #[test]
    fn one_write_per_face() {
        let handle = MemoryChannel::new("stub://test");
        let mut channel = handle.clone();
        let mut dispatcher = SignalDispatcher::new(Duration::from_millis(1));

        let report = dispatcher.dispatch(&names(&["C", UNKNOWN_LABEL, "A"]), &map(), &mut channel);
        assert_eq!(report.sent, b"341".to_vec());
        assert_eq!(handle.written(), b"341".to_vec());
    }

    #[test]
    fn no_faces_no_writes() {
        let handle = MemoryChannel::new("stub://test");
        let mut channel = handle.clone();
        let mut dispatcher = SignalDispatcher::new(Duration::from_millis(1));

        let report = dispatcher.dispatch(&[], &map(), &mut channel);
        assert_eq!(report, DispatchReport::default());
        assert!(handle.written().is_empty());
    }

    #[test]
    fn writes_are_spaced_by_the_interval_across_calls() {
        let interval = Duration::from_millis(15);
        let handle = MemoryChannel::new("stub://test");
        let mut channel = handle.clone();
        let mut dispatcher = SignalDispatcher::new(interval);

        dispatcher.dispatch(&names(&["A", "B", "C"]), &map(), &mut channel);
        dispatcher.dispatch(&names(&["A"]), &map(), &mut channel);

        let times = handle.write_times();
        assert_eq!(times.len(), 4);
        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= interval);
        }
    }

    #[test]
    fn write_failure_stops_the_frame_without_panicking() {
        let handle = MemoryChannel::new("stub://test");
        let mut channel = handle.clone();
        handle.set_fail_writes(true);
        let mut dispatcher = SignalDispatcher::new(Duration::from_millis(1));

        let report = dispatcher.dispatch(&names(&["A", "B"]), &map(), &mut channel);
        assert!(report.failed);
        assert!(report.sent.is_empty());
    }
}
