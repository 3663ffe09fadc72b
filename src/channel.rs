//! Serial channel to the microcontroller.
//!
//! One duplex, byte-oriented link shared by the signal dispatcher (writes) and
//! the command listener (reads). The loop touches it strictly sequentially, so
//! implementations need no locking of their own.

use anyhow::Result;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::config::SerialSettings;
use crate::error::FacelinkError;

/// Byte-level access to the serial link.
pub trait SerialChannel {
    /// Number of bytes buffered for reading. Must not block.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read exactly one byte.
    fn read_byte(&mut self) -> Result<u8>;

    /// Write exactly one byte.
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Human-readable endpoint description for logs.
    fn describe(&self) -> String;
}

/// Open the configured channel. `stub://` ports get an in-memory channel.
pub fn open_channel(settings: &SerialSettings) -> Result<Box<dyn SerialChannel>> {
    if settings.port.starts_with("stub://") {
        log::info!("serial channel {} (in-memory)", settings.port);
        return Ok(Box::new(MemoryChannel::new(settings.port.clone())));
    }
    Ok(Box::new(SerialPortChannel::open(settings)?))
}

// ----------------------------------------------------------------------------
// Hardware serial port
// ----------------------------------------------------------------------------

pub struct SerialPortChannel {
    port: Box<dyn serialport::SerialPort>,
    path: String,
}

impl SerialPortChannel {
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        let port = serialport::new(settings.port.as_str(), settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| {
                FacelinkError::ChannelRead(format!(
                    "failed to open serial port {}: {}",
                    settings.port, e
                ))
            })?;
        log::info!(
            "serial channel {} open at {} baud",
            settings.port,
            settings.baud_rate
        );
        Ok(Self {
            port,
            path: settings.port.clone(),
        })
    }
}

impl SerialChannel for SerialPortChannel {
    fn bytes_available(&mut self) -> Result<usize> {
        let count = self.port.bytes_to_read().map_err(|e| {
            FacelinkError::ChannelRead(format!("{}: bytes_to_read failed: {}", self.path, e))
        })?;
        Ok(count as usize)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.port.read_exact(&mut buf).map_err(|e| {
            FacelinkError::ChannelRead(format!("{}: read failed: {}", self.path, e))
        })?;
        Ok(buf[0])
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.port
            .write_all(&[byte])
            .and_then(|_| self.port.flush())
            .map_err(|e| {
                FacelinkError::ChannelWrite(format!("{}: write failed: {}", self.path, e))
            })?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.clone()
    }
}

// ----------------------------------------------------------------------------
// In-memory channel (stub:// and tests)
// ----------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    inbound: VecDeque<u8>,
    outbound: Vec<(Instant, u8)>,
    fail_writes: bool,
    fail_reads: bool,
}

/// In-memory channel. Clones share the same buffers, so a test can keep a
/// handle while the loop owns another.
#[derive(Clone)]
pub struct MemoryChannel {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes as if the microcontroller had sent them.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.state().inbound.extend(bytes.iter().copied());
    }

    /// Bytes written so far, in order.
    pub fn written(&self) -> Vec<u8> {
        self.state().outbound.iter().map(|(_, b)| *b).collect()
    }

    /// Write instants, index-aligned with [`MemoryChannel::written`].
    pub fn write_times(&self) -> Vec<Instant> {
        self.state().outbound.iter().map(|(t, _)| *t).collect()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }
}

impl SerialChannel for MemoryChannel {
    fn bytes_available(&mut self) -> Result<usize> {
        let state = self.state();
        if state.fail_reads {
            return Err(FacelinkError::ChannelRead(format!("{}: device unavailable", self.name)).into());
        }
        Ok(state.inbound.len())
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut state = self.state();
        if state.fail_reads {
            return Err(FacelinkError::ChannelRead(format!("{}: device unavailable", self.name)).into());
        }
        state.inbound.pop_front().ok_or_else(|| {
            FacelinkError::ChannelRead(format!("{}: read timed out", self.name)).into()
        })
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        let mut state = self.state();
        if state.fail_writes {
            return Err(FacelinkError::ChannelWrite(format!("{}: device unavailable", self.name)).into());
        }
        state.outbound.push((Instant::now(), byte));
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
