//! Tello SDK client.
//!
//! Plain-text commands over UDP to the drone's command port. Every command waits
//! for a reply: `ok` or a value means success, `error...` or silence within the
//! timeout is a platform action failure.

use anyhow::{anyhow, Context, Result};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use super::Platform;
use crate::error::FacelinkError;

/// Takeoff and landing only reply once the manoeuvre is finished.
const MANOEUVRE_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_REPLY_BYTES: usize = 1024;

pub struct TelloPlatform {
    socket: UdpSocket,
    drone: SocketAddr,
    timeout: Duration,
    connected: bool,
}

impl TelloPlatform {
    pub fn new(address: &str, timeout: Duration) -> Result<Self> {
        let drone = address
            .to_socket_addrs()
            .with_context(|| format!("resolve tello address {}", address))?
            .next()
            .ok_or_else(|| anyhow!("tello address {} did not resolve", address))?;
        let bind_addr = if drone.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).context("bind tello command socket")?;
        Ok(Self {
            socket,
            drone,
            timeout,
            connected: false,
        })
    }

    /// Discard replies that arrived after an earlier command gave up on them.
    fn drain_stale(&mut self) -> Result<()> {
        self.socket
            .set_nonblocking(true)
            .context("set tello socket non-blocking")?;
        let mut buf = [0u8; MAX_REPLY_BYTES];
        let drained = loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    log::debug!(
                        "tello stale reply from {}: '{}'",
                        from,
                        String::from_utf8_lossy(&buf[..len]).trim()
                    );
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.socket
            .set_nonblocking(false)
            .context("restore tello socket blocking mode")?;
        drained.context("drain tello socket")
    }

    /// Send `command` and return the trimmed reply.
    fn send_command(&mut self, command: &str, timeout: Duration) -> Result<String> {
        self.drain_stale()?;
        self.socket
            .send_to(command.as_bytes(), self.drone)
            .map_err(|e| action_error(format!("send '{}' failed: {}", command, e)))?;

        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; MAX_REPLY_BYTES];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(action_error(format!(
                    "no reply to '{}' within {:?}",
                    command, timeout
                )));
            }
            self.socket
                .set_read_timeout(Some(remaining))
                .context("set tello read timeout")?;
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    return Err(action_error(format!(
                        "receive reply to '{}' failed: {}",
                        command, e
                    )))
                }
            };
            if from != self.drone {
                continue;
            }
            let reply = String::from_utf8_lossy(&buf[..len]).trim().to_string();
            log::debug!("tello '{}' -> '{}'", command, reply);
            return Ok(reply);
        }
    }

    /// Send a control command that must be acknowledged with `ok`.
    fn send_control(&mut self, command: &str, timeout: Duration) -> Result<()> {
        let reply = self.send_command(command, timeout)?;
        if reply.eq_ignore_ascii_case("ok") {
            Ok(())
        } else {
            Err(action_error(format!("'{}' rejected: {}", command, reply)))
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected {
            return Err(action_error("tello not connected".to_string()));
        }
        Ok(())
    }
}

fn action_error(message: String) -> anyhow::Error {
    FacelinkError::PlatformAction(message).into()
}

impl Platform for TelloPlatform {
    fn connect(&mut self) -> Result<()> {
        self.send_control("command", self.timeout)?;
        self.connected = true;
        log::info!("tello connected at {}", self.drone);
        Ok(())
    }

    fn takeoff(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.send_control("takeoff", MANOEUVRE_TIMEOUT.max(self.timeout))
    }

    fn land(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.send_control("land", MANOEUVRE_TIMEOUT.max(self.timeout))
    }

    fn battery(&mut self) -> Result<u8> {
        self.ensure_connected()?;
        let reply = self.send_command("battery?", self.timeout)?;
        reply
            .parse::<u8>()
            .map_err(|_| action_error(format!("unexpected battery reply '{}'", reply)))
    }

    fn stream_on(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.send_control("streamon", self.timeout)
    }

    fn stream_off(&mut self) -> Result<()> {
        self.ensure_connected()?;
        self.send_control("streamoff", self.timeout)
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            self.connected = false;
            log::info!("tello at {} released", self.drone);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Fake drone answering each command from a fixed script.
    fn fake_drone(replies: Vec<(&'static str, &'static str)>) -> (SocketAddr, thread::JoinHandle<Vec<String>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind fake drone");
        let addr = socket.local_addr().expect("fake drone addr");
        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            let mut buf = [0u8; 256];
            for (expected, reply) in replies {
                let (len, from) = socket.recv_from(&mut buf).expect("recv command");
                let command = String::from_utf8_lossy(&buf[..len]).to_string();
                assert_eq!(command, expected);
                seen.push(command);
                socket.send_to(reply.as_bytes(), from).expect("send reply");
            }
            seen
        });
        (addr, handle)
    }

    #[test]
    fn connect_battery_and_takeoff() -> Result<()> {
        let (addr, drone) = fake_drone(vec![
            ("command", "ok"),
            ("battery?", "87\r\n"),
            ("takeoff", "ok"),
        ]);
        let mut tello = TelloPlatform::new(&addr.to_string(), Duration::from_secs(2))?;
        tello.connect()?;
        assert_eq!(tello.battery()?, 87);
        tello.takeoff()?;

        let seen = drone.join().expect("fake drone thread");
        assert_eq!(seen, vec!["command", "battery?", "takeoff"]);
        Ok(())
    }

    #[test]
    fn error_reply_is_a_platform_action_error() -> Result<()> {
        let (addr, drone) = fake_drone(vec![("command", "ok"), ("takeoff", "error Not joystick")]);
        let mut tello = TelloPlatform::new(&addr.to_string(), Duration::from_secs(2))?;
        tello.connect()?;
        let err = tello.takeoff().unwrap_err();
        assert_eq!(
            FacelinkError::classify(&err).map(|k| k.code()),
            Some("PLATFORM_ACTION")
        );
        drone.join().expect("fake drone thread");
        Ok(())
    }

    #[test]
    fn late_reply_is_not_taken_for_the_next_command() -> Result<()> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        let addr = socket.local_addr()?;
        let (late_sent, wait_late) = std::sync::mpsc::channel();
        let drone = thread::spawn(move || {
            let mut buf = [0u8; 256];
            let (_, from) = socket.recv_from(&mut buf).expect("recv command");
            socket.send_to(b"ok", from).expect("send reply");
            socket.send_to(b"ok", from).expect("send late reply");
            late_sent.send(()).expect("signal late reply");
            let (len, from) = socket.recv_from(&mut buf).expect("recv battery");
            assert_eq!(&buf[..len], b"battery?");
            socket.send_to(b"64", from).expect("send battery");
        });

        let mut tello = TelloPlatform::new(&addr.to_string(), Duration::from_secs(2))?;
        tello.connect()?;
        wait_late.recv()?;
        thread::sleep(Duration::from_millis(20));
        assert_eq!(tello.battery()?, 64);
        drone.join().expect("fake drone thread");
        Ok(())
    }

    #[test]
    fn silence_times_out() -> Result<()> {
        let silent = UdpSocket::bind("127.0.0.1:0")?;
        let addr = silent.local_addr()?;
        let mut tello = TelloPlatform::new(&addr.to_string(), Duration::from_millis(50))?;
        assert!(tello.connect().is_err());
        Ok(())
    }
}
