// Point-to-point byte links between boards
//
// Reads never block: a poll returns whatever bytes are already waiting.
// Writes are fire-and-forget; there is no acknowledgment on this transport.

use serialport::{self, SerialPort};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Serial read/write timeout; reads only ask for bytes already buffered
pub const DEFAULT_TIMEOUT_MS: u64 = 10;

/// Error types for board links
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Link {0} disconnected")]
    Disconnected(String),
}

pub trait Link {
    fn name(&self) -> &str;

    /// Copy already-received bytes into `buf`, returning how many
    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Queue a full frame for transmission
    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError>;
}

/// UART link to a neighbouring board
pub struct SerialLink {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, LinkError> {
        info!("Opening serial link on {} at {} baud", port_name, baud_rate);
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self {
            name: port_name.to_string(),
            port,
        })
    }
}

impl Link for SerialLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 || buf.is_empty() {
            return Ok(0);
        }

        let wanted = available.min(buf.len());
        match self.port.read(&mut buf[..wanted]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(LinkError::Io(e)),
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        debug!("TX {} bytes on {}: {:02X?}", frame.len(), self.name, frame);
        self.port.write_all(frame)?;
        self.port.flush()?;
        Ok(())
    }
}

type Pipe = Arc<Mutex<VecDeque<u8>>>;

/// In-process link end; `pair()` returns two ends wired to each other
#[derive(Debug, Clone)]
pub struct MemoryLink {
    name: String,
    rx: Pipe,
    tx: Pipe,
}

impl MemoryLink {
    pub fn pair(a: &str, b: &str) -> (MemoryLink, MemoryLink) {
        let ab: Pipe = Arc::default();
        let ba: Pipe = Arc::default();
        (
            MemoryLink {
                name: a.to_string(),
                rx: ba.clone(),
                tx: ab.clone(),
            },
            MemoryLink {
                name: b.to_string(),
                rx: ab,
                tx: ba,
            },
        )
    }

    /// Push raw bytes toward the other end, bypassing framing
    pub fn inject(&self, bytes: &[u8]) -> Result<(), LinkError> {
        self.tx
            .lock()
            .map_err(|_| LinkError::Disconnected(self.name.clone()))?
            .extend(bytes);
        Ok(())
    }

    /// Bytes waiting to be read on this end
    pub fn pending(&self) -> usize {
        self.rx.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl Link for MemoryLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let mut rx = self
            .rx
            .lock()
            .map_err(|_| LinkError::Disconnected(self.name.clone()))?;
        let n = rx.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.inject(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pair_is_crossed() {
        let (mut a, mut b) = MemoryLink::pair("a", "b");
        a.send(&[1, 2, 3]).unwrap();
        assert_eq!(b.pending(), 3);
        assert_eq!(a.pending(), 0);

        let mut buf = [0u8; 2];
        assert_eq!(b.poll_read(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(b.poll_read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 3);
        assert_eq!(b.poll_read(&mut buf).unwrap(), 0);
    }
}
