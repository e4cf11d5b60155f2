use super::port::SerialPort;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inner {
    inbound: VecDeque<u8>,
    outbound: Vec<String>,
}

/// In-memory serial port for tests
///
/// Clones share the same buffers, so a test keeps one clone to feed peer
/// bytes and inspect written lines while the channel owns the other.
#[derive(Clone, Default)]
pub struct MemoryPort {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&self, data: &str) {
        self.inner
            .lock()
            .unwrap()
            .inbound
            .extend(data.as_bytes().iter().copied());
    }

    pub fn sent_lines(&self) -> Vec<String> {
        self.inner.lock().unwrap().outbound.clone()
    }

    pub fn clear_sent(&self) {
        self.inner.lock().unwrap().outbound.clear();
    }
}

impl SerialPort for MemoryPort {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let n = buf.len().min(inner.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(inner.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.inner.lock().unwrap().outbound.push(line.to_string());
        Ok(())
    }
}
