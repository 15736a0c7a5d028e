//! Test utilities & fixtures.
//! Provides an in-memory serial device that the bridge can open in place of real hardware.

#![allow(dead_code)] // Each test binary uses a different subset of these helpers.

use serialterm::serial::{BridgeError, BridgeEvent, EventReceiver, PortConfig, PortOpener, SerialLink};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Read timeout used by tests; short so lifecycle tests stay fast.
pub const TICK: Duration = Duration::from_millis(20);

#[derive(Default)]
pub struct MockState {
    /// Chunks the device will deliver, one chunk per read.
    pub inbound: VecDeque<Vec<u8>>,
    /// Every `write_all` call, in order.
    pub writes: Vec<Vec<u8>>,
    /// Loop written bytes back as inbound data.
    pub echo: bool,
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub open: bool,
    pub reads: usize,
}

/// Shared handle onto the fake device.
#[derive(Clone, Default)]
pub struct MockDevice {
    pub state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echoing() -> Self {
        let dev = Self::default();
        dev.state.lock().unwrap().echo = true;
        dev
    }

    pub fn push_inbound(&self, chunk: &[u8]) {
        self.state.lock().unwrap().inbound.push_back(chunk.to_vec());
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes().concat()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    pub fn fail_reads(&self) {
        self.state.lock().unwrap().fail_reads = true;
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }
}

struct MockLink {
    device: MockDevice,
    timeout: Duration,
}

impl SerialLink for MockLink {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        let st = self.device.state.lock().unwrap();
        Ok(st.inbound.front().map_or(0, |c| c.len() as u32))
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = Instant::now() + self.timeout;
        loop {
            {
                let mut st = self.device.state.lock().unwrap();
                st.reads += 1;
                if st.fail_reads {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
                }
                if let Some(mut chunk) = st.inbound.pop_front() {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        let rest = chunk.split_off(n);
                        st.inbound.push_front(rest);
                    }
                    return Ok(n);
                }
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"));
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut st = self.device.state.lock().unwrap();
        if st.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
        }
        st.writes.push(data.to_vec());
        if st.echo {
            st.inbound.push_back(data.to_vec());
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.device.state.lock().unwrap().inbound.clear();
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.device.state.lock().unwrap().open = false;
    }
}

/// Opens [`MockDevice`]s, or refuses to when `refuse` is set.
#[derive(Clone, Default)]
pub struct MockOpener {
    pub device: MockDevice,
    pub refuse: Option<String>,
    pub opens: Arc<AtomicUsize>,
}

impl MockOpener {
    pub fn new(device: MockDevice) -> Self {
        Self {
            device,
            refuse: None,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn refusing(reason: &str) -> Self {
        Self {
            device: MockDevice::new(),
            refuse: Some(reason.to_string()),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl PortOpener for MockOpener {
    fn open(
        &self,
        config: &PortConfig,
        timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, BridgeError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.refuse {
            return Err(BridgeError::Open {
                path: config.device_path.clone(),
                reason: reason.clone(),
            });
        }
        self.device.state.lock().unwrap().open = true;
        Ok(Box::new(MockLink {
            device: self.device.clone(),
            timeout,
        }))
    }
}

/// Receive the next event or panic after `within`.
pub async fn next_event(rx: &mut EventReceiver, within: Duration) -> BridgeEvent {
    tokio::time::timeout(within, rx.recv())
        .await
        .expect("timed out waiting for bridge event")
        .expect("event channel closed")
}

/// Collect events until `Closed` (inclusive) or panic after `within`.
pub async fn collect_until_closed(rx: &mut EventReceiver, within: Duration) -> Vec<BridgeEvent> {
    let deadline = tokio::time::Instant::now() + within;
    let mut out = Vec::new();
    loop {
        let left = deadline.saturating_duration_since(tokio::time::Instant::now());
        let ev = next_event(rx, left).await;
        let done = ev == BridgeEvent::Closed;
        out.push(ev);
        if done {
            return out;
        }
    }
}

/// Concatenate the payloads of all `Data` events.
pub fn data_bytes(events: &[BridgeEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            BridgeEvent::Data(b) => Some(b.as_slice()),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}
