//! Scripted driver for unit tests.
//!
//! `MockDriver` records every call it receives and lets tests script the
//! next outcome: queued read chunks, an overridden write count, or an
//! injected failure for the next device operation. Captured data sinks can
//! be fired from tests to exercise the event path.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{DataSink, PeripheralManager, UartDevice};
use crate::error::{BridgeError, Result};

/// Shared, inspectable state behind a [`MockDriver`] and all handles it
/// has produced.
#[derive(Default)]
pub struct MockDriverState {
    /// When set, the next `open` fails with this message.
    pub open_error: Mutex<Option<String>>,
    /// When set, the next device operation fails with this message.
    pub device_error: Mutex<Option<String>>,
    /// Chunks handed out by successive `read` calls.
    pub reads: Mutex<VecDeque<Vec<u8>>>,
    /// Count claimed by `write`; `None` echoes the input length.
    pub write_count: Mutex<Option<usize>>,
    /// Every device operation, formatted as `"<op> <name>"`.
    pub calls: Mutex<Vec<String>>,
    /// Names passed to `open`, in order.
    pub opens: Mutex<Vec<String>>,
    /// Names of handles that have been closed, in order.
    pub closes: Mutex<Vec<String>>,
    /// Data sinks currently registered, by device name.
    pub sinks: Mutex<HashMap<String, DataSink>>,
}

impl MockDriverState {
    pub fn fail_next_open(&self, message: &str) {
        *self.open_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_next_device_op(&self, message: &str) {
        *self.device_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn queue_read(&self, chunk: &[u8]) {
        self.reads.lock().unwrap().push_back(chunk.to_vec());
    }

    pub fn set_write_count(&self, count: usize) {
        *self.write_count.lock().unwrap() = Some(count);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Fire the sink registered for `name`, as the driver would on data
    /// arrival. Panics if no sink is registered (test bug).
    pub fn fire_data_available(&self, name: &str) {
        let sink = self
            .sinks
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("no sink registered for {}", name));
        sink();
    }

    pub fn has_sink(&self, name: &str) -> bool {
        self.sinks.lock().unwrap().contains_key(name)
    }

    fn record(&self, op: &str, name: &str) {
        self.calls.lock().unwrap().push(format!("{} {}", op, name));
    }

    fn take_device_error(&self) -> Option<BridgeError> {
        self.device_error
            .lock()
            .unwrap()
            .take()
            .map(BridgeError::Device)
    }
}

/// Test implementation of [`PeripheralManager`].
#[derive(Default)]
pub struct MockDriver {
    pub state: Arc<MockDriverState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PeripheralManager for MockDriver {
    async fn open(&self, name: &str, _baud_rate: u32) -> Result<Box<dyn UartDevice>> {
        if let Some(message) = self.state.open_error.lock().unwrap().take() {
            return Err(BridgeError::Device(message));
        }
        self.state.opens.lock().unwrap().push(name.to_string());
        Ok(Box::new(MockUartDevice {
            name: name.to_string(),
            state: self.state.clone(),
        }))
    }
}

/// Handle produced by [`MockDriver`]; all behavior lives in the shared state.
pub struct MockUartDevice {
    name: String,
    state: Arc<MockDriverState>,
}

impl MockUartDevice {
    fn scripted(&self, op: &str) -> Result<()> {
        self.state.record(op, &self.name);
        match self.state.take_device_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UartDevice for MockUartDevice {
    async fn close(&mut self) -> Result<()> {
        self.state.record("close", &self.name);
        self.state.closes.lock().unwrap().push(self.name.clone());
        self.state.sinks.lock().unwrap().remove(&self.name);
        match self.state.take_device_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn flush(&mut self, _direction: u32) -> Result<()> {
        self.scripted("flush")
    }

    async fn read(&mut self, length: usize) -> Result<Vec<u8>> {
        self.scripted("read")?;
        let mut chunk = self
            .state
            .reads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        chunk.truncate(length);
        Ok(chunk)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        self.scripted("write")?;
        Ok(self.state.write_count.lock().unwrap().unwrap_or(bytes.len()))
    }

    async fn send_break(&mut self, _duration_ms: u32) -> Result<()> {
        self.scripted("send_break")
    }

    async fn set_baud_rate(&mut self, _rate: u32) -> Result<()> {
        self.scripted("set_baud_rate")
    }

    async fn set_data_size(&mut self, _size: u32) -> Result<()> {
        self.scripted("set_data_size")
    }

    async fn set_hardware_flow_control(&mut self, _mode: u32) -> Result<()> {
        self.scripted("set_hardware_flow_control")
    }

    async fn set_modem_control(&mut self, _lines: u32) -> Result<()> {
        self.scripted("set_modem_control")
    }

    async fn set_parity(&mut self, _mode: u32) -> Result<()> {
        self.scripted("set_parity")
    }

    async fn set_stop_bits(&mut self, _bits: u32) -> Result<()> {
        self.scripted("set_stop_bits")
    }

    async fn watch_data(&mut self, sink: DataSink) -> Result<()> {
        self.scripted("watch_data")?;
        self.state
            .sinks
            .lock()
            .unwrap()
            .insert(self.name.clone(), sink);
        Ok(())
    }

    async fn unwatch_data(&mut self) {
        self.state.record("unwatch_data", &self.name);
        self.state.sinks.lock().unwrap().remove(&self.name);
    }
}
