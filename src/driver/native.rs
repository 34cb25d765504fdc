//! Native driver — UART access over tokio-serial.
//!
//! Opens serial devices by path (`/dev/ttyUSB0`, `COM3`, …) after checking
//! the configured path-prefix allowlist, and maps the bridge's integer
//! encodings onto the serialport configuration types. The data watch is a
//! spawned task polling the input-queue depth; it invokes the registered
//! sink on the empty→non-empty edge and re-arms once the queue drains.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::{debug, warn};

use super::{
    DataSink, PeripheralManager, UartDevice, FLOW_AUTO_RTSCTS, FLOW_NONE, FLOW_SOFTWARE, FLUSH_IN,
    FLUSH_IN_OUT, FLUSH_OUT, MODEM_DTR, MODEM_RTS, PARITY_EVEN, PARITY_NONE, PARITY_ODD,
};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};

/// Opens [`NativeUartDevice`] handles over tokio-serial.
pub struct NativePeripheralManager {
    allowed_path_prefixes: Vec<String>,
    poll_interval: Duration,
}

impl NativePeripheralManager {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            allowed_path_prefixes: config.allowed_path_prefixes.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    /// Security check: only known serial device paths may be opened through
    /// the bridge.
    fn is_path_allowed(&self, path: &str) -> bool {
        self.allowed_path_prefixes
            .iter()
            .any(|p| path.starts_with(p.as_str()))
    }
}

#[async_trait]
impl PeripheralManager for NativePeripheralManager {
    async fn open(&self, name: &str, baud_rate: u32) -> Result<Box<dyn UartDevice>> {
        if !self.is_path_allowed(name) {
            return Err(BridgeError::Device(format!(
                "serial path not allowed: {} (allowed prefixes: {})",
                name,
                self.allowed_path_prefixes.join(", ")
            )));
        }

        let stream = tokio_serial::new(name, baud_rate)
            .open_native_async()
            .map_err(|e| BridgeError::Device(format!("failed to open {}: {}", name, e)))?;
        debug!(device = %name, baud_rate, "serial port opened");

        Ok(Box::new(NativeUartDevice {
            name: name.to_string(),
            port: Arc::new(Mutex::new(stream)),
            poll_interval: self.poll_interval,
            watch_shutdown: None,
        }))
    }
}

/// An open serial port plus its optional data-watch task.
pub struct NativeUartDevice {
    name: String,
    /// Shared with the watch task, which only queries the input-queue depth.
    port: Arc<Mutex<SerialStream>>,
    poll_interval: Duration,
    /// Signals the watch task to exit; `None` when no watch is active.
    watch_shutdown: Option<oneshot::Sender<()>>,
}

fn device_err(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Device(e.to_string())
}

#[async_trait]
impl UartDevice for NativeUartDevice {
    async fn close(&mut self) -> Result<()> {
        self.unwatch_data().await;
        debug!(device = %self.name, "serial port closed");
        Ok(())
    }

    async fn flush(&mut self, direction: u32) -> Result<()> {
        let buffer = clear_buffer_from(direction)?;
        let port = self.port.lock().await;
        port.clear(buffer).map_err(device_err)
    }

    async fn read(&mut self, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        let mut port = self.port.lock().await;
        let n = port.read(&mut buf).await.map_err(device_err)?;
        buf.truncate(n);
        Ok(buf)
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut port = self.port.lock().await;
        port.write(bytes).await.map_err(device_err)
    }

    async fn send_break(&mut self, duration_ms: u32) -> Result<()> {
        let port = self.port.lock().await;
        port.set_break().map_err(device_err)?;
        tokio::time::sleep(Duration::from_millis(u64::from(duration_ms))).await;
        port.clear_break().map_err(device_err)
    }

    async fn set_baud_rate(&mut self, rate: u32) -> Result<()> {
        let mut port = self.port.lock().await;
        port.set_baud_rate(rate).map_err(device_err)
    }

    async fn set_data_size(&mut self, size: u32) -> Result<()> {
        let data_bits = data_bits_from(size)?;
        let mut port = self.port.lock().await;
        port.set_data_bits(data_bits).map_err(device_err)
    }

    async fn set_hardware_flow_control(&mut self, mode: u32) -> Result<()> {
        let flow = flow_control_from(mode)?;
        let mut port = self.port.lock().await;
        port.set_flow_control(flow).map_err(device_err)
    }

    async fn set_modem_control(&mut self, lines: u32) -> Result<()> {
        let mut port = self.port.lock().await;
        port.write_request_to_send(lines & MODEM_RTS != 0)
            .map_err(device_err)?;
        port.write_data_terminal_ready(lines & MODEM_DTR != 0)
            .map_err(device_err)
    }

    async fn set_parity(&mut self, mode: u32) -> Result<()> {
        let parity = parity_from(mode)?;
        let mut port = self.port.lock().await;
        port.set_parity(parity).map_err(device_err)
    }

    async fn set_stop_bits(&mut self, bits: u32) -> Result<()> {
        let stop_bits = stop_bits_from(bits)?;
        let mut port = self.port.lock().await;
        port.set_stop_bits(stop_bits).map_err(device_err)
    }

    async fn watch_data(&mut self, sink: DataSink) -> Result<()> {
        if self.watch_shutdown.is_some() {
            return Ok(());
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        self.watch_shutdown = Some(shutdown_tx);

        let port = self.port.clone();
        let name = self.name.clone();
        let interval = self.poll_interval;

        tokio::spawn(async move {
            // Edge-triggered: fire once when the input queue goes non-empty,
            // re-arm after it has been observed empty again.
            let mut armed = true;
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!(device = %name, "data watch stopped");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }

                let pending = {
                    let port = port.lock().await;
                    match port.bytes_to_read() {
                        Ok(n) => n,
                        Err(e) => {
                            warn!(device = %name, error = %e, "data watch query failed");
                            break;
                        }
                    }
                };

                if pending == 0 {
                    armed = true;
                } else if armed {
                    armed = false;
                    sink();
                }
            }
        });

        debug!(device = %self.name, "data watch started");
        Ok(())
    }

    async fn unwatch_data(&mut self) {
        if let Some(tx) = self.watch_shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn clear_buffer_from(direction: u32) -> Result<ClearBuffer> {
    match direction {
        FLUSH_IN => Ok(ClearBuffer::Input),
        FLUSH_OUT => Ok(ClearBuffer::Output),
        FLUSH_IN_OUT => Ok(ClearBuffer::All),
        other => Err(BridgeError::Device(format!(
            "unsupported flush direction {}",
            other
        ))),
    }
}

fn parity_from(mode: u32) -> Result<Parity> {
    match mode {
        PARITY_NONE => Ok(Parity::None),
        PARITY_EVEN => Ok(Parity::Even),
        PARITY_ODD => Ok(Parity::Odd),
        other => Err(BridgeError::Device(format!(
            "unsupported parity mode {}",
            other
        ))),
    }
}

fn stop_bits_from(bits: u32) -> Result<StopBits> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(BridgeError::Device(format!(
            "unsupported stop-bit count {}",
            other
        ))),
    }
}

fn data_bits_from(size: u32) -> Result<DataBits> {
    match size {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(BridgeError::Device(format!(
            "unsupported data size {}",
            other
        ))),
    }
}

fn flow_control_from(mode: u32) -> Result<FlowControl> {
    match mode {
        FLOW_NONE => Ok(FlowControl::None),
        FLOW_AUTO_RTSCTS => Ok(FlowControl::Hardware),
        FLOW_SOFTWARE => Ok(FlowControl::Software),
        other => Err(BridgeError::Device(format!(
            "unsupported flow-control mode {}",
            other
        ))),
    }
}
