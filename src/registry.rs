//! Device session registry — name-keyed UART handles and data callbacks.
//!
//! The registry owns every open handle: two tables keyed by device name,
//! one for handles and one for registered data callbacks, guarded by a
//! single mutex. A name appears in the callback table only while it also
//! appears in the handle table; closing a device drops both entries.
//!
//! Every bridge operation routes through here. Handlers check their
//! preconditions against the tables before touching the driver, and a
//! driver failure surfaces as a [`BridgeError::Device`] with the driver's
//! message, leaving the tables unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::driver::{DataSink, PeripheralManager, UartDevice};
use crate::error::{BridgeError, Result};
use crate::events::{EventBus, UartEvent};

/// The two session tables. Only registry operations mutate these; data
/// sinks never touch them.
#[derive(Default)]
struct Sessions {
    devices: HashMap<String, Box<dyn UartDevice>>,
    callbacks: HashMap<String, DataSink>,
}

/// Owns all open UART sessions for one bridge instance.
pub struct DeviceRegistry {
    driver: Arc<dyn PeripheralManager>,
    events: EventBus,
    default_baud_rate: u32,
    sessions: Mutex<Sessions>,
}

fn ensure_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BridgeError::InvalidArgument);
    }
    Ok(())
}

fn lookup<'a>(sessions: &'a mut Sessions, name: &str) -> Result<&'a mut Box<dyn UartDevice>> {
    sessions.devices.get_mut(name).ok_or(BridgeError::NotOpen)
}

impl DeviceRegistry {
    pub fn new(driver: Arc<dyn PeripheralManager>, events: EventBus, config: &BridgeConfig) -> Self {
        Self {
            driver,
            events,
            default_baud_rate: config.default_baud_rate,
            sessions: Mutex::new(Sessions::default()),
        }
    }

    /// Open `name`, optionally applying an initial baud rate. Opening an
    /// already-open name succeeds without re-opening or re-configuring it.
    pub async fn open_uart(&self, name: &str, rate: Option<u32>) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        if sessions.devices.contains_key(name) {
            debug!(device = %name, "already open");
            return Ok(());
        }

        let mut device = self.driver.open(name, self.default_baud_rate).await?;
        if let Some(rate) = rate {
            if let Err(e) = device.set_baud_rate(rate).await {
                // Initial configuration failed: release the half-open handle
                // and leave the tables unchanged.
                let _ = device.close().await;
                return Err(e);
            }
        }

        sessions.devices.insert(name.to_string(), device);
        info!(device = %name, "uart opened");
        Ok(())
    }

    /// Release `name`. The driver-side close is best-effort; both table
    /// entries are removed regardless.
    pub async fn close(&self, name: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let mut device = sessions
            .devices
            .remove(name)
            .ok_or(BridgeError::NotOpen)?;
        sessions.callbacks.remove(name);
        if let Err(e) = device.close().await {
            warn!(device = %name, error = %e, "driver close failed; handle dropped anyway");
        }
        info!(device = %name, "uart closed");
        Ok(())
    }

    pub async fn flush(&self, name: &str, direction: u32) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?.flush(direction).await
    }

    /// Read up to `length` bytes. A short read (including zero bytes) is a
    /// success carrying the smaller count.
    pub async fn read(&self, name: &str, length: usize) -> Result<Vec<u8>> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?.read(length).await
    }

    /// Write `bytes` in a single driver call and return the count the
    /// driver claims to have written. Partial writes are not retried.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<usize> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?.write(bytes).await
    }

    pub async fn send_break(&self, name: &str, duration_ms: u32) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?.send_break(duration_ms).await
    }

    pub async fn set_baud_rate(&self, name: &str, rate: u32) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?.set_baud_rate(rate).await
    }

    pub async fn set_data_size(&self, name: &str, size: u32) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?.set_data_size(size).await
    }

    pub async fn set_hardware_flow_control(&self, name: &str, mode: u32) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?
            .set_hardware_flow_control(mode)
            .await
    }

    pub async fn set_modem_control(&self, name: &str, lines: u32) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?.set_modem_control(lines).await
    }

    pub async fn set_parity(&self, name: &str, mode: u32) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?.set_parity(mode).await
    }

    pub async fn set_stop_bits(&self, name: &str, bits: u32) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        lookup(&mut sessions, name)?.set_stop_bits(bits).await
    }

    /// Register a data-available callback for `name`. Registering an
    /// already-registered name succeeds without adding a second sink.
    ///
    /// The sink captures only the device name and an event-bus sender; it
    /// holds no reference back to the registry and never mutates it.
    pub async fn register_callback(&self, name: &str) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        if !sessions.devices.contains_key(name) {
            return Err(BridgeError::NotOpen);
        }
        if sessions.callbacks.contains_key(name) {
            debug!(device = %name, "callback already registered");
            return Ok(());
        }

        let events = self.events.clone();
        let device_name = name.to_string();
        let sink: DataSink = Arc::new(move || {
            events.send(UartEvent::DataAvailable {
                device: device_name.clone(),
            });
        });

        lookup(&mut sessions, name)?.watch_data(sink.clone()).await?;
        sessions.callbacks.insert(name.to_string(), sink);
        info!(device = %name, "data callback registered");
        Ok(())
    }

    /// Remove the data callback for `name` from both the registry and the
    /// driver.
    pub async fn unregister_callback(&self, name: &str) -> Result<()> {
        ensure_name(name)?;
        let mut sessions = self.sessions.lock().await;
        if !sessions.devices.contains_key(name) {
            return Err(BridgeError::NotOpen);
        }
        if !sessions.callbacks.contains_key(name) {
            return Err(BridgeError::NotRegistered);
        }
        lookup(&mut sessions, name)?.unwatch_data().await;
        sessions.callbacks.remove(name);
        info!(device = %name, "data callback unregistered");
        Ok(())
    }

    /// Best-effort close of every open handle, then clear both tables.
    /// Idempotent; invoked once at session end.
    pub async fn teardown(&self) {
        let mut sessions = self.sessions.lock().await;
        for (name, mut device) in sessions.devices.drain() {
            if let Err(e) = device.close().await {
                warn!(device = %name, error = %e, "close during teardown failed");
            }
        }
        sessions.callbacks.clear();
        info!("registry torn down");
    }

    /// Names with an open handle, in no particular order.
    pub async fn open_device_names(&self) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        sessions.devices.keys().cloned().collect()
    }

    /// Names with a registered data callback, in no particular order.
    pub async fn registered_callback_names(&self) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        sessions.callbacks.keys().cloned().collect()
    }
}
