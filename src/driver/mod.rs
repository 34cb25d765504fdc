//! Peripheral driver contract — the external UART service the bridge drives.
//!
//! The bridge itself never touches hardware. It talks to a
//! [`PeripheralManager`] that opens named devices and hands back exclusive
//! [`UartDevice`] handles. The native implementation ([`native`]) sits on
//! tokio-serial; tests use a scripted mock driver.
//!
//! Configuration values (parity, flow control, flush direction, modem
//! lines…) cross the bridge as raw integers. Their legal ranges belong to
//! the driver, not the registry: a handle rejects an encoding it does not
//! support with its own error message.

pub mod native;

#[cfg(test)]
pub mod mock;

pub use native::NativePeripheralManager;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Notification sink invoked by the driver when data becomes available.
///
/// Called from a driver-owned task, concurrently with request handling.
/// Implementations must be non-blocking fire-and-forget hand-offs.
pub type DataSink = Arc<dyn Fn() + Send + Sync>;

/// Flush direction encodings accepted by [`UartDevice::flush`].
pub const FLUSH_IN: u32 = 0;
pub const FLUSH_OUT: u32 = 1;
pub const FLUSH_IN_OUT: u32 = 2;

/// Hardware flow-control encodings for
/// [`UartDevice::set_hardware_flow_control`].
pub const FLOW_NONE: u32 = 0;
pub const FLOW_AUTO_RTSCTS: u32 = 1;
pub const FLOW_SOFTWARE: u32 = 2;

/// Parity encodings for [`UartDevice::set_parity`].
pub const PARITY_NONE: u32 = 0;
pub const PARITY_EVEN: u32 = 1;
pub const PARITY_ODD: u32 = 2;

/// Modem-control line bits for [`UartDevice::set_modem_control`].
/// A set bit asserts the line, a clear bit deasserts it.
pub const MODEM_RTS: u32 = 0x1;
pub const MODEM_DTR: u32 = 0x2;

/// Factory for opening named UART devices.
#[async_trait]
pub trait PeripheralManager: Send + Sync {
    /// Open the named device at the given line rate and return an exclusive
    /// handle to it.
    async fn open(&self, name: &str, baud_rate: u32) -> Result<Box<dyn UartDevice>>;
}

/// An open, exclusive session bound to one UART peripheral.
///
/// Handles are owned by the device session registry; every bridge operation
/// reaches the hardware through exactly one of these methods. All methods
/// run to completion or failure — there is no cancellation at this layer.
#[async_trait]
pub trait UartDevice: Send {
    /// Release the underlying peripheral. Also stops any active data watch.
    async fn close(&mut self) -> Result<()>;

    /// Discard pending data from the given buffer(s); see [`FLUSH_IN`],
    /// [`FLUSH_OUT`], [`FLUSH_IN_OUT`].
    async fn flush(&mut self, direction: u32) -> Result<()>;

    /// Read up to `length` bytes in a single call. A short read (including
    /// zero bytes) is returned as-is, never retried.
    async fn read(&mut self, length: usize) -> Result<Vec<u8>>;

    /// Write the byte sequence in a single call and return the count the
    /// driver accepted, which may be less than `bytes.len()`.
    async fn write(&mut self, bytes: &[u8]) -> Result<usize>;

    /// Assert a break condition for `duration_ms` milliseconds.
    async fn send_break(&mut self, duration_ms: u32) -> Result<()>;

    async fn set_baud_rate(&mut self, rate: u32) -> Result<()>;

    /// Set the word size in bits (5–8).
    async fn set_data_size(&mut self, size: u32) -> Result<()>;

    async fn set_hardware_flow_control(&mut self, mode: u32) -> Result<()>;

    /// Assert/deassert modem-control lines per the [`MODEM_RTS`] /
    /// [`MODEM_DTR`] bitmask.
    async fn set_modem_control(&mut self, lines: u32) -> Result<()>;

    async fn set_parity(&mut self, mode: u32) -> Result<()>;

    /// Set the stop-bit count (1 or 2).
    async fn set_stop_bits(&mut self, bits: u32) -> Result<()>;

    /// Begin invoking `sink` whenever data becomes available on this device.
    /// The sink runs on a driver-owned task and must not be blocked on.
    async fn watch_data(&mut self, sink: DataSink) -> Result<()>;

    /// Stop data-available notifications. A no-op when no watch is active.
    async fn unwatch_data(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Both traits must stay object-safe; the registry stores
    /// `Box<dyn UartDevice>` behind an `Arc<dyn PeripheralManager>`.
    #[test]
    fn test_driver_traits_object_safety() {
        fn _assert_manager(_m: &dyn PeripheralManager) {}
        fn _assert_device(_d: &dyn UartDevice) {}
    }
}
