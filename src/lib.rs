//! uartbridge — expose SBC UART peripherals to a hybrid-app JavaScript
//! runtime.
//!
//! The bridge accepts JSON requests (action name + ordered argument list),
//! routes each one through the [`DeviceRegistry`], and answers with exactly
//! one success or error response. Data-available notifications flow the
//! other way, from driver-owned watcher tasks through the [`EventBus`]
//! onto the event channel.
//!
//! ```text
//! JS runtime ── stdin line ─▶ bridge::stdio ─▶ Dispatcher ─▶ DeviceRegistry
//!                                                               │
//! JS runtime ◀─ stdout line ── EventBus ◀── driver watcher ◀────┘
//! ```
//!
//! Hardware access lives behind the [`driver::PeripheralManager`] /
//! [`driver::UartDevice`] traits; the shipped implementation drives
//! tokio-serial.

pub mod bridge;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod registry;

pub use bridge::{BridgeRequest, BridgeResponse, Dispatcher};
pub use config::BridgeConfig;
pub use driver::{NativePeripheralManager, PeripheralManager, UartDevice};
pub use error::{BridgeError, Result};
pub use events::{EventBus, UartEvent};
pub use registry::DeviceRegistry;
