//! Bridge surface — wire types and the action dispatch table.
//!
//! Requests arrive as an action name plus an ordered, positional argument
//! list; every request resolves to at most one response:
//!
//! Request:  `{"id":"1","action":"openUart","args":["/dev/ttyUSB0",115200]}`
//! Response: `{"id":"1","ok":true}`
//!           `{"id":"2","ok":true,"result":{"length":3,"buffer":[65,66,67]}}`
//!           `{"id":"3","ok":false,"error":"not open!!"}`
//!
//! Unknown actions get no response at all; the line is logged and dropped.

pub mod stdio;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::driver::{FLOW_AUTO_RTSCTS, FLUSH_IN_OUT};
use crate::error::Result;
use crate::registry::DeviceRegistry;

/// One inbound bridge call.
#[derive(Debug, Deserialize)]
pub struct BridgeRequest {
    /// Correlation id, echoed back on the response.
    #[serde(default)]
    pub id: Option<String>,
    pub action: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// The single terminal response to a request.
#[derive(Debug, Serialize)]
pub struct BridgeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    fn success(id: Option<String>) -> Self {
        Self {
            id,
            ok: true,
            result: None,
            error: None,
        }
    }

    fn with_result(id: Option<String>, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<String>, message: String) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(message),
        }
    }
}

/// Routes each action name to its registry operation.
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatch one request. Returns `None` for unknown actions — the
    /// caller receives no response for those.
    pub async fn dispatch(&self, request: BridgeRequest) -> Option<BridgeResponse> {
        let BridgeRequest { id, action, args } = request;
        let name = str_arg(&args, 0);

        let outcome: Result<Option<Value>> = match action.as_str() {
            "openUart" => self
                .registry
                .open_uart(&name, u32_arg(&args, 1))
                .await
                .map(|_| None),
            "close" => self.registry.close(&name).await.map(|_| None),
            "flush" => self
                .registry
                .flush(&name, u32_arg(&args, 1).unwrap_or(FLUSH_IN_OUT))
                .await
                .map(|_| None),
            "read" => {
                let length = usize_arg(&args, 1).unwrap_or(1);
                self.registry.read(&name, length).await.map(|bytes| {
                    Some(json!({ "length": bytes.len(), "buffer": bytes }))
                })
            }
            "sendBreak" => self
                .registry
                .send_break(&name, u32_arg(&args, 1).unwrap_or(0))
                .await
                .map(|_| None),
            "setBaudrate" => self
                .registry
                .set_baud_rate(&name, u32_arg(&args, 1).unwrap_or(0))
                .await
                .map(|_| None),
            "setDataSize" => self
                .registry
                .set_data_size(&name, u32_arg(&args, 1).unwrap_or(0))
                .await
                .map(|_| None),
            "setHardwareFlowControl" => self
                .registry
                .set_hardware_flow_control(&name, u32_arg(&args, 1).unwrap_or(FLOW_AUTO_RTSCTS))
                .await
                .map(|_| None),
            "setModemControl" => self
                .registry
                .set_modem_control(&name, u32_arg(&args, 1).unwrap_or(0))
                .await
                .map(|_| None),
            "setParity" => self
                .registry
                .set_parity(&name, u32_arg(&args, 1).unwrap_or(0))
                .await
                .map(|_| None),
            "setStopBits" => self
                .registry
                .set_stop_bits(&name, u32_arg(&args, 1).unwrap_or(0))
                .await
                .map(|_| None),
            "write" => self
                .registry
                .write(&name, &bytes_arg(&args, 1))
                .await
                .map(|written| Some(json!(written))),
            "registerUartDeviceCallback" => {
                self.registry.register_callback(&name).await.map(|_| None)
            }
            "unregisterUartDeviceCallback" => {
                self.registry.unregister_callback(&name).await.map(|_| None)
            }
            _ => {
                warn!(action = %action, "unknown action; request dropped");
                return None;
            }
        };

        Some(match outcome {
            Ok(None) => BridgeResponse::success(id),
            Ok(Some(result)) => BridgeResponse::with_result(id, result),
            Err(e) => BridgeResponse::failure(id, e.to_string()),
        })
    }
}

/// Positional string argument; absent or non-string becomes the empty
/// string, which the registry rejects as an invalid name.
fn str_arg(args: &[Value], index: usize) -> String {
    args.get(index)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn u32_arg(args: &[Value], index: usize) -> Option<u32> {
    args.get(index).and_then(Value::as_u64).map(|v| v as u32)
}

fn usize_arg(args: &[Value], index: usize) -> Option<usize> {
    args.get(index).and_then(Value::as_u64).map(|v| v as usize)
}

/// Positional byte-array argument; each element is truncated to a byte,
/// matching the coercion the JavaScript side applies.
fn bytes_arg(args: &[Value], index: usize) -> Vec<u8> {
    args.get(index)
        .and_then(Value::as_array)
        .map(|array| {
            array
                .iter()
                .map(|v| v.as_i64().unwrap_or(0) as u8)
                .collect()
        })
        .unwrap_or_default()
}
