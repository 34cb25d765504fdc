//! Data-available event bus — bridges driver watcher tasks to the transport.
//!
//! Driver-owned tasks signal "data available" from arbitrary threads; the
//! bus hands those notifications to the bridge transport without blocking
//! the signaling side. Sends are fire-and-forget: if nobody is listening,
//! the event is dropped.

use serde::Serialize;
use tokio::sync::broadcast;

/// Events emitted toward the hybrid-app runtime's event channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UartEvent {
    /// A registered device has data waiting to be read.
    DataAvailable { device: String },
}

/// Broadcast-based event bus for data-available notifications.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UartEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send an event to all subscribers. Silently drops if no subscribers.
    pub fn send(&self, event: UartEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<UartEvent> {
        self.tx.subscribe()
    }

    /// Get the current number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_send_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        bus.send(UartEvent::DataAvailable {
            device: "/dev/ttyUSB0".into(),
        });
        let UartEvent::DataAvailable { device } = rx.recv().await.unwrap();
        assert_eq!(device, "/dev/ttyUSB0");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.send(UartEvent::DataAvailable {
            device: "UART0".into(),
        });
        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers_no_panic() {
        let bus = EventBus::new(16);
        // Must not panic or block even with no subscribers
        bus.send(UartEvent::DataAvailable {
            device: "UART0".into(),
        });
    }

    #[test]
    fn test_event_serialization() {
        let event = UartEvent::DataAvailable {
            device: "/dev/ttyACM0".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"data_available""#));
        assert!(json.contains(r#""device":"/dev/ttyACM0""#));
    }
}
