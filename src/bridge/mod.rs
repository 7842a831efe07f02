//! Socket Relay Bridge
//!
//! Relays messages between the hosted application and a single outbound
//! WebSocket connection. The application requests the connection through its
//! outbound ports; every text frame received on the socket is pushed back
//! through the application's `receive` port, unmodified and in arrival order.

mod extension;
mod relay;

pub use extension::BridgeExtension;
pub use relay::{InboundListener, SocketBridge, WS_CLOSED, WS_CLOSING, WS_CONNECTING, WS_OPEN};
