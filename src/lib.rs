//! # boa_ports
//!
//! Host a pre-built, ports-style web application inside the Boa JavaScript
//! engine, with a bridge that relays messages between the application and a
//! single WebSocket connection.
//!
//! The hosted application communicates through three named ports:
//! `listen(url)` and `closeConnection()` outbound (app to bridge), and
//! `receive(payload)` inbound (bridge to app). Payloads are opaque text and
//! are relayed unmodified, in arrival order.
//!
//! ## Example
//!
//! ```no_run
//! use boa_ports::{DevServerSource, PortsApp};
//!
//! fn main() {
//!     // Load the app bundle from a local dev server
//!     let source = DevServerSource::default()
//!         .with_module_name("ports-demo")
//!         .with_entry_point("src/index.js");
//!
//!     let app = PortsApp::mount(source, "app").expect("Failed to mount app");
//!
//!     // Pump the JS event loop so timers and socket events keep flowing
//!     loop {
//!         app.tick();
//!         std::thread::sleep(std::time::Duration::from_millis(16));
//!     }
//! }
//! ```

mod app;
mod bridge;
mod js;

pub use app::*;
pub use bridge::*;
pub use js::{JsCommand, JsEngine, JsEngineBuilder, JsEngineClient, JsEngineExtension};
