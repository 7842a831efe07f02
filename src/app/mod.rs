//! # Ports App Host
//!
//! Mounts a pre-built, ports-style web application bundle into the embedded
//! JS engine and wires its socket ports to the relay bridge.
//!
//! ## Example
//!
//! ```no_run
//! use boa_ports::{DevServerSource, PortsApp};
//!
//! let source = DevServerSource::default().with_entry_point("src/index.js");
//! let app = PortsApp::mount(source, "app").expect("Failed to mount app");
//!
//! loop {
//!     app.tick();
//!     std::thread::sleep(std::time::Duration::from_millis(16));
//! }
//! ```

mod host;
mod shim;
mod source;

pub use host::PortsApp;
pub use shim::EnvironmentExtension;
pub use source::{AppScriptSource, DevServerSource};
