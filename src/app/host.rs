//! Application mounting.
//!
//! Boots the engine with the environment and bridge extensions, loads the
//! bundle, and runs the boot script that instantiates the app and attaches
//! its ports.

use std::thread::JoinHandle;

use boa_engine::JsError;

use crate::app::shim::EnvironmentExtension;
use crate::app::source::AppScriptSource;
use crate::bridge::BridgeExtension;
use crate::js::{JsEngineBuilder, JsEngineClient};

/// A mounted ports application and its engine thread.
pub struct PortsApp {
    client: JsEngineClient,
    _engine_thread: JoinHandle<()>,
}

impl PortsApp {
    /// Mount `source` and attach its ports to the socket bridge.
    ///
    /// `mount_node` names the element the application attaches to; it is a
    /// collaborator precondition, passed through to the app's `init` untouched.
    pub fn mount(
        source: impl Into<AppScriptSource>,
        mount_node: impl Into<String>,
    ) -> Result<Self, JsError> {
        let source = source.into();

        let engine = JsEngineBuilder::new()
            .with_extension(EnvironmentExtension)
            .with_extension(BridgeExtension)
            .build()?;

        let client = engine.client();
        let engine_thread = engine.run();

        client.load_esm_module(&source.module_name, &source.source_string);
        client.execute(boot_script(&source.module_name, &mount_node.into()));

        Ok(PortsApp {
            client,
            _engine_thread: engine_thread,
        })
    }

    /// Client handle for the underlying engine.
    pub fn client(&self) -> JsEngineClient {
        self.client.clone()
    }

    /// Pump the JS event loop (timers, microtasks).
    pub fn tick(&self) {
        self.client.flush_event_loop();
    }

    /// Shut the engine down; the hosted app stops receiving events.
    pub fn shutdown(&self) {
        self.client.shutdown();
    }
}

/// Boot script: import the bundle, init the app, attach its ports.
fn boot_script(module_name: &str, mount_node: &str) -> String {
    format!(
        r#"
            (async () => {{
                try {{
                    const mod = await import('{module}');

                    if (!mod.default) {{
                        console.warn('Module does not have a default export', mod);
                        throw new Error('Module does not have a default export');
                    }}

                    const app = mod.default.init({{ node: '{node}' }});
                    __bridge_attach(app);
                }} catch (err) {{
                    console.error('Failed to boot ports app:', err);
                    if (err.stack) console.error(err.stack);
                }}
            }})()
        "#,
        module = module_name,
        node = mount_node,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_script_imports_the_module_and_attaches_ports() {
        let script = boot_script("my-app", "app-root");
        assert!(script.contains("import('my-app')"));
        assert!(script.contains("init({ node: 'app-root' })"));
        assert!(script.contains("__bridge_attach(app)"));
    }
}
