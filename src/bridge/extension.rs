//! Engine extension wiring the bridge to the hosted application's ports.
//!
//! Inbound payloads are pushed into the app by executing a dispatch call on
//! the engine thread, the same path used for every other host-to-app event.

use std::sync::Arc;

use boa_engine::{Context, JsError, JsString, JsValue, NativeFunction, Source};
use boa_gc::{Finalize, Trace, empty_trace};

use crate::bridge::relay::{InboundListener, SocketBridge};
use crate::js::{JsEngineClient, JsEngineExtension};

/// Forwards relayed payloads into the hosted app via `__bridge_receive`.
struct PortDispatch {
    client: JsEngineClient,
}

impl InboundListener for PortDispatch {
    fn receive(&self, payload: String) {
        // Encode the payload as a JS string literal so it arrives byte-for-byte.
        match serde_json::to_string(&payload) {
            Ok(literal) => self.client.execute(format!("__bridge_receive({});", literal)),
            Err(e) => log::error!("[bridge] failed to encode payload: {}", e),
        }
    }
}

/// Clone-able bridge handle that Boa native closures can capture.
#[derive(Clone, Finalize)]
struct BridgeHandle(Arc<SocketBridge>);

unsafe impl Trace for BridgeHandle {
    empty_trace!();
}

/// Registers the socket bridge with the JS engine: the `__bridge_listen` and
/// `__bridge_close` natives, and the shim that attaches an app's ports.
pub struct BridgeExtension;

impl JsEngineExtension for BridgeExtension {
    fn register(&self, context: &mut Context, client: JsEngineClient) -> Result<(), JsError> {
        let bridge = BridgeHandle(Arc::new(SocketBridge::new(Arc::new(PortDispatch {
            client,
        }))));
        register_bridge_functions(context, bridge);
        register_ports_shim(context);
        Ok(())
    }
}

/// Register bridge native functions
fn register_bridge_functions(context: &mut Context, bridge: BridgeHandle) {
    // __bridge_listen(url: string) -> void
    context
        .register_global_callable(
            JsString::from("__bridge_listen"),
            1,
            NativeFunction::from_copy_closure_with_captures(
                |_this: &JsValue, args: &[JsValue], bridge: &BridgeHandle, _ctx: &mut Context| {
                    let url = args
                        .first()
                        .and_then(|v| v.as_string())
                        .map(|s| s.to_std_string_escaped())
                        .unwrap_or_default();

                    log::info!("[bridge native] listen({})", url);
                    bridge.0.listen(url);
                    Ok(JsValue::undefined())
                },
                bridge.clone(),
            ),
        )
        .expect("Failed to register __bridge_listen");

    // __bridge_close() -> void
    context
        .register_global_callable(
            JsString::from("__bridge_close"),
            0,
            NativeFunction::from_copy_closure_with_captures(
                |_this: &JsValue, _args: &[JsValue], bridge: &BridgeHandle, _ctx: &mut Context| {
                    log::info!("[bridge native] close()");
                    bridge.0.close();
                    Ok(JsValue::undefined())
                },
                bridge,
            ),
        )
        .expect("Failed to register __bridge_close");

    log::debug!("Registered bridge native functions");
}

/// Register the ports glue shim
fn register_ports_shim(context: &mut Context) {
    let shim = r#"
(function() {
    var app = null;

    // Called by the boot script once the app instance exists
    globalThis.__bridge_attach = function(instance) {
        if (app) {
            console.warn('[Bridge JS] App already attached, ignoring');
            return;
        }
        if (!instance || !instance.ports) {
            console.warn('[Bridge JS] Instance has no ports, nothing to attach');
            return;
        }
        app = instance;

        if (app.ports.listen) {
            app.ports.listen.subscribe(function(url) { __bridge_listen(url); });
        }
        if (app.ports.closeConnection) {
            app.ports.closeConnection.subscribe(function() { __bridge_close(); });
        }

        console.log('[Bridge JS] Ports attached');
    };

    // Called from Rust once per inbound socket message
    globalThis.__bridge_receive = function(payload) {
        if (!app) {
            console.warn('[Bridge JS] Payload received before an app was attached');
            return;
        }
        if (app.ports.receive) {
            app.ports.receive.send(payload);
        }
    };

    console.log('[Shims] Port bridge initialized');
})();
    "#;

    if let Err(e) = context.eval(Source::from_bytes(shim.as_bytes())) {
        log::error!("Failed to register ports shim: {:?}", e);
    }
}
