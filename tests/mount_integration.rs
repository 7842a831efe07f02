//! End-to-end pipeline: mount a ports-style bundle, let it request a socket,
//! and check that payloads from a real WebSocket server arrive through the
//! app's `receive` port unmodified and in order.

use std::time::Duration;

use boa_engine::{Context, JsError, JsString, JsValue, NativeFunction};
use boa_gc::{Finalize, Trace, empty_trace};
use futures_util::SinkExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use boa_ports::{
    BridgeExtension, EnvironmentExtension, JsEngineBuilder, JsEngineClient, JsEngineExtension,
};

#[derive(Clone, Finalize)]
struct Sink {
    tx: mpsc::UnboundedSender<String>,
}

unsafe impl Trace for Sink {
    empty_trace!();
}

/// Exposes `__sink_push(payload)` so the test app can report what it received.
struct SinkExtension {
    tx: mpsc::UnboundedSender<String>,
}

impl JsEngineExtension for SinkExtension {
    fn register(&self, context: &mut Context, _client: JsEngineClient) -> Result<(), JsError> {
        context
            .register_global_callable(
                JsString::from("__sink_push"),
                1,
                NativeFunction::from_copy_closure_with_captures(
                    |_this: &JsValue, args: &[JsValue], sink: &Sink, _ctx: &mut Context| {
                        let payload = args
                            .first()
                            .and_then(|v| v.as_string())
                            .map(|s| s.to_std_string_escaped())
                            .unwrap_or_default();
                        let _ = sink.tx.send(payload);
                        Ok(JsValue::undefined())
                    },
                    Sink { tx: self.tx.clone() },
                ),
            )
            .expect("Failed to register __sink_push");
        Ok(())
    }
}

/// A stand-in for a compiled ports app: it asks for the socket as soon as the
/// host subscribes to its outbound port, and funnels everything arriving on
/// its `receive` port into the test sink.
fn fake_bundle(url: &str) -> String {
    format!(
        r#"
export default {{
    init: function(flags) {{
        return {{
            ports: {{
                listen: {{
                    subscribe: function(request) {{ request('{url}'); }}
                }},
                closeConnection: {{
                    subscribe: function(request) {{}}
                }},
                receive: {{
                    send: function(payload) {{ __sink_push(payload); }}
                }}
            }}
        }};
    }}
}};
"#
    )
}

#[tokio::test]
async fn mounted_app_receives_relayed_socket_payloads() {
    let payloads = ["alpha", "{\"beta\":2}", "gamma with \"quotes\" and β"];

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        for payload in payloads {
            ws.send(Message::Text(payload.into())).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = JsEngineBuilder::new()
        .with_extension(EnvironmentExtension)
        .with_extension(BridgeExtension)
        .with_extension(SinkExtension { tx })
        .build()
        .expect("engine should build");
    let client = engine.client();
    let _engine_thread = engine.run();

    let url = format!("ws://{}", addr);
    client.load_esm_module("fake-ports-app", fake_bundle(&url));
    client.execute(
        r#"
        (async () => {
            const mod = await import('fake-ports-app');
            const app = mod.default.init({ node: 'app' });
            __bridge_attach(app);
        })()
        "#,
    );

    for expected in payloads {
        let got = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for payload")
            .expect("sink channel closed");
        assert_eq!(got, expected);
    }

    client.shutdown();
}
