use boa_engine::{Context, JsError, Source};

use crate::js::{JsEngineClient, JsEngineExtension};

/// Browser-environment shims the hosted bundle expects.
pub struct EnvironmentExtension;

impl JsEngineExtension for EnvironmentExtension {
    fn register(&self, context: &mut Context, _client: JsEngineClient) -> Result<(), JsError> {
        register_environment_shims(context);
        Ok(())
    }
}

fn register_environment_shims(context: &mut Context) {
    let shims = r#"
(function() {
    // 1. Global Object & Window
    globalThis.window = globalThis;
    globalThis.self = globalThis;

    // 2. Location (needed for URL resolution with relative paths)
    globalThis.location = {
        href: 'http://localhost:1234/',
        origin: 'http://localhost:1234',
        protocol: 'http:',
        host: 'localhost:1234',
        hostname: 'localhost',
        port: '1234',
        pathname: '/',
        search: '',
        hash: ''
    };

    // 3. Process Environment (bundlers leave NODE_ENV checks in the output)
    globalThis.process = {
        env: {
            NODE_ENV: 'development'
        }
    };

    // 4. RequestAnimationFrame (simulated with setTimeout)
    globalThis.requestAnimationFrame = function(callback) {
        return setTimeout(function() { callback(Date.now()); }, 16);
    };

    globalThis.cancelAnimationFrame = function(id) {
        clearTimeout(id);
    };

    // 5. Performance
    if (!globalThis.performance) {
        globalThis.performance = {
            now: function() { return Date.now(); }
        };
    }

    console.log('[Shims] Environment initialized');
})();
    "#;

    if let Err(e) = context.eval(Source::from_bytes(shims.as_bytes())) {
        log::error!("Failed to set up environment shims: {:?}", e);
    }
}
