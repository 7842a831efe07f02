//! JavaScript Engine
//!
//! Manages the Boa JavaScript runtime with a dedicated worker thread and a
//! command channel. Boa contexts are not `Send`, so the context is built on
//! the engine thread from a builder closure assembled on the caller's side.

use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use boa_engine::{Context, JsError, Module, Source};
use boa_runtime::extensions::{ConsoleExtension, MicrotaskExtension, TimeoutExtension};

use crate::js::esm::FetchModuleLoader;

/// Shared Tokio runtime for async operations (module fetches, socket I/O).
pub(crate) static TOKIO: once_cell::sync::Lazy<tokio::runtime::Runtime> =
    once_cell::sync::Lazy::new(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("Failed to build Tokio runtime")
    });

/// Commands that can be sent to the JS engine thread.
#[derive(Debug)]
pub enum JsCommand {
    /// Load an ESM module with the given name and source.
    LoadEsmModule { name: String, source: String },
    /// Execute a JS script (non-module).
    Execute { source: String },
    /// Run pending jobs (microtasks and timers).
    FlushEventLoop,
    /// Shutdown the JS engine.
    Shutdown,
}

/// Client handle for communicating with the JS engine thread.
///
/// Cheap to clone and safe to hand to other threads.
#[derive(Clone)]
pub struct JsEngineClient {
    sender: Sender<JsCommand>,
}

impl JsEngineClient {
    /// Pump the JS event loop.
    pub fn flush_event_loop(&self) {
        if let Err(e) = self.sender.send(JsCommand::FlushEventLoop) {
            log::warn!("Failed to send flush event loop command: {}", e);
        }
    }

    /// Load an ES module.
    pub fn load_esm_module(&self, name: impl Into<String>, source: impl Into<String>) {
        if let Err(e) = self.sender.send(JsCommand::LoadEsmModule {
            name: name.into(),
            source: source.into(),
        }) {
            log::error!("Failed to send load ESM module command: {}", e);
        }
    }

    /// Execute a script.
    pub fn execute(&self, source: impl Into<String>) {
        if let Err(e) = self.sender.send(JsCommand::Execute {
            source: source.into(),
        }) {
            log::error!("Failed to send execute command: {}", e);
        }
    }

    /// Shutdown the JS engine.
    pub fn shutdown(&self) {
        let _ = self.sender.send(JsCommand::Shutdown);
    }
}

/// Extension point for exposing native APIs to the hosted application.
///
/// Implementors register their native functions and shims with the JS
/// context; the `client` lets them push events back into the engine later.
pub trait JsEngineExtension: Send + Sync + 'static {
    fn register(&self, context: &mut Context, client: JsEngineClient) -> Result<(), JsError>;
}

/// Builder assembling the engine's command channel and extensions.
pub struct JsEngineBuilder {
    extensions: Vec<Box<dyn JsEngineExtension>>,
    client: JsEngineClient,
    receiver: Receiver<JsCommand>,
}

impl JsEngineBuilder {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        JsEngineBuilder {
            extensions: vec![],
            client: JsEngineClient { sender },
            receiver,
        }
    }

    pub fn with_extension(mut self, extension: impl JsEngineExtension) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn build(self) -> Result<JsEngine, JsError> {
        let client = self.client.clone();
        let extensions = self.extensions;

        Ok(JsEngine {
            client: self.client,
            context_builder: Box::new(move || build_context(&extensions, client.clone())),
            receiver: self.receiver,
        })
    }
}

impl Default for JsEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn build_context(
    extensions: &[Box<dyn JsEngineExtension>],
    client: JsEngineClient,
) -> Result<Context, JsError> {
    let mut context = Context::builder()
        .module_loader(Rc::new(FetchModuleLoader::new()))
        .build()?;

    // Register Boa runtime extensions
    boa_runtime::register(
        (
            ConsoleExtension::default(),
            TimeoutExtension {},
            MicrotaskExtension {},
        ),
        None,
        &mut context,
    )?;

    for extension in extensions {
        extension.register(&mut context, client.clone())?;
    }

    Ok(context)
}

/// JavaScript engine with dedicated worker thread.
pub struct JsEngine {
    pub(crate) client: JsEngineClient,
    pub(crate) context_builder: Box<dyn FnOnce() -> Result<Context, JsError> + Send>,
    pub(crate) receiver: Receiver<JsCommand>,
}

impl JsEngine {
    /// Get a client handle for communicating with the engine.
    pub fn client(&self) -> JsEngineClient {
        self.client.clone()
    }

    /// Start the engine thread; it processes commands until shutdown.
    pub fn run(self) -> JoinHandle<()> {
        let JsEngine {
            context_builder,
            receiver,
            ..
        } = self;

        thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                run_js_loop(receiver, context_builder);
            }));

            if let Err(e) = result {
                log::error!("JS engine panicked: {:?}", e);
            }
        })
    }
}

/// Main loop for the JS engine thread.
fn run_js_loop(
    receiver: Receiver<JsCommand>,
    context_builder: Box<dyn FnOnce() -> Result<Context, JsError> + Send>,
) {
    log::info!("JS engine thread started");

    let mut context = match context_builder() {
        Ok(context) => context,
        Err(e) => {
            log::error!("Failed to build JS context: {}", e);
            return;
        }
    };

    log::info!("JS runtime initialized");

    loop {
        match receiver.recv() {
            Ok(JsCommand::Execute { source }) => {
                log::debug!("Executing script ({} bytes)...", source.len());

                if let Err(e) = context.eval(Source::from_bytes(source.as_bytes())) {
                    log::error!("Failed to execute script: {:?}", e);
                }

                flush_event_loop(&mut context);
            }
            Ok(JsCommand::LoadEsmModule { name, source }) => {
                log::info!("Loading ES module {} ({} bytes)...", name, source.len());

                match Module::parse(Source::from_bytes(source.as_bytes()), None, &mut context) {
                    Ok(module) => {
                        let _promise = module.load_link_evaluate(&mut context);

                        if let Some(loader) = context.downcast_module_loader::<FetchModuleLoader>()
                        {
                            loader.insert(name, module);
                        }

                        flush_event_loop(&mut context);
                    }
                    Err(e) => {
                        log::error!("Failed to parse module {}: {:?}", name, e);
                    }
                }
            }
            Ok(JsCommand::FlushEventLoop) => {
                flush_event_loop(&mut context);
            }
            Ok(JsCommand::Shutdown) => {
                log::info!("JS engine shutting down");
                break;
            }
            Err(e) => {
                log::error!("JS engine channel error: {}", e);
                break;
            }
        }
    }

    log::info!("JS engine thread stopped");
}

/// Run pending jobs: microtasks and due timers.
fn flush_event_loop(context: &mut Context) {
    if let Err(e) = context.run_jobs() {
        log::error!("Error running JS jobs: {:?}", e);
    }
}
