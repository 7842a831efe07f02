//! JavaScript Engine Module
//!
//! A Boa JS engine wrapper driven by a command channel from a dedicated
//! worker thread. The engine knows nothing about the hosted application;
//! extensions registered at build time provide the app-facing APIs.

pub(crate) mod engine;
mod esm;

pub use engine::{JsCommand, JsEngine, JsEngineBuilder, JsEngineClient, JsEngineExtension};
