//! ES module loading
//!
//! Named modules (the app bundle) are registered up front; anything else the
//! bundle imports is resolved against its referrer and fetched over HTTP, so
//! a bundle served by a dev server can pull in its own chunks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use boa_engine::module::{ModuleLoader, Referrer};
use boa_engine::{Context, JsError, JsNativeError, JsObject, JsResult, JsString, Module, Source};

use crate::js::engine::TOKIO;

pub(crate) struct FetchModuleLoader {
    local_modules: RefCell<HashMap<String, Module>>,
}

impl FetchModuleLoader {
    pub(crate) fn new() -> Self {
        Self {
            local_modules: RefCell::new(HashMap::new()),
        }
    }

    pub fn insert(&self, specifier: impl Into<String>, module: Module) {
        let specifier = specifier.into();
        self.local_modules
            .borrow_mut()
            .insert(specifier.clone(), module);
        log::info!("Cached local module: {}", specifier);
    }
}

impl ModuleLoader for FetchModuleLoader {
    fn init_import_meta(
        self: Rc<Self>,
        import_meta: &JsObject,
        module: &Module,
        context: &mut Context,
    ) {
        let Some(module_path) = module.path().map(|path| path.to_string_lossy().to_string())
        else {
            log::warn!("Module path is None while initializing import_meta");
            return;
        };

        if let Err(e) = import_meta.set(JsString::from("url"), JsString::from(module_path), false, context)
        {
            log::warn!("Failed to set 'url' in import_meta: {:?}", e);
        }
    }

    async fn load_imported_module(
        self: Rc<Self>,
        referrer: Referrer,
        specifier: JsString,
        context: &RefCell<&mut Context>,
    ) -> JsResult<Module> {
        log::debug!(
            "Loading imported module: {}, referrer={:?}",
            specifier.to_std_string_escaped(),
            referrer.path()
        );

        let resolved_specifier = resolve_specifier(&referrer, &specifier);
        log::debug!("Resolved specifier: {}", resolved_specifier);

        // Check cache with the resolved specifier to avoid duplicate loading.
        if let Some(module) = self.local_modules.borrow().get(&resolved_specifier) {
            log::debug!("Cache hit for module: {}", resolved_specifier);
            return Ok(module.clone());
        }

        // Fetch on the shared runtime; this is called from the engine thread,
        // which has no runtime of its own.
        let body = TOKIO.block_on(async {
            let response = reqwest::get(&resolved_specifier).await.map_err(|e| {
                JsError::from_native(
                    JsNativeError::typ().with_message(format!("Fetch error: {}", e)),
                )
            })?;

            let body = response.text().await.map_err(|e| {
                JsError::from_native(
                    JsNativeError::typ().with_message(format!("Fetch response error: {}", e)),
                )
            })?;

            Ok::<_, JsError>(body)
        })?;

        let src = Source::from_bytes(body.as_bytes()).with_path(Path::new(&resolved_specifier));
        let module = Module::parse(src, None, &mut context.borrow_mut())?;

        self.insert(resolved_specifier, module.clone());
        Ok(module)
    }
}

/// Resolve `specifier` against the referrer: URL resolution when the referrer
/// parses as a URL, plain path joining otherwise.
fn resolve_specifier(referrer: &Referrer, specifier: &JsString) -> String {
    let spec_str = specifier.to_std_string_lossy();

    let Some(path) = referrer.path() else {
        return spec_str;
    };

    if let Ok(base_url) = url::Url::parse(&path.to_string_lossy()) {
        return match url::Url::options().base_url(Some(&base_url)).parse(&spec_str) {
            Ok(new_url) => new_url.to_string(),
            Err(_) => spec_str,
        };
    }

    let base = path;
    let joined = if spec_str.starts_with('/') {
        PathBuf::from(spec_str)
    } else {
        base.parent().unwrap_or(base).join(&spec_str)
    };
    joined.to_string_lossy().to_string()
}
