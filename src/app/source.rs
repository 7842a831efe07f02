/// A loadable application bundle: a named ES module and its source text.
pub struct AppScriptSource {
    pub module_name: String,
    pub source_string: String,
}

impl AppScriptSource {
    pub fn from_string(module_name: impl Into<String>, source_string: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            source_string: source_string.into(),
        }
    }
}

/// Load the application bundle from a local dev server.
pub struct DevServerSource {
    pub module_name: String,
    pub dev_server_url: String,
    pub entry_point: String,
}

impl DevServerSource {
    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = module_name.into();
        self
    }

    pub fn with_dev_server_url(mut self, dev_server_url: impl Into<String>) -> Self {
        self.dev_server_url = dev_server_url.into();
        self
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }
}

impl Default for DevServerSource {
    fn default() -> Self {
        Self {
            module_name: "ports-app-entrypoint".to_string(),
            dev_server_url: "http://localhost:1234".to_string(),
            entry_point: "src/index.js".to_string(),
        }
    }
}

impl From<DevServerSource> for AppScriptSource {
    fn from(source: DevServerSource) -> Self {
        let DevServerSource {
            module_name,
            dev_server_url,
            entry_point,
        } = source;

        AppScriptSource::from_string(
            module_name,
            format!(
                r#"
                const app = await import('{dev_server_url}/{entry_point}');
                export default app.default;
            "#
            ),
        )
    }
}
