use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{AppConfig, LoadedConfig};

use super::output::OutputFormat;

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
    from_file: bool,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(loaded: LoadedConfig, output: OutputFormat) -> Self {
        Self {
            config: Arc::new(loaded.config),
            config_path: loaded.path,
            from_file: loaded.from_file,
            output,
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Whether the configuration came from a file rather than defaults.
    pub fn config_from_file(&self) -> bool {
        self.from_file
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }
}
