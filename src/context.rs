use crate::meta::MetaStore;
use crate::settings::Settings;
use crate::traits::{
    CommandExecutor, FileSystem, Output, RealCommandExecutor, RealFileSystem, TerminalOutput,
};
use std::sync::Arc;

/// Application context that holds all dependencies for dependency injection
pub struct Context {
    pub fs: Arc<dyn FileSystem>,
    pub output: Arc<dyn Output>,
    pub command: Arc<dyn CommandExecutor>,
    pub settings: Settings,
}

impl Context {
    /// Create a new context with real implementations (for production use)
    pub fn new(settings: Settings) -> Self {
        Self {
            fs: Arc::new(RealFileSystem),
            output: Arc::new(TerminalOutput),
            command: Arc::new(RealCommandExecutor::new()),
            settings,
        }
    }

    /// Create a test context with specific mock implementations
    #[cfg(test)]
    pub fn test_with(
        fs: Arc<dyn FileSystem>,
        output: Arc<dyn Output>,
        command: Arc<dyn CommandExecutor>,
        settings: Settings,
    ) -> Self {
        Self {
            fs,
            output,
            command,
            settings,
        }
    }

    /// Metadata store rooted at the configured profile
    pub fn store(&self) -> MetaStore {
        MetaStore::new(self.settings.clusters_dir())
    }
}
