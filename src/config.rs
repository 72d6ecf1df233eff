//! Settings shared by the pipeline operations.

use std::path::PathBuf;

use crate::annotation::DEFAULT_NAMESPACE;
use crate::docstring::Convention;

/// Pipeline configuration for [`crate::pipeline::ArgWriter`].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Overwrite existing files without asking
    pub force: bool,
    pub convention: Convention,
    /// Fail on public methods with parameters but no docstring
    pub strict_docs: bool,
    /// Run the formatter over generated files
    pub pretty: bool,
    /// Directory generated imports are relative to
    pub project_root: PathBuf,
    /// Python package markers and runtime helpers are imported from
    pub marker_namespace: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            force: false,
            convention: Convention::default(),
            strict_docs: false,
            pretty: false,
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            marker_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}
