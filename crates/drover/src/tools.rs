pub mod files;
pub mod registry;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::git::VersionControl;
pub use files::FileTools;
pub use registry::{ToolDefinition, ToolRegistry};

/// Build the registry of built-in tools operating on `root`
pub fn default_registry(root: &Path, vcs: Arc<dyn VersionControl>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    Arc::new(FileTools::new(root, vcs)).register(&mut registry)?;
    Ok(registry)
}
