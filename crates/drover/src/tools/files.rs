use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

use super::registry::{parse_input, ToolDefinition, ToolRegistry};
use crate::errors::{AgentError, AgentResult};
use crate::git::VersionControl;
use crate::models::tool::Tool;

pub const COMMIT_AUTHOR_NAME: &str = "drover";
pub const COMMIT_AUTHOR_EMAIL: &str = "drover@localhost";

/// Credential files the model is never allowed to read
const DENIED_FILE_NAME: &str = ".env";

#[derive(Deserialize)]
struct ListFilesInput {
    directory: String,
}

#[derive(Deserialize)]
struct ReadFileInput {
    path: String,
}

#[derive(Deserialize)]
struct WriteFileInput {
    path: String,
    content: String,
    commit_message: String,
}

/// Filesystem tools rooted at the project directory
pub struct FileTools {
    root: PathBuf,
    vcs: Arc<dyn VersionControl>,
}

impl FileTools {
    pub fn new<P: Into<PathBuf>>(root: P, vcs: Arc<dyn VersionControl>) -> Self {
        Self {
            root: root.into(),
            vcs,
        }
    }

    /// Add `list_files`, `read_file` and `write_file` to the registry
    pub fn register(self: Arc<Self>, registry: &mut ToolRegistry) -> Result<()> {
        let tools = Arc::clone(&self);
        registry.register(ToolDefinition::new(
            Tool::new(
                "list_files",
                "Returns a list of files in the given directory.",
                json!({
                    "type": "object",
                    "properties": {
                        "directory": {
                            "type": "string",
                            "description": "Path of the directory"
                        }
                    }
                }),
            ),
            move |input| tools.list_files(input),
        ))?;

        let tools = Arc::clone(&self);
        registry.register(ToolDefinition::new(
            Tool::new(
                "read_file",
                "Reads a file of the given path.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "The path to the file"
                        }
                    }
                }),
            ),
            move |input| tools.read_file(input),
        ))?;

        let tools = self;
        registry.register(ToolDefinition::new(
            Tool::new(
                "write_file",
                "Writes a file of the given path relative to the root project directory.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "The path to the file relative to the root project directory."
                        },
                        "content": {
                            "type": "string",
                            "description": "Content of the file"
                        },
                        "commit_message": {
                            "type": "string",
                            "description": "Commit message of the file"
                        }
                    }
                }),
            ),
            move |input| tools.write_file(input),
        ))?;

        Ok(())
    }

    fn resolve_path(&self, path_str: &str) -> PathBuf {
        let path = Path::new(path_str);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn list_files(&self, input: &Value) -> AgentResult<String> {
        let input: ListFilesInput = parse_input(input)?;
        let directory = self.resolve_path(&input.directory);

        let entries = std::fs::read_dir(&directory)
            .map_err(|e| AgentError::ExecutionError(format!("Error reading directory: {}", e)))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                AgentError::ExecutionError(format!("Error reading directory entry: {}", e))
            })?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                name.push('/');
            }
            files.push(name);
        }
        files.sort();

        Ok(files.join("\n"))
    }

    fn read_file(&self, input: &Value) -> AgentResult<String> {
        let input: ReadFileInput = parse_input(input)?;
        if Path::new(&input.path).file_name() == Some(OsStr::new(DENIED_FILE_NAME)) {
            return Err(AgentError::AccessDenied(format!(
                "{} file is not allowed to be read",
                DENIED_FILE_NAME
            )));
        }

        std::fs::read_to_string(self.resolve_path(&input.path))
            .map_err(|e| AgentError::ExecutionError(format!("Error reading file: {}", e)))
    }

    fn write_file(&self, input: &Value) -> AgentResult<String> {
        let input: WriteFileInput = parse_input(input)?;
        let path = self.resolve_path(&input.path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgentError::ExecutionError(format!("Error creating directory: {}", e))
            })?;
        }
        std::fs::write(&path, &input.content)
            .map_err(|e| AgentError::ExecutionError(format!("Error writing file: {}", e)))?;

        // The file stays on disk when the commit fails, but the call still reports failure
        self.vcs
            .stage_all_and_commit(
                &input.commit_message,
                COMMIT_AUTHOR_NAME,
                COMMIT_AUTHOR_EMAIL,
            )
            .map_err(|e| AgentError::ExecutionError(format!("Error committing file: {}", e)))?;

        Ok(format!("Successfully created file: {}", input.path))
    }
}
