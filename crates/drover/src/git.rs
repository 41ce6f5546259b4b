//! Version control used by the write tool: every write is committed to the
//! repository at the workspace root.
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// The repository operations the agent relies on
pub trait VersionControl: Send + Sync {
    /// Create a new branch and switch to it
    fn create_branch(&self, name: &str) -> Result<(), GitError>;

    /// Stage every change in the working tree and commit it with the given author
    fn stage_all_and_commit(
        &self,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<(), GitError>;
}

/// A git repository driven through the `git` binary
#[derive(Debug, Clone)]
pub struct GitRepository {
    path: PathBuf,
}

impl GitRepository {
    /// Open the repository at `path`, initializing one if none exists there.
    /// The directory is created if it is missing.
    pub fn open_or_init<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|source| GitError::CreateDir {
                path: path.clone(),
                source,
            })?;
        }

        let repo = Self { path };
        if repo.path.join(".git").exists() {
            debug!(path = %repo.path.display(), "Opened existing git repository");
        } else {
            repo.run(&["init"])?;
            debug!(path = %repo.path.display(), "Initialized git repository");
        }
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        debug!(args = ?args, dir = %self.path.display(), "Running git command");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                stderr: if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                },
            });
        }
        Ok(stdout)
    }
}

impl VersionControl for GitRepository {
    fn create_branch(&self, name: &str) -> Result<(), GitError> {
        self.run(&["checkout", "-b", name]).map(|_| ())
    }

    fn stage_all_and_commit(
        &self,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<(), GitError> {
        self.run(&["add", "-A"])?;

        let name_config = format!("user.name={}", author_name);
        let email_config = format!("user.email={}", author_email);
        let author = format!("{} <{}>", author_name, author_email);
        self.run(&[
            "-c",
            &name_config,
            "-c",
            &email_config,
            "commit",
            "--author",
            &author,
            "-m",
            message,
        ])
        .map(|_| ())
    }
}
