//! Low-level git subprocess plumbing.
//!
//! The backend and frontend are the only components permitted to spawn git;
//! both go through this wrapper so that every invocation is traced.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct GitRunner {
    workdir: PathBuf,
}

impl GitRunner {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run git and return the raw output regardless of exit status.
    pub fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(args = %args.join(" "), "git");
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }

    /// Run git and error on a non-zero exit status.
    pub fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    /// Run git and return trimmed stdout, erroring on a non-zero exit status.
    pub fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}
