//! Running the bazel binary

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Runs `bazel` subcommands and captures their combined output.
///
/// The child is killed when the returned future is dropped, so aborting the
/// task that awaits [`BazelRunner::run`] cancels the invocation.
#[derive(Debug, Clone)]
pub struct BazelRunner {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl Default for BazelRunner {
    fn default() -> Self {
        Self::new("bazel")
    }
}

impl BazelRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `bazel <args>` in `working_dir`.
    ///
    /// Returns stdout followed by stderr. On a non-zero exit the same text is
    /// carried in [`Error::Execution`].
    pub async fn run(&self, working_dir: &Path, args: &[String]) -> Result<String> {
        debug!(
            "Executing {} with args {:?} in {}",
            self.binary.display(),
            args,
            working_dir.display()
        );

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!("bazel {:?} timed out after {:?}", args, limit);
                    return Err(Error::Execution {
                        args: args.to_vec(),
                        reason: format!("timed out after {} seconds", limit.as_secs_f64()),
                        output: String::new(),
                    });
                }
            },
            None => cmd.output().await,
        }
        .map_err(|e| Error::Execution {
            args: args.to_vec(),
            reason: format!("failed to run {}: {}", self.binary.display(), e),
            output: String::new(),
        })?;

        let combined = combine(&output.stdout, &output.stderr);

        if !output.status.success() {
            warn!("bazel {:?} exited with {}", args, output.status);
            return Err(Error::Execution {
                args: args.to_vec(),
                reason: output.status.to_string(),
                output: combined,
            });
        }

        Ok(combined)
    }
}

fn combine(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(stderr));
    }
    text
}
