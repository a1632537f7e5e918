//! Subprocess runner for the `globus` client
//!
//! Every call is awaited to completion or until the configured timeout, in
//! which case the child is killed.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use pushglob_core::config::Config;

use crate::GlobusError;

/// Captured result of one client invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// How to invoke the `globus` client
#[derive(Debug, Clone)]
pub struct GlobusCli {
    program: String,
    /// Arguments placed before every command (e.g. a script path when the
    /// program is an interpreter)
    base_args: Vec<String>,
    timeout: Duration,
}

impl GlobusCli {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            timeout,
        }
    }

    /// Uses `globus_bin` and `globus.timeout_secs` from the config
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.globus_bin.clone(),
            Duration::from_secs(config.globus.timeout_secs),
        )
    }

    #[must_use]
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs the client with `args`, feeding `stdin` if given
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`CommandOutput::exit_code`].
    ///
    /// # Errors
    ///
    /// [`GlobusError::Spawn`] if the program cannot be started,
    /// [`GlobusError::Timeout`] if it runs too long.
    pub async fn run(
        &self,
        args: &[String],
        stdin: Option<&str>,
    ) -> Result<CommandOutput, GlobusError> {
        debug!(program = %self.program, ?args, "Running globus client");

        let mut child = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GlobusError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let feed = child.stdin.take().zip(stdin);
        let write_stdin = async move {
            if let Some((mut pipe, text)) = feed {
                // The client may exit without reading everything
                if let Err(e) = pipe.write_all(text.as_bytes()).await {
                    trace!(error = %e, "Could not write batch to globus stdin");
                }
            }
        };

        let wait = async {
            let ((), output) = tokio::join!(write_stdin, child.wait_with_output());
            output
        };

        let output = tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| GlobusError::Timeout(self.timeout))??;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        debug!(exit_code = ?result.exit_code, "globus client finished");
        Ok(result)
    }
}
