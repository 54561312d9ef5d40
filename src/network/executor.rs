// file: src/network/executor.rs
// version: 2.0.0
// guid: c9f9257b-635c-4fa3-9bf7-697e412e0013

//! External command execution with bounded timeouts

use crate::{KangarooError, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

/// A command line to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment; values are never logged
    pub env: Vec<(String, String)>,
    /// Stream output to the terminal instead of capturing it
    pub inherit_output: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            inherit_output: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn inherit_output(mut self) -> Self {
        self.inherit_output = true;
        self
    }

    /// Program and arguments joined for diagnostics
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Exit status and captured output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for spawning external commands
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion. A non-zero exit is reported in the output, not as an error.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Run and turn a non-zero exit into [`KangarooError::ProcessError`]
    async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec).await?;
        if output.success() {
            return Ok(output);
        }

        error!(
            "Command failed with exit code {:?}: {}",
            output.exit_code,
            spec.display()
        );
        if !output.stderr.trim().is_empty() {
            error!("STDERR: {}", output.stderr);
        }

        Err(KangarooError::ProcessError {
            command: spec.display(),
            exit_code: output.exit_code,
            stderr: if output.stderr.is_empty() {
                output.stdout
            } else {
                output.stderr
            },
        })
    }
}

/// Runs commands as local child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(120)))
    }
}

#[async_trait::async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!("Executing command: {}", spec.display());

        let mut command = Command::new(&spec.program);
        command.args(&spec.args).kill_on_drop(true);
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let spawn_error = |e: std::io::Error| KangarooError::ProcessError {
            command: spec.display(),
            exit_code: None,
            stderr: format!("Failed to execute command: {}", e),
        };

        let fut = async {
            if spec.inherit_output {
                let status = command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(spawn_error)?;
                Ok::<_, KangarooError>(CommandOutput {
                    exit_code: status.code(),
                    ..Default::default()
                })
            } else {
                let output = command
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .map_err(spawn_error)?;
                Ok(CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
        };

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                KangarooError::timeout(format!(
                    "'{}' did not finish within {}s",
                    spec.program,
                    limit.as_secs()
                ))
            })??,
            None => fut.await?,
        };

        debug!("Command exited with {:?}", output.exit_code);
        Ok(output)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording runner for exercising command sequencing without processes

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingRunner {
        pub calls: Mutex<Vec<CommandSpec>>,
        /// Programs that exit non-zero
        pub failing: Vec<String>,
        /// Invoked for every call, e.g. to create files ssh-keygen would write
        pub on_run: Option<Box<dyn Fn(&CommandSpec) + Send + Sync>>,
    }

    impl RecordingRunner {
        pub fn programs(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.program.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            if let Some(hook) = &self.on_run {
                hook(spec);
            }
            let code = if self.failing.contains(&spec.program) { 1 } else { 0 };
            Ok(CommandOutput {
                exit_code: Some(code),
                ..Default::default()
            })
        }
    }
}
