use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::TransmissionGateway;
use crate::config::GatewayConfig;
use crate::error::GatewayError;

const STDERR_TAIL_CHARS: usize = 500;

/// Sends by running an external fax program once per attempt.
#[derive(Debug, Clone)]
pub struct CommandGateway {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    strip_separators: bool,
}

impl CommandGateway {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            strip_separators: true,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            strip_separators: config.strip_separators,
        }
    }

    pub fn with_strip_separators(mut self, strip: bool) -> Self {
        self.strip_separators = strip;
        self
    }

    fn normalize_destination(&self, destination: &str) -> String {
        if self.strip_separators {
            destination
                .chars()
                .filter(|c| *c != '-' && !c.is_whitespace())
                .collect()
        } else {
            destination.trim().to_string()
        }
    }

    fn build_args(&self, file: &Path, destination: &str) -> Vec<String> {
        let file = file.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{file}", &file)
                    .replace("{destination}", destination)
            })
            .collect()
    }
}

#[async_trait]
impl TransmissionGateway for CommandGateway {
    async fn send(&self, file: &Path, destination: &str) -> Result<(), GatewayError> {
        let destination = self.normalize_destination(destination);
        let args = self.build_args(file, &destination);
        log::debug!("Running {} {:?}", self.program, args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GatewayError::Fault(format!("failed to start {}: {}", self.program, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| GatewayError::Fault(format!("{} did not finish: {}", self.program, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let tail: String = stderr
            .chars()
            .rev()
            .take(STDERR_TAIL_CHARS)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        Err(GatewayError::Rejected(if tail.is_empty() {
            format!("{} failed with {}", self.program, status)
        } else {
            format!("{} failed with {}: {}", self.program, status, tail)
        }))
    }

    fn name(&self) -> &str {
        &self.program
    }
}
