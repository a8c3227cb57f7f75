//! Process-per-call inference
//!
//! Each call spawns the configured program, writes the prompt to its stdin
//! and reads the reply from stdout. Memory held by the model runtime is
//! released when the process exits. A child still running when the
//! configured timeout elapses is killed.

use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};
use wait_timeout::ChildExt;

use super::{normalize_reply, InferenceClient, InferenceError, InferenceRequest};
use crate::bail_usage;
use crate::error::Result;

/// Runs an external program for every inference call
///
/// The child sees the generation limits in `FILINGSUM_TEMPERATURE` and
/// `FILINGSUM_MAX_TOKENS`.
#[derive(Debug, Clone)]
pub struct CommandClient {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandClient {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self> {
        let mut parts = command.into_iter();
        let Some(program) = parts.next().filter(|p| !p.trim().is_empty()) else {
            bail_usage!("inference command must name a program");
        };
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn failure(&self, reason: impl ToString) -> InferenceError {
        InferenceError::Command {
            command: self.display(),
            reason: reason.to_string(),
        }
    }

    fn timed_out(&self, child: &mut Child) -> InferenceError {
        warn!(command = %self.display(), timeout = ?self.timeout, "killing inference process");
        if let Err(e) = child.kill() {
            debug!(error = %e, "inference process already exited");
        }
        // Reap the child; its pipes may stay open in grandchildren
        if let Err(e) = child.wait() {
            debug!(error = %e, "failed to reap inference process");
        }
        InferenceError::Timeout(self.timeout)
    }

    fn collect(
        &self,
        reader: JoinHandle<io::Result<Vec<u8>>>,
    ) -> std::result::Result<Vec<u8>, InferenceError> {
        reader
            .join()
            .map_err(|_| self.failure("output reader panicked"))?
            .map_err(|e| self.failure(e))
    }
}

fn drain(mut source: impl Read + Send + 'static) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

impl InferenceClient for CommandClient {
    fn infer(&self, request: &InferenceRequest<'_>) -> std::result::Result<String, InferenceError> {
        trace!(command = %self.display(), "spawn_inference_process");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("FILINGSUM_TEMPERATURE", request.temperature.to_string())
            .env("FILINGSUM_MAX_TOKENS", request.max_tokens.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failure(e))?;

        let (Some(mut stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill();
            return Err(self.failure("standard streams not captured"));
        };
        let prompt = request.prompt.to_string();

        // Pipes are serviced on their own threads so a child that writes
        // before draining its input cannot deadlock against us
        let writer = thread::spawn(move || stdin.write_all(prompt.as_bytes()));
        let stdout = drain(stdout);
        let stderr = drain(stderr);

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => return Err(self.timed_out(&mut child)),
            Err(e) => {
                let _ = child.kill();
                return Err(self.failure(e));
            }
        };

        let write_result = writer
            .join()
            .map_err(|_| self.failure("stdin writer panicked"))?;
        let stdout = self.collect(stdout)?;
        let stderr = self.collect(stderr)?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(self.failure(format!("{} {}", status, stderr.trim())));
        }
        // A child may legitimately exit without reading all of stdin
        if let Err(e) = write_result {
            debug!(error = %e, "inference process closed stdin early");
        }

        let reply = String::from_utf8(stdout)
            .map_err(|e| InferenceError::Malformed(format!("reply is not UTF-8: {e}")))?;
        normalize_reply(&reply)
    }
}
