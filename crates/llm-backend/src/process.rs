use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::{truncate_at_stop, BackendError, GenerationBackend, GenerationParams, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

// ─── CommandBackend ───────────────────────────────────────────────────────

/// A model driven through a local executable (e.g. `llama-cli -m model.gguf`).
///
/// The prompt is written to the child's stdin, which is then closed; the
/// completion is read from stdout. Stderr is drained by a background thread
/// and surfaced when the process exits with a non-zero status. Arguments may
/// contain `{max_tokens}` and `{temperature}` placeholders.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl CommandBackend {
    /// Resolve `program` on `PATH` (or as a path) and build a backend.
    pub fn new(program: &str, args: Vec<String>) -> Result<Self> {
        let program = which::which(program)
            .map_err(|e| BackendError::Config(format!("executable '{program}' not found: {e}")))?;
        Ok(Self {
            program,
            args,
            env: Vec::new(),
        })
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    fn build_command(&self, params: &GenerationParams) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|a| params.render(a)));
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl GenerationBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let deadline = params.timeout.map(|limit| (Instant::now() + limit, limit));
        let mut child = self.build_command(params).spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::Process("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BackendError::Process("stderr not captured".into()))?;
        let stdout_rx = drain(stdout);
        let stderr_rx = drain(stderr);

        if let Some(mut stdin) = child.stdin.take() {
            // Written from a thread so a child that never reads cannot block
            // the deadline below.
            let prompt = prompt.to_owned();
            thread::spawn(move || {
                // A child that exits without reading closes the pipe; the
                // exit status reports the real problem.
                if let Err(e) = stdin.write_all(prompt.as_bytes()) {
                    tracing::debug!(error = %e, "child closed stdin early");
                }
            });
        }

        let status = wait_with_deadline(&mut child, deadline)?;
        // A grandchild may still hold the pipes open after the child exits.
        let out = collect(&stdout_rx, deadline)?;
        let err = collect(&stderr_rx, deadline)?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&err).trim().to_string();
            let msg = match status.code() {
                Some(code) if stderr.is_empty() => format!("model process exited with code {code}"),
                Some(code) => format!("model process exited with code {code}\nstderr: {stderr}"),
                None if stderr.is_empty() => "model process terminated by signal".to_string(),
                None => format!("model process terminated by signal\nstderr: {stderr}"),
            };
            return Err(BackendError::Process(msg));
        }

        let text = String::from_utf8_lossy(&out);
        Ok(truncate_at_stop(&text, &params.stop).to_string())
    }
}

/// Read a pipe to the end on a background thread.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Output of a [`drain`] thread, waiting no later than `deadline`.
fn collect(
    rx: &mpsc::Receiver<Vec<u8>>,
    deadline: Option<(Instant, Duration)>,
) -> Result<Vec<u8>> {
    let Some((deadline, limit)) = deadline else {
        return Ok(rx.recv().unwrap_or_default());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Ok(buf),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(BackendError::Timeout(limit)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Ok(Vec::new()),
    }
}

/// Wait for the child, killing it once the deadline has passed.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Option<(Instant, Duration)>,
) -> Result<std::process::ExitStatus> {
    let Some((deadline, limit)) = deadline else {
        return Ok(child.wait()?);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BackendError::Timeout(limit));
        }
        thread::sleep(POLL_INTERVAL);
    }
}
