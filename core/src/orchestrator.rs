//! Drives the interactive Copilot CLI as a single-shot request/response call.
//!
//! The CLI has no batch mode: it prints a banner, waits for a prompt on
//! stdin and keeps running until told to `/exit`. One call to
//! [`CommandOrchestrator::execute`] therefore
//!
//! 1. spawns the CLI with piped stdio,
//! 2. after `startup_delay` writes the prompt,
//! 3. after a further `response_wait` writes `/exit` and closes stdin,
//! 4. races process exit against `command_timeout`.
//!
//! The stdin steps run in their own task and stop as soon as the
//! interaction is over, so a CLI that exits early never sees a write on a
//! closed pipe. Output is buffered for the whole call.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::Config;
use crate::config::Timeouts;
use crate::error::CopilotErr;
use crate::error::Result;
use crate::models::SupportedModel;
use crate::probe;
use crate::session::SessionRegistry;
use crate::spawn::copilot_command;
use crate::spawn::terminate;

pub const EXIT_DIRECTIVE: &str = "/exit";
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response from Copilot CLI";
pub const PARTIAL_RESPONSE_PLACEHOLDER: &str =
    "Copilot CLI timed out, but partial response received";

const READ_CHUNK_SIZE: usize = 8192;

/// How long to keep reading pipes after the process is gone. Grandchildren
/// can hold the pipes open indefinitely.
const READER_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Bound on reaping a killed process.
const KILL_REAP_GRACE: Duration = Duration::from_secs(2);

/// How long the stdin writer may lag behind the end of the interaction.
const STDIN_JOIN_GRACE: Duration = Duration::from_secs(1);

/// Per-call options. Everything is optional; `Default` is a bare prompt in
/// the server's working directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecuteOptions {
    /// Appended to the prompt under a `Context:` heading.
    pub context: Option<String>,
    pub model: Option<SupportedModel>,
    pub allow_all_tools: bool,
    /// Passed to the CLI as `--resume <id>`.
    pub resume_session_id: Option<String>,
    /// Appended verbatim after the generated flags.
    pub additional_args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    /// The hard deadline fired after some stdout had arrived; `text` may be
    /// incomplete.
    pub timed_out: bool,
}

#[derive(Clone, Debug)]
pub struct CommandOrchestrator {
    program: String,
    timeouts: Timeouts,
    sessions: SessionRegistry,
}

impl CommandOrchestrator {
    pub fn new(config: &Config, sessions: SessionRegistry) -> Self {
        Self {
            program: config.program.clone(),
            timeouts: config.timeouts,
            sessions,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Installation probe against the configured program.
    pub async fn is_installed(&self) -> bool {
        probe::is_installed(&self.program, self.timeouts.version_check_timeout).await
    }

    /// Runs one prompt through the CLI and returns its answer.
    ///
    /// Fails only when the CLI cannot be spawned, when it asks for a login
    /// without printing anything to stdout, or when the deadline passes
    /// before any stdout arrived. On a normal exit the exchange is recorded
    /// in the current session, if any.
    pub async fn execute(&self, prompt: &str, options: ExecuteOptions) -> Result<CommandOutput> {
        let full_prompt = merge_context(prompt, options.context.as_deref());
        let args = build_args(&options);
        let cwd = match options.cwd {
            Some(cwd) => cwd,
            None => std::env::current_dir()?,
        };

        let mut cmd = copilot_command(&self.program, &args);
        cmd.current_dir(&cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd.spawn().map_err(CopilotErr::spawn)?;
        info!(program = %self.program, ?args, cwd = %cwd.display(), "copilot started");

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("stdin pipe was unexpectedly not available"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout pipe was unexpectedly not available"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr pipe was unexpectedly not available"))?;

        let capture = OutputCapture::default();
        let readers = vec![
            tokio::spawn(capture_stream(stdout, capture.clone(), StreamKind::Stdout)),
            tokio::spawn(capture_stream(stderr, capture.clone(), StreamKind::Stderr)),
        ];

        let interaction = CancellationToken::new();
        let mut stdin_task = tokio::spawn(drive_stdin(
            stdin,
            full_prompt.clone(),
            self.timeouts,
            interaction.clone(),
        ));

        let completion = tokio::select! {
            status = child.wait() => Completion::Exited(status),
            _ = tokio::time::sleep(self.timeouts.command_timeout) => Completion::TimedOut,
        };
        interaction.cancel();

        if matches!(completion, Completion::TimedOut) {
            terminate(&mut child);
            if tokio::time::timeout(KILL_REAP_GRACE, child.wait()).await.is_err() {
                warn!("copilot did not exit after kill");
            }
        }
        match tokio::time::timeout(STDIN_JOIN_GRACE, &mut stdin_task).await {
            Ok(Err(err)) => debug!(error = %err, "stdin task ended abnormally"),
            Ok(Ok(())) => {}
            Err(_) => {
                debug!("stdin still blocked after the interaction ended; abandoning writer");
                stdin_task.abort();
            }
        }
        drain_readers(readers).await;
        let captured = capture.snapshot();

        match completion {
            Completion::Exited(status) => {
                let status = status?;
                debug!(?status, "copilot exited");
                let text = classify_exit(&captured)?;
                self.sessions
                    .record_to_current_session(full_prompt, text.clone());
                Ok(CommandOutput {
                    text,
                    timed_out: false,
                })
            }
            Completion::TimedOut => {
                warn!(
                    timeout = ?self.timeouts.command_timeout,
                    received_output = captured.received_output,
                    "copilot timed out"
                );
                classify_timeout(&captured)
            }
        }
    }
}

enum Completion {
    Exited(io::Result<ExitStatus>),
    TimedOut,
}

/// `prompt`, followed by `context` under a `Context:` heading when present.
pub fn merge_context(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(context) => format!("{prompt}\n\nContext:\n{context}"),
        None => prompt.to_string(),
    }
}

/// CLI flags for `options`, always in the order model, allow-all-tools,
/// resume, extra arguments.
pub fn build_args(options: &ExecuteOptions) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(model) = options.model {
        args.push("--model".to_string());
        args.push(model.to_string());
    }
    if options.allow_all_tools {
        args.push("--allow-all-tools".to_string());
    }
    if let Some(session_id) = &options.resume_session_id {
        args.push("--resume".to_string());
        args.push(session_id.clone());
    }
    args.extend(options.additional_args.iter().cloned());
    args
}

/// Best-effort guess that the CLI is asking for a login. The wording of
/// the CLI's messages is not under our control.
pub fn looks_like_auth_prompt(stderr: &str) -> bool {
    stderr.contains("login") || stderr.contains("authenticate")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Set once any bytes arrived on stdout.
    pub received_output: bool,
}

pub fn classify_exit(captured: &CapturedOutput) -> Result<String> {
    if !captured.received_output
        && !captured.stderr.is_empty()
        && looks_like_auth_prompt(&captured.stderr)
    {
        return Err(CopilotErr::AuthenticationRequired);
    }

    let stdout = captured.stdout.trim();
    if !stdout.is_empty() {
        return Ok(stdout.to_string());
    }
    let stderr = captured.stderr.trim();
    if !stderr.is_empty() {
        return Ok(stderr.to_string());
    }
    Ok(NO_RESPONSE_PLACEHOLDER.to_string())
}

pub fn classify_timeout(captured: &CapturedOutput) -> Result<CommandOutput> {
    if !captured.received_output {
        return Err(CopilotErr::Timeout);
    }
    let stdout = captured.stdout.trim();
    let text = if stdout.is_empty() {
        PARTIAL_RESPONSE_PLACEHOLDER.to_string()
    } else {
        stdout.to_string()
    };
    Ok(CommandOutput {
        text,
        timed_out: true,
    })
}

#[derive(Clone, Copy, Debug)]
enum StreamKind {
    Stdout,
    Stderr,
}

#[derive(Debug, Default)]
struct CaptureState {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    received_output: bool,
}

/// Shared sink for both pipes. Readers append as data arrives so a
/// snapshot taken at any time holds everything read so far.
#[derive(Clone, Debug, Default)]
struct OutputCapture {
    inner: Arc<Mutex<CaptureState>>,
}

impl OutputCapture {
    fn append(&self, kind: StreamKind, chunk: &[u8]) {
        let mut state = self.inner.lock();
        match kind {
            StreamKind::Stdout => {
                state.stdout.extend_from_slice(chunk);
                state.received_output = true;
            }
            StreamKind::Stderr => state.stderr.extend_from_slice(chunk),
        }
    }

    fn snapshot(&self) -> CapturedOutput {
        let state = self.inner.lock();
        CapturedOutput {
            stdout: String::from_utf8_lossy(&state.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&state.stderr).into_owned(),
            received_output: state.received_output,
        }
    }
}

async fn capture_stream<R: AsyncRead + Unpin + Send + 'static>(
    mut reader: R,
    capture: OutputCapture,
    kind: StreamKind,
) {
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => capture.append(kind, &buf[..n]),
            Err(err) => {
                debug!(?kind, error = %err, "stopped reading copilot output");
                break;
            }
        }
    }
}

async fn drain_readers(readers: Vec<JoinHandle<()>>) {
    let deadline = Instant::now() + READER_DRAIN_GRACE;
    for mut reader in readers {
        if tokio::time::timeout_at(deadline, &mut reader).await.is_err() {
            debug!("output pipe still open after exit; abandoning reader");
            reader.abort();
        }
    }
}

/// Sleeps for `delay` unless the interaction ends first. Returns whether the
/// interaction is still open.
async fn still_open_after(interaction: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = interaction.cancelled() => false,
        _ = tokio::time::sleep(delay) => !interaction.is_cancelled(),
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// Writes `line` unless the interaction ends first. Returns whether the
/// line was fully written.
async fn write_while_open(
    stdin: &mut ChildStdin,
    interaction: &CancellationToken,
    line: &str,
    what: &str,
) -> bool {
    tokio::select! {
        _ = interaction.cancelled() => {
            debug!(what, "interaction ended mid-write");
            false
        }
        result = write_line(stdin, line) => match result {
            Ok(()) => true,
            Err(err) => {
                debug!(what, error = %err, "stdin closed before the write completed");
                false
            }
        },
    }
}

/// Prompt after the startup delay, `/exit` after the response wait, then
/// close. Each step is skipped once the interaction is over or the pipe
/// has been closed by the CLI.
async fn drive_stdin(
    mut stdin: ChildStdin,
    prompt: String,
    timeouts: Timeouts,
    interaction: CancellationToken,
) {
    if !still_open_after(&interaction, timeouts.startup_delay).await {
        debug!("interaction ended before the prompt was sent");
        return;
    }
    if !write_while_open(&mut stdin, &interaction, &prompt, "prompt").await {
        return;
    }
    debug!("prompt sent");

    if !still_open_after(&interaction, timeouts.response_wait).await {
        return;
    }
    if !write_while_open(&mut stdin, &interaction, EXIT_DIRECTIVE, "exit directive").await {
        return;
    }
    debug!("exit directive sent");
    tokio::select! {
        _ = interaction.cancelled() => {}
        result = stdin.shutdown() => {
            if let Err(err) = result {
                debug!(error = %err, "failed to close stdin");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn captured(stdout: &str, stderr: &str) -> CapturedOutput {
        CapturedOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            received_output: !stdout.is_empty(),
        }
    }

    #[test]
    fn merge_context_appends_heading() {
        assert_eq!(merge_context("fix it", None), "fix it");
        assert_eq!(
            merge_context("fix it", Some("src/main.rs")),
            "fix it\n\nContext:\nsrc/main.rs"
        );
    }

    #[test]
    fn args_follow_fixed_order() {
        let options = ExecuteOptions {
            model: Some(SupportedModel::Gpt41),
            allow_all_tools: true,
            resume_session_id: Some("abc".to_string()),
            additional_args: vec!["--verbose".to_string(), "x".to_string()],
            ..Default::default()
        };
        assert_eq!(
            build_args(&options),
            vec![
                "--model",
                "gpt-4.1",
                "--allow-all-tools",
                "--resume",
                "abc",
                "--verbose",
                "x"
            ]
        );
        assert!(build_args(&ExecuteOptions::default()).is_empty());
    }

    #[test]
    fn exit_prefers_stdout_then_stderr_then_placeholder() {
        assert_eq!(
            classify_exit(&captured("  answer \n", "noise")).expect("ok"),
            "answer"
        );
        assert_eq!(
            classify_exit(&captured("", "  only stderr\n")).expect("ok"),
            "only stderr"
        );
        assert_eq!(
            classify_exit(&captured("", "")).expect("ok"),
            NO_RESPONSE_PLACEHOLDER
        );
    }

    #[test]
    fn whitespace_only_stdout_falls_through_to_stderr() {
        let output = CapturedOutput {
            stdout: " \n".to_string(),
            stderr: "details".to_string(),
            received_output: true,
        };
        assert_eq!(classify_exit(&output).expect("ok"), "details");
    }

    #[test]
    fn auth_cue_only_counts_without_stdout() {
        for stderr in ["Please login to continue", "you must authenticate first"] {
            let err = classify_exit(&captured("", stderr)).expect_err("auth");
            assert!(matches!(err, CopilotErr::AuthenticationRequired));
            assert_eq!(
                classify_exit(&captured("hello", stderr)).expect("stdout wins"),
                "hello"
            );
        }
        assert_eq!(
            classify_exit(&captured("", "network unreachable")).expect("ok"),
            "network unreachable"
        );
    }

    #[test]
    fn timeout_with_partial_output_succeeds() {
        let output = classify_timeout(&captured("half an ans", "")).expect("partial");
        assert_eq!(
            output,
            CommandOutput {
                text: "half an ans".to_string(),
                timed_out: true,
            }
        );

        let blank = CapturedOutput {
            stdout: "\n".to_string(),
            stderr: String::new(),
            received_output: true,
        };
        assert_eq!(
            classify_timeout(&blank).expect("partial").text,
            PARTIAL_RESPONSE_PLACEHOLDER
        );
    }

    #[test]
    fn timeout_without_output_fails() {
        let err = classify_timeout(&captured("", "some stderr")).expect_err("timeout");
        assert!(matches!(err, CopilotErr::Timeout));
        assert_eq!(err.to_string(), "Copilot CLI command timed out with no response");
    }

    #[test]
    fn capture_marks_stdout_only() {
        let capture = OutputCapture::default();
        capture.append(StreamKind::Stderr, b"warn");
        assert!(!capture.snapshot().received_output);
        capture.append(StreamKind::Stdout, b"out");
        let snapshot = capture.snapshot();
        assert!(snapshot.received_output);
        assert_eq!(snapshot.stdout, "out");
        assert_eq!(snapshot.stderr, "warn");
    }

    #[tokio::test]
    async fn still_open_after_stops_on_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!still_open_after(&token, Duration::from_secs(30)).await);

        let open = CancellationToken::new();
        assert!(still_open_after(&open, Duration::from_millis(1)).await);
    }
}
