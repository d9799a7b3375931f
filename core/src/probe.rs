use std::process::Stdio;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use crate::spawn::copilot_command;
use crate::spawn::terminate;

const VERSION_FLAG: &str = "--version";

/// Reports whether `program --version` runs and exits with status zero
/// within `timeout`. Never fails: spawn errors and timeouts read as "not
/// installed". A probe that outlives `timeout` is killed before returning.
pub async fn is_installed(program: &str, timeout: Duration) -> bool {
    let mut cmd = copilot_command(program, &[VERSION_FLAG.to_string()]);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            debug!(program, error = %err, "installation probe failed to start");
            return false;
        }
    };

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(program, ?status, "installation probe finished");
            status.success()
        }
        Ok(Err(err)) => {
            debug!(program, error = %err, "installation probe wait failed");
            false
        }
        Err(_) => {
            warn!(program, ?timeout, "installation probe timed out");
            terminate(&mut child);
            false
        }
    }
}
