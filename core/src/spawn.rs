use tokio::process::Child;
use tokio::process::Command;
use tracing::debug;

/// Builds the command that launches the external CLI.
///
/// On Windows the CLI is usually an npm `.cmd` shim, which only resolves
/// through the shell.
pub(crate) fn copilot_command(program: &str, args: &[String]) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(program).args(args);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd
    }
}

/// Sends a kill to `child`. Safe to call any number of times, including
/// after the process has exited.
pub(crate) fn terminate(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        debug!(error = %err, "kill skipped; process already gone");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;

    #[tokio::test]
    async fn terminate_is_idempotent() {
        let mut child = Command::new("sleep")
            .arg("5")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("spawn sleep");

        terminate(&mut child);
        terminate(&mut child);
        let status = child.wait().await.expect("wait");
        assert!(!status.success());

        terminate(&mut child);
    }
}
