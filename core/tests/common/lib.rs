#![allow(clippy::expect_used)]

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use copilot_core::Config;
use copilot_core::Timeouts;
use tempfile::TempDir;

/// Argument that makes a fake CLI exit immediately. Used to confirm the
/// script can be executed before a test relies on it.
#[cfg(unix)]
const READY_CHECK_FLAG: &str = "--fake-cli-ready-check";

/// Writes an executable `/bin/sh` script named `copilot` into `dir` and
/// returns its path. The script stands in for the real CLI.
///
/// Returns only once the script can be executed. A process forked by a
/// concurrently running test can briefly inherit the write descriptor,
/// and exec fails with `ETXTBSY` while any such descriptor is open.
#[cfg(unix)]
pub fn write_fake_cli(dir: &Path, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("copilot");
    let mut file = std::fs::File::create(&path).expect("create fake cli");
    writeln!(file, "#!/bin/sh").expect("write shebang");
    writeln!(file, "[ \"$1\" = \"{READY_CHECK_FLAG}\" ] && exit 0").expect("write ready check");
    file.write_all(body.as_bytes()).expect("write body");
    file.sync_all().expect("sync fake cli");
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake cli");
    wait_until_executable(&path);
    path
}

#[cfg(unix)]
fn wait_until_executable(path: &Path) {
    for _ in 0..100 {
        match std::process::Command::new(path)
            .arg(READY_CHECK_FLAG)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
        {
            Ok(_) => return,
            Err(err) if err.kind() == std::io::ErrorKind::ExecutableFileBusy => {
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(err) => panic!("fake cli at {} is not executable: {err}", path.display()),
        }
    }
    panic!("fake cli at {} stayed busy", path.display());
}

/// Timeouts short enough for tests while keeping the required ordering.
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        startup_delay: Duration::from_millis(50),
        response_wait: Duration::from_millis(300),
        command_timeout: Duration::from_millis(1_500),
        version_check_timeout: Duration::from_millis(500),
    }
}

/// A config pointing at `program` with [`fast_timeouts`].
pub fn test_config(home: &TempDir, program: &Path) -> Config {
    let mut config = Config::with_home(home.path().to_path_buf());
    config.program = program.display().to_string();
    config.timeouts = fast_timeouts();
    config
}
