use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::discovery::ScriptLayout;

/// Status-script exit codes with dedicated meaning (spec §4.8 "Exit code
/// conventions").
pub const STATUS_EXIT_PROMOTED: i32 = 90;
pub const STATUS_EXIT_STARTED: i32 = 91;
pub const STATUS_EXIT_STOPPED: i32 = 92;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// Exit 0: success, no change implied beyond "the event completed".
    Success,
    /// For `status` only: the script reported a concrete state.
    StatusReport(crate::state::ServiceState),
    /// Non-zero exit outside the status codes.
    Failure(i32),
    /// Killed after exceeding the per-event timeout.
    TimedOut,
    /// The script does not exist for this service; caller should jump
    /// directly to the settled state.
    NotProvided,
    /// The process could not even be spawned (permissions, missing file).
    SpawnError(String),
}

/// Resolves the executable path and argv for one event against a service's
/// script layout (spec §4.8).
fn command_for(layout: &ScriptLayout, event: &str) -> Option<(std::path::PathBuf, Vec<String>)> {
    match layout {
        ScriptLayout::SingleExecutable(path) => Some((path.clone(), vec![event.to_string()])),
        ScriptLayout::Directory(dir) => {
            let script = dir.join(event);
            if script.is_file() {
                Some((script, vec![]))
            } else {
                None
            }
        }
    }
}

/// Runs one service event to completion or timeout, forwarding child
/// stdout/stderr lines into `tracing` as they arrive (spec §4.8 "Child
/// stdout/stderr").
pub async fn run_event(
    layout: &ScriptLayout,
    event: &str,
    timeout: Duration,
    working_dir: Option<&Path>,
    is_promoted: bool,
    runner_state_name: &str,
) -> ScriptOutcome {
    let Some((exe, args)) = command_for(layout, event) else {
        return ScriptOutcome::NotProvided;
    };

    let mut cmd = Command::new(&exe);
    cmd.args(&args)
        .env("KOI_IS_PROMOTED", if is_promoted { "1" } else { "0" })
        .env("KOI_STATE", runner_state_name)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    let mut child: Child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return ScriptOutcome::SpawnError(e.to_string()),
    };

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let service_name = exe.display().to_string();
    if let Some(out) = stdout {
        spawn_line_forwarder(service_name.clone(), "stdout", out);
    }
    if let Some(err) = stderr {
        spawn_line_forwarder(service_name, "stderr", err);
    }

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => interpret_exit(event, status.code()),
        Ok(Err(e)) => ScriptOutcome::SpawnError(e.to_string()),
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            ScriptOutcome::TimedOut
        }
    }
}

fn interpret_exit(event: &str, code: Option<i32>) -> ScriptOutcome {
    match code {
        Some(0) => ScriptOutcome::Success,
        Some(STATUS_EXIT_PROMOTED) if event == "status" => {
            ScriptOutcome::StatusReport(crate::state::ServiceState::Promoted)
        }
        Some(STATUS_EXIT_STARTED) if event == "status" => {
            ScriptOutcome::StatusReport(crate::state::ServiceState::Started)
        }
        Some(STATUS_EXIT_STOPPED) if event == "status" => {
            ScriptOutcome::StatusReport(crate::state::ServiceState::Stopped)
        }
        Some(other) => ScriptOutcome::Failure(other),
        None => ScriptOutcome::Failure(-1),
    }
}

fn spawn_line_forwarder<R>(service: String, stream: &'static str, reader: R)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => tracing::info!(service = %service, stream, "{line}"),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(service = %service, stream, error = %e, "log proxy read failed");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_zero_is_success() {
        assert_eq!(interpret_exit("start", Some(0)), ScriptOutcome::Success);
    }

    #[test]
    fn status_exit_codes_map_to_states() {
        assert_eq!(
            interpret_exit("status", Some(STATUS_EXIT_PROMOTED)),
            ScriptOutcome::StatusReport(crate::state::ServiceState::Promoted)
        );
        assert_eq!(
            interpret_exit("status", Some(STATUS_EXIT_STARTED)),
            ScriptOutcome::StatusReport(crate::state::ServiceState::Started)
        );
        assert_eq!(
            interpret_exit("status", Some(STATUS_EXIT_STOPPED)),
            ScriptOutcome::StatusReport(crate::state::ServiceState::Stopped)
        );
    }

    #[test]
    fn status_codes_do_not_leak_into_other_events() {
        assert_eq!(interpret_exit("start", Some(STATUS_EXIT_PROMOTED)), ScriptOutcome::Failure(90));
    }

    #[tokio::test]
    async fn missing_script_is_not_provided() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ScriptLayout::Directory(dir.path().to_path_buf());
        let outcome = run_event(&layout, "start", Duration::from_secs(1), None, false, "Live").await;
        assert_eq!(outcome, ScriptOutcome::NotProvided);
    }
}
