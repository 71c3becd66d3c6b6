//! Subprocess supervisor (spec §4.6): spawn a managed child with its own
//! session (so a single `SIGTERM` to the negated pid reaches the whole process
//! group), pipe stdout/stderr with a per-line name prefix, poll a health URL
//! until ready, and on shutdown escalate `SIGTERM` → wait → `SIGKILL`.
//! Grounded on the pack's `sven-tools::ShellTool` (`pre_exec` + `setsid`,
//! `kill_on_drop`) for process isolation and `blazing-art-mcp`'s
//! `run_health_check` (`reqwest` polling a `/health`-shaped URL) for readiness.

use std::process::Stdio;
use std::time::Duration;

use eva_common::config::SupervisedChildConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to spawn {name}: {source}")]
    Spawn { name: &'static str, #[source] source: std::io::Error },
    #[error("{name} did not become healthy within {timeout_ms}ms")]
    ReadyTimeout { name: &'static str, timeout_ms: u64 },
}

pub struct SupervisedProcess {
    name: &'static str,
    child: Child,
}

/// Spawn `name` per `cfg` and block until its health endpoint answers 200, or
/// `cfg.ready_timeout_ms` elapses. Returns `Ok(None)` when `cfg.enabled` is
/// false — the operator is running that daemon out-of-band.
pub async fn start(name: &'static str, cfg: &SupervisedChildConfig) -> Result<Option<SupervisedProcess>, SupervisorError> {
    if !cfg.enabled {
        info!(name, "subprocess supervision disabled for this child; assuming externally managed");
        return Ok(None);
    }

    let mut command = Command::new(&cfg.command);
    command.args(&cfg.args);
    if let Some(cwd) = &cfg.cwd {
        command.current_dir(cwd);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);

    #[cfg(unix)]
    unsafe {
        command.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = command.spawn().map_err(|source| SupervisorError::Spawn { name, source })?;

    if let Some(stdout) = child.stdout.take() {
        spawn_line_reader(name, "stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_line_reader(name, "stderr", stderr);
    }

    wait_until_healthy(name, &cfg.health_url, cfg.ready_timeout_ms).await?;
    info!(name, "subprocess ready");

    Ok(Some(SupervisedProcess { name, child }))
}

fn spawn_line_reader<R>(name: &'static str, stream: &'static str, reader: R)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => info!(name, stream, "{line}"),
                Ok(None) => break,
                Err(e) => {
                    warn!(name, stream, error = %e, "error reading subprocess output");
                    break;
                }
            }
        }
    });
}

async fn wait_until_healthy(name: &'static str, health_url: &str, ready_timeout_ms: u64) -> Result<(), SupervisorError> {
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(ready_timeout_ms);

    loop {
        match client.get(health_url).timeout(Duration::from_secs(2)).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            Ok(resp) => info!(name, status = %resp.status(), "subprocess health check not yet ready"),
            Err(e) => info!(name, error = %e, "subprocess health check not yet reachable"),
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(SupervisorError::ReadyTimeout { name, timeout_ms: ready_timeout_ms });
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

/// `SIGTERM` the process group, wait `shutdown_timeout_ms`, then `SIGKILL`.
/// Best-effort: a failed signal or wait is logged, never propagated (spec
/// §4.6: "log but never raise on best-effort kill failures").
pub async fn stop(mut process: SupervisedProcess, shutdown_timeout_ms: u64) {
    let name = process.name;
    if let Some(pid) = process.child.id() {
        #[cfg(unix)]
        unsafe {
            if libc::kill(-(pid as i32), libc::SIGTERM) != 0 {
                warn!(name, pid, "SIGTERM to process group failed");
            }
        }
    }

    let waited = tokio::time::timeout(Duration::from_millis(shutdown_timeout_ms), process.child.wait()).await;
    match waited {
        Ok(Ok(status)) => {
            info!(name, %status, "subprocess exited after SIGTERM");
            return;
        }
        Ok(Err(e)) => warn!(name, error = %e, "error waiting for subprocess exit"),
        Err(_) => warn!(name, "subprocess did not exit within shutdown timeout; sending SIGKILL"),
    }

    if let Err(e) = process.child.start_kill() {
        error!(name, error = %e, "SIGKILL failed");
        return;
    }
    let _ = process.child.wait().await;
}
