//! Process-level confinement for submitted code.
//!
//! This is not an isolation boundary: children still share the host
//! filesystem and network. What it does guarantee is that a killed run takes
//! its whole process group with it, that the host environment is not leaked,
//! and that configured rlimits are in place before the interpreter starts.

use tokio::process::{Child, Command};

use crate::{config::SandboxLimits, constants::INHERITED_ENV_VARS};

pub fn configure(cmd: &mut Command, limits: &SandboxLimits) {
    cmd.env_clear();
    for key in INHERITED_ENV_VARS {
        if let Some(value) = std::env::var_os(key) {
            cmd.env(key, value);
        }
    }
    cmd.env("NODE_ENV", "production");
    cmd.kill_on_drop(true);

    #[cfg(unix)]
    {
        cmd.process_group(0);

        if !limits.is_empty() {
            let limits = limits.clone();
            // SAFETY: the hook only calls setrlimit, which is async-signal-safe.
            unsafe {
                cmd.pre_exec(move || apply_rlimits(&limits));
            }
        }
    }

    #[cfg(not(unix))]
    {
        if !limits.is_empty() {
            tracing::warn!("sandbox limits are only enforced on unix, ignoring");
        }
    }
}

/// Sends SIGKILL to the child's process group, then to the child itself.
pub fn kill_tree(child: &mut Child) {
    kill_group(child.id());

    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "child already gone when killing");
    }
}

/// Sends SIGKILL to every process left in the group led by `leader`.
///
/// Works after the leader has been reaped: the group id stays reserved while
/// any member is alive.
pub fn kill_group(leader: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = leader {
            // Negative pid addresses the whole group created by `process_group(0)`.
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = leader;
    }
}

#[cfg(unix)]
fn apply_rlimits(limits: &SandboxLimits) -> std::io::Result<()> {
    if let Some(bytes) = limits.memory_bytes {
        check(unsafe { libc::setrlimit(libc::RLIMIT_AS, &rlimit(bytes)) })?;
    }
    if let Some(secs) = limits.cpu_time_secs {
        check(unsafe { libc::setrlimit(libc::RLIMIT_CPU, &rlimit(secs)) })?;
    }
    if let Some(bytes) = limits.file_size_bytes {
        check(unsafe { libc::setrlimit(libc::RLIMIT_FSIZE, &rlimit(bytes)) })?;
    }
    Ok(())
}

#[cfg(unix)]
fn rlimit(value: u64) -> libc::rlimit {
    libc::rlimit {
        rlim_cur: value as libc::rlim_t,
        rlim_max: value as libc::rlim_t,
    }
}

#[cfg(unix)]
fn check(ret: libc::c_int) -> std::io::Result<()> {
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
