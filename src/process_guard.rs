//! Lifetime management for roodmus child processes
//!
//! A simulation run can keep parakeet busy on a GPU for hours. If the driver
//! is interrupted, the `bash -c` wrapper, roodmus and every worker it forked
//! must go down with it.
//!
//! - Each command is spawned as the leader of its own process group
//! - Leaders are tracked in a global registry while they run
//! - On SIGINT/SIGTERM/SIGHUP or when the guard drops, every tracked group
//!   gets SIGTERM, then SIGKILL after a grace period

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Process-group leaders of the commands currently running
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Set by the first `terminate_all`; later calls are no-ops
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!(pid, "registered child process group");
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!(pid, "unregistered child process group");
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// SIGTERM every tracked group, wait up to `grace_period`, SIGKILL the rest
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if std::mem::replace(&mut self.cleanup_initiated, true) || self.pids.is_empty() {
            return;
        }

        let pids: Vec<u32> = self.pids.drain().collect();
        info!("Terminating {} running roodmus command(s)", pids.len());

        pids.iter().for_each(|&pid| signal_command(pid, Signal::SIGTERM));
        if wait_for_exit(&pids, grace_period) {
            info!("All roodmus commands terminated");
            return;
        }

        for pid in pids.into_iter().filter(|&pid| is_process_alive(pid)) {
            warn!(pid, "roodmus command ignored SIGTERM, sending SIGKILL");
            signal_command(pid, Signal::SIGKILL);
        }
    }
}

/// Signal the command's whole process group, or just the leader if the
/// group is already gone
fn signal_command(pid: u32, sig: Signal) {
    let leader = Pid::from_raw(pid as i32);
    if let Err(e) = signal::killpg(leader, sig) {
        debug!(pid, "{} to process group failed ({}), signalling leader", sig, e);
        let _ = signal::kill(leader, sig);
    }
}

/// Poll until none of `pids` is alive; false if `timeout` passes first
fn wait_for_exit(pids: &[u32], timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !pids.iter().any(|&pid| is_process_alive(pid)) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

/// A zombie still answers `kill(pid, 0)` but has already exited
fn is_process_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok() && !is_zombie(pid)
}

/// State field of `/proc/<pid>/stat` is `Z` or `X`
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            // comm may contain spaces; the state follows the closing paren
            let (_, rest) = stat.rsplit_once(')')?;
            rest.split_whitespace().next().map(|state| matches!(state, "Z" | "X"))
        })
        .unwrap_or(false)
}

/// Terminates every registered command when dropped.
///
/// Held by the driver for the whole run so early returns and panics still
/// clean up.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }

    pub fn child_count(&self) -> usize {
        self.registry.lock().map(|r| r.count()).unwrap_or(0)
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(5));
        }
    }
}

/// Install SIGINT/SIGTERM/SIGHUP handlers that clean up and exit with 128+signal.
/// Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "received signal, stopping roodmus commands");
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Make the child the leader of a new process group and have it receive
    /// SIGTERM if the driver dies
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        // SAFETY: only async-signal-safe calls between fork and exec
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
