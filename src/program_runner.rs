//! Execution of roodmus commands
//!
//! Every external command goes through `run_shell`, which:
//!
//! - runs the command line under `bash -c` (activation prefixes need a shell)
//! - spawns it in its own process group and registers the PID for cleanup
//! - captures stdout and stderr for the step log
//!
//! `run_program_safe` is the typed entry point for roodmus subcommands.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{error, info};

use crate::error::{Result, RoodmusError};
use crate::plugin::Plugin;
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use crate::program_traits::ProgramArgs;

/// Run a roodmus subcommand with typed arguments from `working_dir`.
///
/// # Returns
///
/// - `Ok(output)` - The command ran; check `output.success`
/// - `Err` - The command could not be spawned or waited for
pub fn run_program_safe<T: ProgramArgs>(
    plugin: &Plugin,
    args: &T,
    working_dir: &Path,
) -> Result<ProgramOutput> {
    let command_line = plugin.command(args.subcommand(), &args.to_cli_args());
    let label = format!("roodmus {}", args.subcommand());
    run_shell(&label, &command_line, &args.get_env_vars(), working_dir)
}

/// Run `command_line` through `bash -c` in its own process group.
pub fn run_shell(
    label: &str,
    command_line: &str,
    env_vars: &[(String, String)],
    working_dir: &Path,
) -> Result<ProgramOutput> {
    info!(
        "run_shell: {} cwd={:?} env={:?}",
        command_line, working_dir, env_vars
    );

    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(command_line)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .in_new_process_group();

    for (key, value) in env_vars {
        cmd.env(key, value);
    }

    let child = cmd.spawn()?;
    let pid = child.id();

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.register(pid);
    }

    let output = child.wait_with_output();

    if let Ok(mut registry) = ChildRegistry::global().lock() {
        registry.unregister(pid);
    }

    let output = output?;
    let result = ProgramOutput {
        label: label.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
        success: output.status.success(),
    };

    if result.success {
        info!("{} finished successfully", label);
    } else {
        error!(
            "{} failed with exit code {}",
            label,
            result.exit_code.unwrap_or(-1)
        );
    }

    Ok(result)
}

/// Output from one external command.
#[derive(Debug, Clone)]
pub struct ProgramOutput {
    /// Human-readable command name, e.g. `roodmus run_parakeet`
    pub label: String,
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl ProgramOutput {
    /// Turn a failed run into `RoodmusError::Program`
    pub fn ensure_success(&self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(RoodmusError::Program {
                program: self.label.clone(),
                code: self.exit_code.unwrap_or(-1),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    /// Write stdout and stderr to `<dir>/<stem>.stdout` / `.stderr`
    pub fn write_logs(&self, dir: &Path, stem: &str) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(format!("{}.stdout", stem)), &self.stdout)?;
        std::fs::write(dir.join(format!("{}.stderr", stem)), &self.stderr)?;
        Ok(())
    }
}
