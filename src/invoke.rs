//! The external tool invoker: the one narrow boundary through which every
//! job node reaches an aligner, caller, or annotator.
//!
//! A command is a single shell line (several of the wrapped tools are pipes),
//! executed synchronously with stderr redirected to a freshly created log
//! file. There are no retries and no timeouts at this layer; re-running the
//! pipeline is the retry mechanism, and it is made safe by the scheduler's
//! skip-if-output-exists resume rule.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::info;

use crate::errors::{PipelineError, Result};

/// Runs `command` through `sh -c`, capturing its stderr to a new file at
/// `logfile`. The log's first line records the command itself so a failure
/// can be diagnosed from the log alone.
///
/// Returns `Ok(())` on a zero exit status and [`PipelineError::ToolFailure`]
/// (naming the command and the log path) on a nonzero exit or spawn failure.
pub fn run_and_log_command<P>(command: &str, logfile: P) -> Result<()>
where
    P: AsRef<Path>,
{
    let logfile = logfile.as_ref();

    let mut log = File::create(logfile)?;
    writeln!(log, "Command: {}", command)?;

    info!("executing `{}` (log: {})", command, logfile.display());

    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(Stdio::null())
        .stderr(log)
        .status()
        .map_err(|_| PipelineError::ToolFailure {
            command: command.to_string(),
            logfile: logfile.to_path_buf(),
        })?;

    if !status.success() {
        return Err(PipelineError::ToolFailure {
            command: command.to_string(),
            logfile: logfile.to_path_buf(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;

    fn scratch(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("varflow-invoke-{}-{}", std::process::id(), name))
    }

    #[test]
    pub fn test_zero_exit_succeeds_and_logs_the_command() {
        let log = scratch("ok.log");
        run_and_log_command("true", &log).unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.starts_with("Command: true"));
        std::fs::remove_file(log).ok();
    }

    #[test]
    pub fn test_nonzero_exit_is_a_tool_failure() {
        let log = scratch("fail.log");
        let err = run_and_log_command("false", &log).unwrap_err();
        assert!(matches!(err, PipelineError::ToolFailure { .. }));
        std::fs::remove_file(log).ok();
    }

    #[test]
    pub fn test_stderr_is_captured() {
        let log = scratch("stderr.log");
        run_and_log_command("echo oops >&2", &log).unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("oops"));
        std::fs::remove_file(log).ok();
    }
}
