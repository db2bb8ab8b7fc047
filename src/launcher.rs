//! Child-process launcher.
//!
//! `esmb build` and `esmb start` do not run the pipeline in the CLI
//! process. They re-invoke the current executable with the hidden `exec`
//! subcommand, passing the raw options as a JSON environment payload, so
//! the build runs isolated from whatever task runner spawned the CLI.
//! Signal-terminated children are diagnosed on the launcher side.

use std::env;
use std::process::{Command, ExitCode, ExitStatus};

use crate::config::loader::{parse_env_options, ConfigError};
use crate::config::schema::RawOptions;

/// Environment variable carrying the serialized options into the child.
pub const OPTIONS_ENV: &str = "ESMBUILD_OPTIONS";

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;

/// Spawn the current executable to run `command` with the given options,
/// wait for it, and translate its exit status.
pub fn exec_command(command: &str, options: &RawOptions) -> ExitCode {
    let payload = match serde_json::to_string(options) {
        Ok(payload) => payload,
        Err(error) => {
            eprintln!("Failed to serialize options: {}", error);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let exe = match env::current_exe() {
        Ok(exe) => exe,
        Err(error) => {
            eprintln!("Failed to locate the current executable: {}", error);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let status = Command::new(exe).arg("exec").arg(command).env(OPTIONS_ENV, payload).status();
    match status {
        Ok(status) => diagnose_status(status),
        Err(error) => {
            eprintln!("Failed to spawn build process: {}", error);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Deserialize the options payload in the child process.
pub fn options_from_env() -> Result<RawOptions, ConfigError> {
    match env::var(OPTIONS_ENV) {
        Ok(payload) => parse_env_options(&payload),
        Err(_) => Ok(RawOptions::default()),
    }
}

#[cfg(unix)]
fn diagnose_status(status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;

    if let Some(signal) = status.signal() {
        match signal {
            9 => println!(
                "The build failed because the process exited too early. \
                 This probably means the system ran out of memory or someone called \
                 `kill -9` on the process."
            ),
            15 => println!(
                "The build failed because the process exited too early. \
                 Someone might have called `kill` or `killall`, or the system could \
                 be shutting down."
            ),
            _ => {}
        }
        return ExitCode::from(EXIT_ERROR);
    }
    exit_code_of(status)
}

#[cfg(not(unix))]
fn diagnose_status(status: ExitStatus) -> ExitCode {
    exit_code_of(status)
}

fn exit_code_of(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::from(code.clamp(0, u8::MAX as i32) as u8),
        None => ExitCode::from(EXIT_ERROR),
    }
}
