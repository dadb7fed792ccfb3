use log::{debug, error, info};
use std::io;
use thiserror::Error;

use super::command_line::{validate_command_line, CommandLineError};
use super::flags::{platform_supports, ExecutionFlags};
use super::platform::{enter_cp437, ShellSpawner, PLATFORM_NAME};
use super::remote_io::{RemoteIo, TransportGuard};
use super::status::RawStatus;
use crate::logutil::escape_log;
use crate::metrics;

/// Process creation primitive failed (fork/CreateProcess).
#[derive(Debug, Error)]
#[error("failed to create child process: {0}")]
pub struct SpawnError(#[from] pub io::Error);

#[derive(Debug, Error)]
pub enum WaitError {
    /// A signal interrupted the wait; the child is still running.
    #[error("wait interrupted")]
    Interrupted,
    #[error("failed waiting for child process: {0}")]
    Failed(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid command line: {0}")]
    InvalidCommandLine(#[from] CommandLineError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error("failed waiting for child process: {0}")]
    Wait(#[source] io::Error),
}

impl ExecError {
    /// Sentinel for "process could not be created or monitored".
    pub const LAUNCH_FAILED: i32 = -1;
    /// Sentinel for "command line rejected before any OS interaction".
    pub const CONFIGURATION: i32 = -2;

    pub fn sentinel(&self) -> i32 {
        match self {
            ExecError::InvalidCommandLine(_) => Self::CONFIGURATION,
            ExecError::Spawn(_) | ExecError::Wait(_) => Self::LAUNCH_FAILED,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ExecError::InvalidCommandLine(_))
    }
}

/// Raw child status, or why there is none.
pub type ExecutionResult = Result<RawStatus, ExecError>;

/// Flatten a result to the integer encoding: the raw status or a negative sentinel.
pub fn status_code(result: &ExecutionResult) -> i32 {
    match result {
        Ok(status) => status.raw(),
        Err(e) => e.sentinel(),
    }
}

/// Creates and reaps child processes for the launcher.
pub trait ProcessSpawner {
    type Child;

    /// Start the platform command interpreter on `command_line`.
    fn spawn(&self, command_line: &str) -> Result<Self::Child, SpawnError>;

    /// Block until `child` terminates.
    fn wait(&self, child: &mut Self::Child) -> Result<RawStatus, WaitError>;
}

/// Runs one external program for one session.
///
/// `launch` blocks the calling session until the child exits. There is no timeout:
/// a hung door program holds its session until it ends.
#[derive(Debug, Clone)]
pub struct Launcher<S> {
    spawner: S,
    exclusive_transport: bool,
    supports: fn(ExecutionFlags) -> bool,
}

impl Launcher<ShellSpawner> {
    /// Launcher using the platform shell.
    pub fn shell() -> Self {
        Launcher::new(ShellSpawner::default())
    }
}

impl<S: ProcessSpawner> Launcher<S> {
    pub fn new(spawner: S) -> Self {
        Launcher {
            spawner,
            exclusive_transport: false,
            supports: platform_supports,
        }
    }

    /// When set, the session transport is closed for the child's lifetime so the
    /// door program can own the line.
    pub fn with_exclusive_transport(mut self, exclusive: bool) -> Self {
        self.exclusive_transport = exclusive;
        self
    }

    /// Replace the capability query (defaults to [`platform_supports`]).
    pub fn with_capabilities(mut self, supports: fn(ExecutionFlags) -> bool) -> Self {
        self.supports = supports;
        self
    }

    /// Run `command_line` through the command interpreter and return its raw status.
    pub fn launch<R>(&self, command_line: &str, flags: ExecutionFlags, io: &mut R) -> ExecutionResult
    where
        R: RemoteIo + ?Sized,
    {
        let command_line = match validate_command_line(command_line) {
            Ok(cl) => cl,
            Err(e) => {
                error!("refusing to launch: {}", e);
                return Err(e.into());
            }
        };

        for name in flags.unsupported_by(self.supports) {
            error!("{} is not supported on {}", name, PLATFORM_NAME);
        }

        let _code_page = if flags.contains(ExecutionFlags::LOCAL_CONSOLE_CP437)
            && (self.supports)(ExecutionFlags::LOCAL_CONSOLE_CP437)
        {
            enter_cp437()
        } else {
            None
        };

        let _transport = if self.exclusive_transport {
            Some(TransportGuard::release(io))
        } else {
            None
        };

        info!("exec: {}", escape_log(command_line));
        let result = self.spawn_and_wait(command_line);
        metrics::record_launch(&result);
        match &result {
            Ok(status) => debug!("exec finished: {}", status),
            Err(e) => error!("exec failed: {}", e),
        }
        result
    }

    fn spawn_and_wait(&self, command_line: &str) -> ExecutionResult {
        let mut child = self.spawner.spawn(command_line)?;
        loop {
            match self.spawner.wait(&mut child) {
                Ok(status) => return Ok(status),
                Err(WaitError::Interrupted) => {
                    metrics::inc_wait_interrupted();
                    continue;
                }
                Err(WaitError::Failed(e)) => return Err(ExecError::Wait(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_distinguish_configuration_from_launch_failure() {
        let empty: ExecutionResult = Err(CommandLineError::Empty.into());
        assert_eq!(status_code(&empty), ExecError::CONFIGURATION);

        let spawn: ExecutionResult =
            Err(SpawnError(io::Error::new(io::ErrorKind::Other, "no pids")).into());
        assert_eq!(status_code(&spawn), ExecError::LAUNCH_FAILED);

        let wait: ExecutionResult = Err(ExecError::Wait(io::Error::new(
            io::ErrorKind::Other,
            "ECHILD",
        )));
        assert_eq!(status_code(&wait), -1);
        assert!(!wait.unwrap_err().is_configuration());

        let ok: ExecutionResult = Ok(RawStatus::from_raw(0x300));
        assert_eq!(status_code(&ok), 0x300);
    }
}
