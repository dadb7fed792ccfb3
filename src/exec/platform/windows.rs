use std::io;
use std::os::windows::process::CommandExt;
use std::process::{Child, Command};

use log::{debug, warn};
use windows_sys::Win32::System::Console::{GetConsoleOutputCP, SetConsoleCP, SetConsoleOutputCP};

use crate::exec::launcher::{ProcessSpawner, SpawnError, WaitError};
use crate::exec::status::RawStatus;

pub const PLATFORM_NAME: &str = "Windows";

const CP437: u32 = 437;

/// Runs command lines through `cmd /C`.
#[derive(Debug, Clone)]
pub struct ShellSpawner {
    interpreter: String,
}

impl Default for ShellSpawner {
    fn default() -> Self {
        ShellSpawner {
            interpreter: "cmd".to_string(),
        }
    }
}

impl ShellSpawner {
    pub fn with_shell(interpreter: impl Into<String>) -> Self {
        ShellSpawner {
            interpreter: interpreter.into(),
        }
    }
}

impl ProcessSpawner for ShellSpawner {
    type Child = Child;

    fn spawn(&self, command_line: &str) -> Result<Child, SpawnError> {
        // cmd does its own parsing of everything after /C
        Command::new(&self.interpreter)
            .arg("/C")
            .raw_arg(command_line)
            .spawn()
            .map_err(SpawnError)
    }

    fn wait(&self, child: &mut Child) -> Result<RawStatus, WaitError> {
        match child.wait() {
            Ok(status) => Ok(RawStatus::from_raw(status.code().unwrap_or(-1))),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Err(WaitError::Interrupted),
            Err(e) => Err(WaitError::Failed(e)),
        }
    }
}

/// Local console switched to CP437; restores the previous code page on drop.
pub struct CodePageScope {
    previous: u32,
}

/// Switch the console to CP437 until the returned scope is dropped.
pub fn enter_cp437() -> Option<CodePageScope> {
    let previous = unsafe { GetConsoleOutputCP() };
    if previous == 0 {
        warn!("no console attached; leaving code page unchanged");
        return None;
    }
    unsafe {
        SetConsoleOutputCP(CP437);
        SetConsoleCP(CP437);
    }
    debug!("console code page {} -> {}", previous, CP437);
    Some(CodePageScope { previous })
}

impl Drop for CodePageScope {
    fn drop(&mut self) {
        unsafe {
            SetConsoleOutputCP(self.previous);
            SetConsoleCP(self.previous);
        }
    }
}
