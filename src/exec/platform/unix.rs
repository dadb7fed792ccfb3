use std::ffi::CString;
use std::io;
use std::ptr;

use nix::errno::Errno;
use nix::libc;
use nix::unistd::{fork, ForkResult, Pid};

use crate::exec::launcher::{ProcessSpawner, SpawnError, WaitError};
use crate::exec::status::RawStatus;

pub const PLATFORM_NAME: &str = "UNIX";

/// Exit status of a child that could not exec the interpreter.
const EXEC_FAILED: libc::c_int = 127;

/// Runs command lines through `/bin/sh -c` via fork/exec.
#[derive(Debug, Clone)]
pub struct ShellSpawner {
    shell: String,
}

impl Default for ShellSpawner {
    fn default() -> Self {
        ShellSpawner {
            shell: "/bin/sh".to_string(),
        }
    }
}

impl ShellSpawner {
    /// Use a different POSIX shell (must accept `-c <command>`).
    pub fn with_shell(shell: impl Into<String>) -> Self {
        ShellSpawner {
            shell: shell.into(),
        }
    }
}

fn c_string(s: &str) -> Result<CString, SpawnError> {
    CString::new(s).map_err(|e| SpawnError(io::Error::new(io::ErrorKind::InvalidInput, e)))
}

impl ProcessSpawner for ShellSpawner {
    type Child = Pid;

    fn spawn(&self, command_line: &str) -> Result<Pid, SpawnError> {
        let shell = c_string(&self.shell)?;
        let argv = [shell.clone(), c_string("-c")?, c_string(command_line)?];
        let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|a| a.as_ptr()).collect();
        argv_ptrs.push(ptr::null());

        // SAFETY: everything the child touches is allocated before the fork; the
        // child only calls execv and _exit, both async-signal-safe.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => Ok(child),
            Ok(ForkResult::Child) => unsafe {
                libc::execv(shell.as_ptr(), argv_ptrs.as_ptr());
                libc::_exit(EXEC_FAILED)
            },
            Err(errno) => Err(SpawnError(errno.into())),
        }
    }

    fn wait(&self, child: &mut Pid) -> Result<RawStatus, WaitError> {
        // nix::sys::wait decodes the status word; the launcher hands back the raw one.
        let mut status: libc::c_int = 0;
        let rc = unsafe { libc::waitpid(child.as_raw(), &mut status, 0) };
        if rc == -1 {
            return match Errno::last() {
                Errno::EINTR => Err(WaitError::Interrupted),
                errno => Err(WaitError::Failed(errno.into())),
            };
        }
        Ok(RawStatus::from_raw(status))
    }
}

/// Console code pages are a Windows concept; there is nothing to switch.
pub fn enter_cp437() -> Option<()> {
    None
}
