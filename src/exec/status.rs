use std::fmt;
use std::process::ExitStatus;

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
#[cfg(windows)]
use std::os::windows::process::ExitStatusExt;

/// Raw wait status of a finished child, in the platform's native encoding.
///
/// On unix this is the `waitpid` status word (exit code in the high byte, or the
/// terminating signal). On Windows it is the process exit code. The launcher never
/// normalises it; callers decode with [`RawStatus::exit_code`] when they need to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawStatus(i32);

impl RawStatus {
    pub fn from_raw(raw: i32) -> Self {
        RawStatus(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    fn as_exit_status(self) -> ExitStatus {
        #[cfg(unix)]
        {
            ExitStatus::from_raw(self.0)
        }
        #[cfg(windows)]
        {
            ExitStatus::from_raw(self.0 as u32)
        }
    }

    /// Exit code when the child exited normally.
    pub fn exit_code(self) -> Option<i32> {
        self.as_exit_status().code()
    }

    /// Terminating signal when the child was killed by one.
    #[cfg(unix)]
    pub fn signal(self) -> Option<i32> {
        self.as_exit_status().signal()
    }

    pub fn success(self) -> bool {
        self.exit_code() == Some(0)
    }
}

impl fmt::Display for RawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code() {
            Some(code) => write!(f, "exit code {} (raw {:#x})", code, self.0),
            None => {
                #[cfg(unix)]
                if let Some(sig) = self.signal() {
                    return write!(f, "killed by signal {} (raw {:#x})", sig, self.0);
                }
                write!(f, "raw status {:#x}", self.0)
            }
        }
    }
}
