//! # External Program Execution
//!
//! Launches door programs ("chains") through the platform command interpreter on
//! behalf of a single session and hands back the child's raw exit status.
//!
//! ## Components
//!
//! - [`Launcher`] - validates the command line, reports flags the platform cannot
//!   honour, releases the session transport when required, spawns and waits.
//! - [`ExecutionFlags`] - capability bits requested by a chain (FOSSIL, COM I/O,
//!   local console code page).
//! - [`RemoteIo`] / [`TransportGuard`] - the session's connection and the scoped
//!   close/reopen pairing around a child process.
//! - [`CommandLine`] - positional `%1`..`%9` template expansion.
//! - [`RawStatus`] - the platform-native wait status with decoding helpers.
//!
//! ## Failure model
//!
//! Every failure is returned as data through [`ExecutionResult`]. Nothing here is
//! fatal to the server: at worst one session's launch attempt is aborted, and the
//! transport is reopened on every path.
//!
//! ```rust,no_run
//! use chainbbs::exec::{ExecutionFlags, Launcher, LocalIo};
//!
//! let launcher = Launcher::shell();
//! let status = launcher
//!     .launch("echo hi", ExecutionFlags::empty(), &mut LocalIo)
//!     .expect("launch");
//! assert_eq!(status.exit_code(), Some(0));
//! ```

mod command_line;
mod flags;
mod launcher;
mod platform;
mod remote_io;
mod status;

pub use command_line::{validate_command_line, CommandLine, CommandLineError};
pub use flags::{platform_supports, ExecutionFlags};
pub use launcher::{
    status_code, ExecError, ExecutionResult, Launcher, ProcessSpawner, SpawnError, WaitError,
};
pub use platform::{ShellSpawner, PLATFORM_NAME};
pub use remote_io::{LocalIo, RemoteIo, TransportGuard};
pub use status::RawStatus;
