//! # BBS Session Layer
//!
//! Everything a connected caller touches on the way to a door program.
//!
//! ## Components
//!
//! - [`session`] - Who is calling, on what line, with what terminal
//! - [`roles`] - Privilege levels and the per-chain access check
//! - [`instance`] - Which session occupies which activity slot
//! - [`terminal`] - Line-oriented caller I/O (local console, serial line)
//! - [`chains`] - The chains menu: filter, select, reserve, launch
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  ChainsMenu     │ ← One per session, runs on a blocking worker
//! └─────────────────┘
//!     │         │
//! ┌────────┐ ┌──────────────────┐
//! │Terminal│ │ InstanceRegistry │ ← Shared by every session
//! └────────┘ └──────────────────┘
//!     │
//! ┌─────────────────┐
//! │  Launcher       │ ← Hands the line to the door and waits
//! └─────────────────┘
//! ```

pub mod chains;
pub mod instance;
pub mod roles;
#[cfg(feature = "serial")]
pub mod serial;
pub mod session;
pub mod terminal;

pub use chains::{ChainsMenu, RunOutcome};
pub use instance::{FileInstanceRegistry, InMemoryInstanceRegistry, InstanceRegistry, SlotKind};
pub use session::{Session, SessionId};
pub use terminal::{ConsoleTerminal, Terminal};
