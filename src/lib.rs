//! # chainbbs - External Program Chains for a Dial-up Style BBS
//!
//! chainbbs runs "chains" (door programs) for BBS callers: it shows each caller the
//! doors their terminal and access level allow, keeps two callers out of a
//! single-user door, hands the caller's line to the door and waits for it to exit.
//!
//! ## Features
//!
//! - **Process Launcher**: Runs a command line through the platform shell and
//!   returns the raw wait status, releasing the session line for the door's lifetime.
//! - **Chains Menu**: Filtered, numbered door list with busy-slot refusal and a join
//!   prompt for multi-user doors.
//! - **Instance Registry**: Shared record of which session occupies which activity.
//! - **File Storage**: JSON chain catalog and user records with `fs2` locking.
//! - **Serial Sessions**: Optional `serialport` transport that is released while a
//!   door owns the line.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chainbbs::exec::{Launcher, LocalIo, ExecutionFlags};
//!
//! let launcher = Launcher::shell();
//! let status = launcher.launch("echo hello", ExecutionFlags::empty(), &mut LocalIo)?;
//! assert_eq!(status.exit_code(), Some(0));
//! # Ok::<(), chainbbs::exec::ExecError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`exec`] - Process launcher, execution flags, raw status, transport handover
//! - [`bbs`] - Sessions, access levels, instance registry, terminals, chains menu
//! - [`storage`] - Chain catalog, user records, chain interchange file
//! - [`config`] - Configuration management
//! - [`validation`] - Input validation and sanitization utilities
//! - [`metrics`] - In-process launch and per-chain counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Chains Menu   │ ← Per-session orchestration
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │    Launcher     │ ← Shell, wait, transport handover
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │    Storage      │ ← Catalog and user persistence
//! └─────────────────┘
//! ```

pub mod bbs;
pub mod config;
pub mod exec;
pub mod logutil;
pub mod metrics;
pub mod storage;
pub mod validation;
