//! Profile-driven list/sweep task runner.
//!
//! An INI profile declares sections, each with a command that lists
//! resources and a command that sweeps one of them. The runner lists every
//! section, keeps the items matching an anchored regular expression, and
//! optionally sweeps them. Sections may nest through an action map, in which
//! case each matched parent item is listed for children whose commands are
//! parameterised with the parent's values.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: parse the INI profile into sections and action trees
//! - **[`exec`]**: run external commands, with retries
//! - **[`sweeper`]**: the list/sweep engine and its result ledger
//! - **[`commands`]**: the top-level run loop behind the CLI
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod sweeper;
