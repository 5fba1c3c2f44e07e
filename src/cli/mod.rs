//! Programmatic command runner behind the `hashflog` binary. Every command
//! produces one JSON value and an exit code; nothing here prints or exits.

mod command;
mod runner;

pub use command::Command;
pub use runner::{Context, Outcome, run};
