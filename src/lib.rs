//! A small line-oriented shell.
//!
//! Each input line holds commands separated by `&`. All of them but the last are forked
//! into the background; the last runs in the foreground, and builtins placed there
//! change the shell's own state. Every command may send its standard output to a file
//! with a single `> file`.
//!
//! The main entry point is [`Interpreter`]. It runs commands through pluggable
//! factories (see [`command`]) and makes every system call through [`sys::Syscalls`],
//! so the calls can be observed or, via [`fault::FaultInjector`], made to fail.

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
mod external;
pub mod fault;
pub mod input;
mod interpreter;
pub mod parser;
mod redirect;
pub mod search_path;
pub mod sys;

pub use external::find_command_path;
pub use interpreter::{Interpreter, default_commands};
