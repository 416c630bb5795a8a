//! Task manager core: repetition rules, the occurrence lifecycle of
//! recurring tasks, JSON persistence and the CLI commands built on them.

pub mod commands;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod recurrence;
pub mod storage;

pub use error::{Error, Result};
