//! Line-oriented debugger: command parsing and a stateful executor around a runner.

mod commands;
mod executor;

pub use commands::*;
pub use executor::*;
