mod execute;
mod font;
mod machine;
mod opcode;
mod quirks;
mod runner;
mod stack;
mod types;

pub use font::*;
pub use machine::*;
pub use opcode::*;
pub use quirks::*;
pub use runner::*;
pub use stack::*;
pub use types::*;
