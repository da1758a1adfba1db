//! CHIP-8 interpreter core: machine state, fetch/decode/execute and cycle scheduling.

pub mod chip8;
pub mod debugger;
mod nibble;

pub use nibble::{NibbleOverflow, u4};
