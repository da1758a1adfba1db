/// Result type for CHIP-8 CPU cycle execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8Result {
    /// Continue executing instructions in the current frame.
    Continue,
    /// Wait for the next frame before continuing
    /// (e.g., after a draw instruction to limit the display update rate to the frame rate).
    WaitForNextFrame,
    /// An FX0A instruction is waiting for a key. The cycle had no effect.
    AwaitingKey,
}

/// Error types that can occur during CHIP-8 emulation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Chip8Error {
    #[error("ROM is too large ({size} bytes), max size is {max_size} bytes")]
    RomLoadError { size: usize, max_size: usize },

    #[error("Memory access out of bounds at address {address:#06X}")]
    MemoryOutOfBounds { address: u16 },

    #[error("Instruction fetch at odd address {address:#06X}")]
    MisalignedPc { address: u16 },

    #[error("Stack overflow: subroutine call at {address:#06X} with a full call stack")]
    StackOverflow { address: u16 },

    #[error("Stack underflow: return at {address:#06X} with an empty call stack")]
    StackUnderflow { address: u16 },

    #[error("Unknown opcode: {opcode:#06X}")]
    UnknownOpcode { opcode: u16 },

    #[error("Key index {key:#04X} is outside the keypad (0x0-0xF)")]
    InvalidKey { key: u8 },
}

/// Run state of a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Running,
    /// The machine faulted and will not execute further instructions until reset.
    Error(Chip8Error),
}

impl Status {
    pub fn is_running(&self) -> bool {
        matches!(self, Status::Running)
    }
}

/// Audio signal produced by a timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// The sound timer is still non-zero: keep the tone playing.
    Sounding,
    /// The sound timer reached zero during this tick: stop the tone.
    Stopped,
    /// The sound timer was already zero.
    Silent,
}

impl Tone {
    /// Classifies the change of the sound timer level across one or more ticks.
    pub fn between(was_sounding: bool, is_sounding: bool) -> Self {
        match (was_sounding, is_sounding) {
            (_, true) => Tone::Sounding,
            (true, false) => Tone::Stopped,
            (false, false) => Tone::Silent,
        }
    }
}

pub const DISPLAY_X: usize = 64;
pub const DISPLAY_Y: usize = 32;
/// A type alias for the CHIP-8 display buffer representation
pub type Display<T> = [[T; DISPLAY_X]; DISPLAY_Y];
