use clap::{Parser, Subcommand, ValueEnum};
use clap_num::maybe_hex;

use crate::u4;

#[derive(Parser)]
#[command(multicall = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone)]
pub enum Command {
    /// Run in real time until a breakpoint, a fault or the time limit
    #[command(visible_alias = "r")]
    Run {
        #[arg(default_value = "1.0")]
        seconds: f32,
    },

    /// Execute single instructions
    #[command(visible_alias = "s")]
    Step {
        #[arg(default_value = "1")]
        count: usize,
    },

    /// Advance the delay and sound timers
    #[command(visible_alias = "t")]
    Tick {
        #[arg(default_value = "1")]
        count: usize,
    },

    #[command(visible_alias = "b")]
    Breakpoint {
        #[command(subcommand)]
        action: BreakpointAction,
    },

    Set {
        #[arg(value_parser = parse_set_target)]
        target: SetTarget,
        #[arg(value_parser = maybe_hex::<u16>)]
        value: u16,
    },

    /// Press or release a keypad key
    #[command(visible_alias = "k")]
    Key {
        #[arg(value_parser = maybe_hex::<u8>)]
        key: u8,
        #[arg(value_enum)]
        state: KeyState,
    },

    #[command(visible_alias = "m")]
    Mem {
        #[arg(default_value = "0x200", value_parser = maybe_hex::<u16>)]
        start: u16,
        #[arg(default_value = "64", value_parser = maybe_hex::<u16>)]
        len: u16,
    },

    Regs,

    Screen,

    /// Reset the machine and reload the ROM
    Reset,

    #[command(visible_alias = "q")]
    Quit,
}

pub enum CommandResult {
    Ok,
    Ran { hit_breakpoint: bool },
    Stepped { retired: usize },
    Breakpoints(Vec<u16>),
    MemDump { data: Vec<u8>, offset: u16 },
    ShowRegisters,
    ShowScreen,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Error while executing cpu instruction: {0}")]
    Chip8Error(#[from] crate::chip8::Chip8Error),
    #[error("Value out of range")]
    ValueOutOfRange,
}

#[derive(Subcommand, Clone)]
pub enum BreakpointAction {
    #[command(visible_alias = "s")]
    Set {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "c")]
    Clear {
        #[arg(value_parser = maybe_hex::<u16>)]
        addr: u16,
    },

    #[command(visible_alias = "l")]
    List,

    #[command(visible_alias = "ca")]
    ClearAll,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
pub enum KeyState {
    Down,
    Up,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetTarget {
    V(u4),
    I,
    Pc,
    DelayTimer,
    SoundTimer,
}

fn parse_set_target(s: &str) -> Result<SetTarget, String> {
    let lower = s.to_lowercase();

    match lower.as_str() {
        "index" | "i" => Ok(SetTarget::I),
        "pc" => Ok(SetTarget::Pc),
        "dt" => Ok(SetTarget::DelayTimer),
        "st" => Ok(SetTarget::SoundTimer),

        _ if lower.starts_with('v') => {
            let hex_str = &lower[1..];
            match u8::from_str_radix(hex_str, 16) {
                Ok(val) if val < 16 => Ok(SetTarget::V(u4::new(val))),
                _ => Err(format!("Invalid register: '{}'", s)),
            }
        }

        _ => Err(format!("Unknown set target: '{}'", s)),
    }
}
