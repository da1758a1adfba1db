use std::collections::HashSet;

use super::commands::{
    BreakpointAction, Command, CommandError, CommandResult, KeyState, SetTarget,
};
use crate::chip8::{Chip8, Chip8Error, Chip8Runner, Chip8RunnerResult, Display, MEMORY_SIZE};

/// Length of one real-time frame when running from the debugger.
const FRAME_TIME: f32 = 1.0 / 60.0;

pub struct Executor {
    runner: Chip8Runner,
    rom: Vec<u8>,
    breakpoints: HashSet<u16>,
}

impl Executor {
    /// Takes a runner whose machine already has `rom` loaded; the ROM is kept for `reset`.
    pub fn new(runner: Chip8Runner, rom: Vec<u8>) -> Self {
        Self {
            runner,
            rom,
            breakpoints: HashSet::new(),
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<CommandResult, CommandError> {
        match command {
            Command::Run { seconds } => self.execute_run(seconds),
            Command::Step { count } => self.execute_step(count),
            Command::Tick { count } => {
                for _ in 0..count {
                    self.runner.tick_timers();
                }
                Ok(CommandResult::Ok)
            }
            Command::Breakpoint { action } => self.handle_breakpoint(action),
            Command::Set { target, value } => self.handle_set(target, value),
            Command::Key { key, state } => {
                self.runner
                    .chip8_mut()
                    .try_set_key(key, state == KeyState::Down)?;
                Ok(CommandResult::Ok)
            }
            Command::Mem { start, len } => self.handle_mem(start, len),
            Command::Regs => Ok(CommandResult::ShowRegisters),
            Command::Screen => Ok(CommandResult::ShowScreen),
            Command::Reset => {
                let chip8 = self.runner.chip8_mut();
                chip8.reset();
                chip8.load(&self.rom)?;
                Ok(CommandResult::Ok)
            }
            Command::Quit => Ok(CommandResult::Quit),
        }
    }

    /// Runs frame by frame for `seconds` of emulated time, stopping at breakpoints.
    pub fn execute_run(&mut self, seconds: f32) -> Result<CommandResult, CommandError> {
        let frames = (seconds / FRAME_TIME).ceil() as usize;

        for _ in 0..frames {
            let result = self
                .runner
                .update_with_breakpoints(FRAME_TIME, Some(&self.breakpoints))?;

            if result == Chip8RunnerResult::HitBreakpoint {
                return Ok(CommandResult::Ran {
                    hit_breakpoint: true,
                });
            }
        }

        Ok(CommandResult::Ran {
            hit_breakpoint: false,
        })
    }

    pub fn execute_step(&mut self, count: usize) -> Result<CommandResult, CommandError> {
        let retired = self.runner.run_cycles(count)?;
        Ok(CommandResult::Stepped { retired })
    }

    pub fn chip8(&self) -> &Chip8 {
        self.runner.chip8_ref()
    }

    pub fn get_display(&self) -> &Display<bool> {
        self.chip8().display()
    }

    fn handle_breakpoint(
        &mut self,
        action: BreakpointAction,
    ) -> Result<CommandResult, CommandError> {
        match action {
            BreakpointAction::Set { addr } => {
                self.breakpoints.insert(addr);
            }
            BreakpointAction::Clear { addr } => {
                self.breakpoints.remove(&addr);
            }
            BreakpointAction::ClearAll => {
                self.breakpoints.clear();
            }
            BreakpointAction::List => {
                let mut bps: Vec<u16> = self.breakpoints.iter().copied().collect();
                bps.sort();
                return Ok(CommandResult::Breakpoints(bps));
            }
        };

        Ok(CommandResult::Ok)
    }

    fn handle_set(&mut self, target: SetTarget, value: u16) -> Result<CommandResult, CommandError> {
        let chip8 = self.runner.chip8_mut();
        let byte = || u8::try_from(value).map_err(|_| CommandError::ValueOutOfRange);

        match target {
            SetTarget::V(reg) => {
                chip8.v[reg] = byte()?;
            }
            SetTarget::I => {
                chip8.i = value;
            }
            SetTarget::Pc => {
                if usize::from(value) >= MEMORY_SIZE {
                    return Err(CommandError::ValueOutOfRange);
                }
                chip8.pc = value;
            }
            SetTarget::DelayTimer => {
                chip8.delay_timer = byte()?;
            }
            SetTarget::SoundTimer => {
                chip8.sound_timer = byte()?;
            }
        }

        Ok(CommandResult::Ok)
    }

    fn handle_mem(&self, start: u16, len: u16) -> Result<CommandResult, CommandError> {
        let data = self
            .chip8()
            .mem_slice(start, usize::from(len))
            .map_err(|err| match err {
                Chip8Error::MemoryOutOfBounds { .. } => CommandError::ValueOutOfRange,
                other => CommandError::Chip8Error(other),
            })?
            .to_vec();

        Ok(CommandResult::MemDump {
            data,
            offset: start,
        })
    }
}
