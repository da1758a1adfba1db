use std::collections::HashSet;

use log::debug;

use super::{Chip8, Chip8Error, Chip8Result, Tone};
use crate::u4;

/// Instruction and timer rates used by [`Chip8Runner`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerConfig {
    pub cpu_hz: f32,
    pub timer_hz: f32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cpu_hz: 700.0,
            timer_hz: 60.0,
        }
    }
}

/// High-level emulator runner that manages timing internally.
pub struct Chip8Runner {
    chip8: Chip8,
    config: RunnerConfig,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
    tone: Tone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip8RunnerResult {
    HitBreakpoint,
    Ok,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8) -> Self {
        Self::with_config(chip8, RunnerConfig::default())
    }

    pub fn with_config(chip8: Chip8, config: RunnerConfig) -> Self {
        Self {
            chip8,
            config,
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
            tone: Tone::Silent,
        }
    }

    /// Executes up to `cycles` CPU cycles without touching the timers.
    ///
    /// Returns the number of instructions retired. Stops early while the machine is
    /// waiting for a key, since further cycles could not make progress.
    pub fn run_cycles(&mut self, cycles: usize) -> Result<usize, Chip8Error> {
        let mut retired = 0;
        for _ in 0..cycles {
            match self.chip8.cpu_cycle()? {
                Chip8Result::AwaitingKey => break,
                Chip8Result::Continue | Chip8Result::WaitForNextFrame => retired += 1,
            }
        }
        Ok(retired)
    }

    /// Runs one timer tick.
    pub fn tick_timers(&mut self) -> Tone {
        self.tone = self.chip8.timers_cycle();
        self.tone
    }

    /// Update emulator by delta time, handles both CPU and timer cycles.
    ///
    /// Runs as many CPU cycles and timer updates as needed based on the elapsed time `dt`.
    /// Returns early if a frame has to be rendered before the next CPU cycle.
    pub fn update(&mut self, dt: f32) -> Result<Chip8RunnerResult, Chip8Error> {
        self.update_with_breakpoints(dt, None)
    }

    /// Like `update` but checks for breakpoints after each CPU cycle.
    pub fn update_with_breakpoints(
        &mut self,
        dt: f32,
        breakpoints: Option<&HashSet<u16>>,
    ) -> Result<Chip8RunnerResult, Chip8Error> {
        let cpu_time_step = 1.0 / self.config.cpu_hz;
        let timer_time_step = 1.0 / self.config.timer_hz;

        self.cpu_dt_accumulator += dt;
        self.timer_dt_accumulator += dt;

        let was_sounding = self.chip8.should_beep();
        let mut ticked = false;
        while self.timer_dt_accumulator >= timer_time_step {
            self.timer_dt_accumulator -= timer_time_step;
            self.chip8.timers_cycle();
            ticked = true;
        }
        if ticked {
            self.tone = Tone::between(was_sounding, self.chip8.should_beep());
        }

        while self.cpu_dt_accumulator >= cpu_time_step {
            self.cpu_dt_accumulator -= cpu_time_step;

            let cpu_result = self.chip8.cpu_cycle()?;

            if let Some(breakpoints) = &breakpoints
                && breakpoints.contains(&self.chip8.pc)
            {
                debug!("breakpoint hit at {:#05X}", self.chip8.pc);
                self.cpu_dt_accumulator = 0.0;
                return Ok(Chip8RunnerResult::HitBreakpoint);
            }

            let end_frame = match cpu_result {
                Chip8Result::AwaitingKey => true,
                Chip8Result::WaitForNextFrame => self.chip8.quirks().display_wait,
                Chip8Result::Continue => false,
            };
            if end_frame {
                // We clear the accumulator to avoid "catching up" in the next frame.
                self.cpu_dt_accumulator = 0.0;
                break;
            }
        }

        Ok(Chip8RunnerResult::Ok)
    }

    /// Audio signal from the most recent timer tick.
    pub fn tone(&self) -> Tone {
        self.tone
    }

    /// Returns true if the sound timer is active, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.chip8.set_key(key, pressed)
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.chip8.get_display_pixel(y, x)
    }

    pub fn config(&self) -> RunnerConfig {
        self.config
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn chip8_mut(&mut self) -> &mut Chip8 {
        &mut self.chip8
    }

    pub fn into_inner(self) -> Chip8 {
        self.chip8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip8::{Quirks, Status};

    // Power-of-two rates keep the accumulator arithmetic exact.
    const CONFIG: RunnerConfig = RunnerConfig {
        cpu_hz: 8.0,
        timer_hz: 4.0,
    };

    fn runner_with(quirks: Quirks, words: &[u16]) -> Chip8Runner {
        let rom: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        let mut chip8 = Chip8::with_seed(quirks, 1);
        chip8.load(&rom).unwrap();
        Chip8Runner::with_config(chip8, CONFIG)
    }

    #[test]
    fn run_cycles_counts_retired_instructions() -> Result<(), Chip8Error> {
        let mut runner = runner_with(Quirks::default(), &[0x6001, 0x7001, 0x7001, 0x1206]);
        assert_eq!(runner.run_cycles(10)?, 10);
        assert_eq!(runner.chip8_ref().v()[0], 3);
        assert_eq!(runner.chip8_ref().pc(), 0x206);
        Ok(())
    }

    #[test]
    fn run_cycles_stops_on_key_wait() -> Result<(), Chip8Error> {
        let mut runner = runner_with(Quirks::default(), &[0x6001, 0xF30A, 0x6002]);
        // FX0A is not retired until a key arrives
        assert_eq!(runner.run_cycles(10)?, 1);
        assert_eq!(runner.chip8_ref().awaiting_key(), Some(u4::new(3)));
        assert_eq!(runner.run_cycles(10)?, 0);
        Ok(())
    }

    #[test]
    fn update_schedules_cpu_and_timers_independently() -> Result<(), Chip8Error> {
        // V0 counts instructions, delay timer starts at 0x10
        let mut runner = runner_with(Quirks::default(), &[0x6010, 0xF015, 0x7001, 0x1204]);
        runner.update(1.0)?;

        // 8 cycles: two setup instructions, then ADD and JP alternate
        assert_eq!(runner.chip8_ref().v()[0], 0x10 + 3);
        // 4 ticks, all before the timer was set
        assert_eq!(runner.chip8_ref().delay_timer(), 0x10);

        runner.update(1.0)?;
        assert_eq!(runner.chip8_ref().delay_timer(), 0x10 - 4);
        Ok(())
    }

    #[test]
    fn update_reports_sound_stopping() -> Result<(), Chip8Error> {
        let mut runner = runner_with(Quirks::default(), &[0x6002, 0xF018, 0x1204]);
        runner.update(0.25)?;
        assert!(runner.should_beep());

        runner.update(0.25)?;
        assert_eq!(runner.tone(), Tone::Sounding);
        runner.update(0.25)?;
        assert_eq!(runner.tone(), Tone::Stopped);
        runner.update(0.25)?;
        assert_eq!(runner.tone(), Tone::Silent);
        Ok(())
    }

    #[test]
    fn display_wait_limits_draws_per_frame() -> Result<(), Chip8Error> {
        let quirks = Quirks {
            display_wait: true,
            ..Quirks::default()
        };
        let mut runner = runner_with(quirks, &[0xD001, 0xD001, 0xD001]);
        runner.update(1.0)?;
        assert_eq!(runner.chip8_ref().pc(), 0x202);

        let mut runner = runner_with(Quirks::default(), &[0xD001, 0xD001, 0xD001]);
        runner.update(0.375)?;
        assert_eq!(runner.chip8_ref().pc(), 0x206);
        Ok(())
    }

    #[test]
    fn breakpoint_stops_update() -> Result<(), Chip8Error> {
        let mut runner = runner_with(Quirks::default(), &[0x6001, 0x6002, 0x6003, 0x1200]);
        let breakpoints = HashSet::from([0x204]);
        let result = runner.update_with_breakpoints(1.0, Some(&breakpoints))?;
        assert_eq!(result, Chip8RunnerResult::HitBreakpoint);
        assert_eq!(runner.chip8_ref().pc(), 0x204);
        assert_eq!(runner.chip8_ref().v()[0], 2);
        Ok(())
    }

    #[test]
    fn fault_propagates_and_halts() {
        let mut runner = runner_with(Quirks::default(), &[0x6001, 0x0000]);
        let err = Chip8Error::UnknownOpcode { opcode: 0x0000 };
        assert_eq!(runner.update(1.0), Err(err.clone()));
        assert_eq!(runner.chip8_ref().status(), &Status::Error(err));
        assert_eq!(runner.chip8_ref().pc(), 0x202);
    }
}
