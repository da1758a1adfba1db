use log::{debug, trace, warn};
use rand::{SeedableRng, rngs::StdRng};

use super::{
    CallStack, Chip8Error, Chip8Result, DISPLAY_X, DISPLAY_Y, Display, FONT, FONT_END_ADDRESS,
    FONT_START_ADDRESS, Opcode, Quirks, Status, Tone,
};
use crate::u4;

// The constants are specified by the CHIP-8 specification
pub const ROM_START_ADDRESS: usize = 0x200;
pub const MEMORY_SIZE: usize = 4096;

/// State of a pending FX0A instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyWait {
    /// Register receiving the key.
    pub(crate) x: u4,
    /// Key pressed during the wait, only tracked when waiting for a release.
    pub(crate) held: Option<u4>,
    /// Key that completes the wait on the next cycle.
    pub(crate) key: Option<u4>,
}

/// CHIP-8 virtual machine state
pub struct Chip8 {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) display: Display<bool>,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Call stack for subroutine returns
    pub(crate) stack: CallStack,

    /// Delay timer: decrements at 60Hz until it reaches 0
    pub(crate) delay_timer: u8,
    /// Sound timer: decrements at 60Hz, beeps while non-zero
    pub(crate) sound_timer: u8,

    /// Set while an FX0A instruction is blocking execution
    pub(crate) key_wait: Option<KeyWait>,
    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; 16],

    pub(crate) status: Status,
    pub(crate) quirks: Quirks,
    pub(crate) rng: StdRng,
}

impl Chip8 {
    pub fn new() -> Self {
        Self::with_rng(Quirks::default(), StdRng::from_os_rng())
    }

    pub fn with_quirks(quirks: Quirks) -> Self {
        Self::with_rng(quirks, StdRng::from_os_rng())
    }

    /// Creates a machine whose CXNN random source is seeded, for reproducible runs.
    pub fn with_seed(quirks: Quirks, seed: u64) -> Self {
        Self::with_rng(quirks, StdRng::seed_from_u64(seed))
    }

    fn with_rng(quirks: Quirks, rng: StdRng) -> Self {
        let mut chip8 = Chip8 {
            memory: [0; MEMORY_SIZE],
            display: [[false; DISPLAY_X]; DISPLAY_Y],
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: CallStack::new(),
            delay_timer: 0,
            sound_timer: 0,
            key_wait: None,
            keypad: [false; 16],
            status: Status::Running,
            quirks,
            rng,
        };
        chip8.reset();
        chip8
    }

    /// Returns the machine to its power-on state and installs the font set.
    ///
    /// Quirks and the random source are kept.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
        self.display = [[false; DISPLAY_X]; DISPLAY_Y];
        self.pc = ROM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack.clear();
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.key_wait = None;
        self.keypad = [false; 16];
        self.status = Status::Running;
        debug!("machine reset, pc at {:#05X}", self.pc);
    }

    /// Loads a ROM into memory at the program start address.
    ///
    /// A ROM that does not fit leaves memory untouched and puts the machine in the
    /// error state.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        let rom_end = ROM_START_ADDRESS + rom.len();
        let Some(region) = self.memory.get_mut(ROM_START_ADDRESS..rom_end) else {
            let err = Chip8Error::RomLoadError {
                size: rom.len(),
                max_size: MEMORY_SIZE - ROM_START_ADDRESS,
            };
            warn!("{err}");
            self.status = Status::Error(err.clone());
            return Err(err);
        };
        region.copy_from_slice(rom);

        // Set program counter to start of ROM
        self.pc = ROM_START_ADDRESS as u16;
        debug!("loaded {} byte ROM at {:#05X}", rom.len(), ROM_START_ADDRESS);

        Ok(())
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// A faulted machine returns the recorded error again without touching any state.
    pub fn cpu_cycle(&mut self) -> Result<Chip8Result, Chip8Error> {
        if let Status::Error(err) = &self.status {
            return Err(err.clone());
        }

        if let Some(wait) = self.key_wait {
            return Ok(self.resume_key_wait(wait));
        }

        let result = self.step();
        if let Err(err) = &result {
            warn!("halting at {:#05X}: {err}", self.pc);
            self.status = Status::Error(err.clone());
        }
        result
    }

    fn step(&mut self) -> Result<Chip8Result, Chip8Error> {
        let word = self.fetch()?;
        let opcode = Opcode::decode(word);
        trace!("{:#05X}: {word:04X} {opcode:?}", self.pc);
        self.execute(opcode)
    }

    fn resume_key_wait(&mut self, wait: KeyWait) -> Chip8Result {
        let Some(key) = wait.key else {
            return Chip8Result::AwaitingKey;
        };

        debug!("key {key:X} ends wait, stored in V{:X}", wait.x);
        self.v[wait.x] = u8::from(key);
        self.key_wait = None;
        self.pc = self.pc.wrapping_add(2);
        Chip8Result::Continue
    }

    /// Updates the delay and sound timers. Should be called at 60Hz.
    ///
    /// The returned [`Tone`] tells the audio collaborator whether to keep sounding
    /// or to stop.
    pub fn timers_cycle(&mut self) -> Tone {
        let was_sounding = self.should_beep();
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
        Tone::between(was_sounding, self.should_beep())
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        let was_pressed = self.keypad[key];
        self.keypad[key] = pressed;

        let on_release = self.quirks.key_wait_on_release;
        if let Some(wait) = &mut self.key_wait
            && wait.key.is_none()
        {
            match (was_pressed, pressed) {
                (false, true) if on_release => {
                    wait.held.get_or_insert(key);
                }
                (false, true) => wait.key = Some(key),
                (true, false) if wait.held == Some(key) => wait.key = Some(key),
                _ => {}
            }
        }
    }

    /// Like [`Chip8::set_key`] for an untyped key index coming from a driver.
    ///
    /// An index above 0xF is reported to the caller; machine status is not affected.
    pub fn try_set_key(&mut self, key: u8, pressed: bool) -> Result<(), Chip8Error> {
        let key = u4::try_from(key).map_err(|_| Chip8Error::InvalidKey { key })?;
        self.set_key(key, pressed);
        Ok(())
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    pub fn get_display_pixel(&self, y: usize, x: usize) -> bool {
        self.display[y][x]
    }

    pub fn display(&self) -> &Display<bool> {
        &self.display
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn v(&self) -> &[u8; 16] {
        &self.v
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn keypad(&self) -> &[bool; 16] {
        &self.keypad
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn quirks(&self) -> Quirks {
        self.quirks
    }

    /// Register an FX0A instruction is waiting to fill, if any.
    pub fn awaiting_key(&self) -> Option<u4> {
        self.key_wait.map(|wait| wait.x)
    }

    /// Fetches the next 16-bit opcode from memory.
    fn fetch(&self) -> Result<u16, Chip8Error> {
        let bytes = self.mem_slice(self.pc, 2)?;
        if self.pc % 2 != 0 {
            return Err(Chip8Error::MisalignedPc { address: self.pc });
        }

        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Bounds checked view of `len` bytes starting at `addr`.
    pub(crate) fn mem_slice(&self, addr: u16, len: usize) -> Result<&[u8], Chip8Error> {
        let start = usize::from(addr);
        self.memory
            .get(start..start + len)
            .ok_or_else(|| out_of_bounds(start))
    }

    /// Mutable counterpart of [`Chip8::mem_slice`].
    pub(crate) fn mem_slice_mut(&mut self, addr: u16, len: usize) -> Result<&mut [u8], Chip8Error> {
        let start = usize::from(addr);
        self.memory
            .get_mut(start..start + len)
            .ok_or_else(|| out_of_bounds(start))
    }
}

/// Error for an access starting at `start` that runs past the end of memory.
fn out_of_bounds(start: usize) -> Chip8Error {
    Chip8Error::MemoryOutOfBounds {
        address: start.max(MEMORY_SIZE) as u16,
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(rom: &[u8]) -> Chip8 {
        let mut chip8 = Chip8::with_seed(Quirks::default(), 0);
        chip8.load(rom).unwrap();
        chip8
    }

    #[test]
    fn reset_installs_font_and_clears_state() {
        let mut chip8 = machine(&[0x60, 0x01]);
        chip8.v[3] = 9;
        chip8.i = 0x300;
        chip8.delay_timer = 4;
        chip8.display[1][1] = true;
        chip8.stack.push(0x208).unwrap();
        chip8.keypad[2] = true;

        chip8.reset();

        assert_eq!(&chip8.memory[FONT_START_ADDRESS..FONT_END_ADDRESS], &FONT);
        assert_eq!(chip8.memory[ROM_START_ADDRESS], 0);
        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.i, 0);
        assert_eq!(chip8.v, [0; 16]);
        assert!(chip8.stack.is_empty());
        assert_eq!(chip8.delay_timer, 0);
        assert!(chip8.display.iter().flatten().all(|p| !p));
        assert!(chip8.keypad.iter().all(|k| !k));
        assert_eq!(chip8.status, Status::Running);
    }

    #[test]
    fn load_copies_rom_to_program_start() {
        let chip8 = machine(&[0xA2, 0x2A, 0x60, 0x0C]);
        assert_eq!(&chip8.memory[0x200..0x204], &[0xA2, 0x2A, 0x60, 0x0C]);
        assert_eq!(chip8.pc, 0x200);
    }

    #[test]
    fn load_accepts_rom_filling_all_memory() {
        let rom = vec![0x12; MEMORY_SIZE - ROM_START_ADDRESS];
        let chip8 = machine(&rom);
        assert_eq!(chip8.memory[MEMORY_SIZE - 1], 0x12);
    }

    #[test]
    fn oversized_rom_is_rejected_without_partial_copy() {
        let mut chip8 = Chip8::with_seed(Quirks::default(), 0);
        let rom = vec![0xAA; MEMORY_SIZE - ROM_START_ADDRESS + 1];

        let err = chip8.load(&rom).unwrap_err();

        assert_eq!(
            err,
            Chip8Error::RomLoadError {
                size: rom.len(),
                max_size: MEMORY_SIZE - ROM_START_ADDRESS
            }
        );
        assert!(chip8.memory[ROM_START_ADDRESS..].iter().all(|&b| b == 0));
        assert_eq!(chip8.status, Status::Error(err.clone()));
        assert_eq!(chip8.cpu_cycle(), Err(err));
    }

    #[test]
    fn timers_clamp_at_zero_and_report_tone() {
        let mut chip8 = machine(&[]);
        chip8.delay_timer = 1;
        chip8.sound_timer = 2;

        assert_eq!(chip8.timers_cycle(), Tone::Sounding);
        assert_eq!(chip8.delay_timer, 0);
        assert_eq!(chip8.timers_cycle(), Tone::Stopped);
        assert_eq!(chip8.timers_cycle(), Tone::Silent);
        assert_eq!(chip8.delay_timer, 0);
        assert_eq!(chip8.sound_timer, 0);
    }

    #[test]
    fn try_set_key_rejects_out_of_range_index() {
        let mut chip8 = machine(&[]);
        assert_eq!(
            chip8.try_set_key(0x10, true),
            Err(Chip8Error::InvalidKey { key: 0x10 })
        );
        assert_eq!(chip8.status, Status::Running);

        chip8.try_set_key(0xF, true).unwrap();
        assert!(chip8.keypad[0xF]);
    }

    #[test]
    fn fetch_at_odd_pc_faults() {
        let mut chip8 = machine(&[0x00, 0xE0]);
        chip8.pc = 0x201;
        assert_eq!(
            chip8.cpu_cycle(),
            Err(Chip8Error::MisalignedPc { address: 0x201 })
        );
        assert!(!chip8.status.is_running());
    }

    #[test]
    fn fetch_past_end_of_memory_faults() {
        let mut chip8 = machine(&[]);
        chip8.pc = 0x1000;
        assert_eq!(
            chip8.cpu_cycle(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        );
    }

    #[test]
    fn fetch_straddling_end_of_memory_faults() {
        let mut chip8 = machine(&[]);
        chip8.pc = 0xFFF;
        assert_eq!(
            chip8.cpu_cycle(),
            Err(Chip8Error::MemoryOutOfBounds { address: 0x1000 })
        );
        assert_eq!(chip8.pc, 0xFFF);
        assert!(!chip8.status.is_running());
    }

    #[test]
    fn key_wait_blocks_until_new_press() -> Result<(), Chip8Error> {
        let mut chip8 = machine(&[0xF5, 0x0A, 0x61, 0x01]);
        // Held before the wait started, so it does not count
        chip8.set_key(u4::new(0x2), true);

        assert_eq!(chip8.cpu_cycle()?, Chip8Result::AwaitingKey);
        assert_eq!(chip8.awaiting_key(), Some(u4::new(5)));
        for _ in 0..3 {
            assert_eq!(chip8.cpu_cycle()?, Chip8Result::AwaitingKey);
        }
        assert_eq!(chip8.pc, 0x200);

        chip8.set_key(u4::new(0xB), true);
        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.cpu_cycle()?, Chip8Result::Continue);
        assert_eq!(chip8.v[5], 0xB);
        assert_eq!(chip8.pc, 0x202);
        assert_eq!(chip8.awaiting_key(), None);

        chip8.cpu_cycle()?;
        assert_eq!(chip8.v[1], 1);
        Ok(())
    }

    #[test]
    fn key_wait_on_release_quirk() -> Result<(), Chip8Error> {
        let quirks = Quirks {
            key_wait_on_release: true,
            ..Quirks::default()
        };
        let mut chip8 = Chip8::with_seed(quirks, 0);
        chip8.load(&[0xF0, 0x0A])?;

        chip8.cpu_cycle()?;
        chip8.set_key(u4::new(0x4), true);
        assert_eq!(chip8.cpu_cycle()?, Chip8Result::AwaitingKey);

        chip8.set_key(u4::new(0x4), false);
        assert_eq!(chip8.cpu_cycle()?, Chip8Result::Continue);
        assert_eq!(chip8.v[0], 0x4);
        assert_eq!(chip8.pc, 0x202);
        Ok(())
    }

    #[test]
    fn key_wait_on_release_completes_with_first_key_pressed() -> Result<(), Chip8Error> {
        let quirks = Quirks {
            key_wait_on_release: true,
            ..Quirks::default()
        };
        let mut chip8 = Chip8::with_seed(quirks, 0);
        chip8.load(&[0xF0, 0x0A])?;
        assert_eq!(chip8.quirks(), quirks);
        chip8.cpu_cycle()?;

        chip8.set_key(u4::new(0x1), true);
        chip8.set_key(u4::new(0x2), true);
        chip8.set_key(u4::new(0x2), false);
        assert_eq!(chip8.cpu_cycle()?, Chip8Result::AwaitingKey);

        chip8.set_key(u4::new(0x1), false);
        assert_eq!(chip8.cpu_cycle()?, Chip8Result::Continue);
        assert_eq!(chip8.v[0], 0x1);
        Ok(())
    }

    #[test]
    fn reset_cancels_key_wait() -> Result<(), Chip8Error> {
        let mut chip8 = machine(&[0xF0, 0x0A]);
        chip8.cpu_cycle()?;
        chip8.reset();
        assert_eq!(chip8.awaiting_key(), None);
        Ok(())
    }

    #[test]
    fn faulted_machine_stays_halted() {
        let mut chip8 = machine(&[0xFF, 0xFF, 0x60, 0x01]);
        let err = Chip8Error::UnknownOpcode { opcode: 0xFFFF };

        assert_eq!(chip8.cpu_cycle(), Err(err.clone()));
        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.cpu_cycle(), Err(err));
        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.v[0], 0);
    }
}
