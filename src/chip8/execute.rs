use log::debug;
use rand::Rng;

use super::{
    Chip8, Chip8Error, Chip8Result, DISPLAY_X, DISPLAY_Y, FONT_GLYPH_SIZE, FONT_START_ADDRESS,
    KeyWait, Opcode, OpcodeALU,
};
use crate::u4;

impl Chip8 {
    /// Applies one decoded instruction.
    ///
    /// Every fallible check happens before state is written, so an `Err` leaves the
    /// machine exactly as it was before the instruction.
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<Chip8Result, Chip8Error> {
        let mut next_pc = self.pc.wrapping_add(2);
        let skip = next_pc.wrapping_add(2);
        let mut result = Chip8Result::Continue;

        match opcode {
            Opcode::ClearDisplay => {
                self.display = [[false; DISPLAY_X]; DISPLAY_Y];
            }
            Opcode::Jump { nnn } => {
                next_pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                next_pc = nnn.wrapping_add(self.v[0].into());
            }
            Opcode::Call { nnn } => {
                self.stack
                    .push(next_pc)
                    .map_err(|_| Chip8Error::StackOverflow { address: self.pc })?;
                next_pc = nnn;
            }
            Opcode::Return => {
                next_pc = self
                    .stack
                    .pop()
                    .map_err(|_| Chip8Error::StackUnderflow { address: self.pc })?;
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                if self.v[x] == nn {
                    next_pc = skip;
                }
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                if self.v[x] != nn {
                    next_pc = skip;
                }
            }
            Opcode::SkipRegEqualReg { x, y } => {
                if self.v[x] == self.v[y] {
                    next_pc = skip;
                }
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                if self.v[x] != self.v[y] {
                    next_pc = skip;
                }
            }
            Opcode::SetRegImm { x, nn } => {
                self.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                self.v[x] = self.v[x].wrapping_add(nn);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = self.rng.random();
                self.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                self.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Opcode::Draw { x, y, n } => {
                self.execute_draw(x, y, n)?;
                result = Chip8Result::WaitForNextFrame;
            }
            Opcode::SkipIfPressed { x } => {
                if self.keypad[u4::low(self.v[x])] {
                    next_pc = skip;
                }
            }
            Opcode::SkipIfNotPressed { x } => {
                if !self.keypad[u4::low(self.v[x])] {
                    next_pc = skip;
                }
            }
            Opcode::WaitForKey { x } => {
                debug!("waiting for key into V{x:X}");
                self.key_wait = Some(KeyWait {
                    x,
                    held: None,
                    key: None,
                });
                // Stay on this instruction until a key completes the wait
                next_pc = self.pc;
                result = Chip8Result::AwaitingKey;
            }
            Opcode::ReadDelayTimer { x } => {
                self.v[x] = self.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                self.delay_timer = self.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                self.sound_timer = self.v[x];
            }
            Opcode::FontChar { x } => {
                let digit = u16::from(u4::low(self.v[x]));
                self.i = FONT_START_ADDRESS as u16 + digit * FONT_GLYPH_SIZE as u16;
            }
            Opcode::BCD { x } => {
                let value = self.v[x];
                let digits = self.mem_slice_mut(self.i, 3)?;
                digits[0] = value / 100;
                digits[1] = (value / 10) % 10;
                digits[2] = value % 10;
            }
            Opcode::StoreRegs { x } => {
                let count = usize::from(x) + 1;
                let (i, v) = (self.i, self.v);
                self.mem_slice_mut(i, count)?.copy_from_slice(&v[..count]);
                self.advance_index_after_transfer(count);
            }
            Opcode::LoadRegs { x } => {
                let count = usize::from(x) + 1;
                let mut loaded = [0u8; 16];
                loaded[..count].copy_from_slice(self.mem_slice(self.i, count)?);
                self.v[..count].copy_from_slice(&loaded[..count]);
                self.advance_index_after_transfer(count);
            }
            Opcode::Unknown(opcode) => {
                return Err(Chip8Error::UnknownOpcode { opcode });
            }
        };

        self.pc = next_pc;
        Ok(result)
    }

    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        // The flag is written after the result so that VF as a destination ends up
        // holding the flag.
        match op {
            OpcodeALU::Set => self.v[x] = self.v[y],
            OpcodeALU::Or => {
                self.v[x] |= self.v[y];
                self.reset_flag_after_logic();
            }
            OpcodeALU::And => {
                self.v[x] &= self.v[y];
                self.reset_flag_after_logic();
            }
            OpcodeALU::Xor => {
                self.v[x] ^= self.v[y];
                self.reset_flag_after_logic();
            }
            OpcodeALU::Add => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = u8::from(overflow);
            }
            OpcodeALU::Sub => {
                let (res, borrow) = self.v[x].overflowing_sub(self.v[y]);
                self.v[x] = res;
                self.v[0xF] = u8::from(!borrow); // Notice that borrow is inverted
            }
            OpcodeALU::SubReverse => {
                let (res, borrow) = self.v[y].overflowing_sub(self.v[x]);
                self.v[x] = res;
                self.v[0xF] = u8::from(!borrow);
            }
            OpcodeALU::ShiftRight => {
                let src = self.shift_source(x, y);
                let lsb = src & 1;
                self.v[x] = src >> 1;
                self.v[0xF] = lsb;
            }
            OpcodeALU::ShiftLeft => {
                let src = self.shift_source(x, y);
                let msb = (src >> 7) & 1;
                self.v[x] = src << 1;
                self.v[0xF] = msb;
            }
        }
    }

    fn shift_source(&self, x: u4, y: u4) -> u8 {
        if self.quirks.shift_uses_vy {
            self.v[y]
        } else {
            self.v[x]
        }
    }

    fn reset_flag_after_logic(&mut self) {
        if self.quirks.logic_resets_vf {
            self.v[0xF] = 0;
        }
    }

    fn advance_index_after_transfer(&mut self, count: usize) {
        if self.quirks.load_store_increments_i {
            self.i = self.i.wrapping_add(count as u16);
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<(), Chip8Error> {
        let x_pos = self.v[x] as usize % DISPLAY_X;
        let y_pos = self.v[y] as usize % DISPLAY_Y;
        let clip = self.quirks.clip_sprites;

        let rows = usize::from(n);
        let mut sprite = [0u8; 15];
        if rows > 0 {
            sprite[..rows].copy_from_slice(self.mem_slice(self.i, rows)?);
        }

        let mut any_erased = false;
        for (row, sprite_byte) in sprite[..rows].iter().enumerate() {
            let py = y_pos + row;
            if clip && py >= DISPLAY_Y {
                break;
            }

            for col in 0..8 {
                // If current sprite bit is non-zero
                if (sprite_byte & (0x80 >> col)) == 0 {
                    continue;
                }

                let px = x_pos + col;
                if clip && px >= DISPLAY_X {
                    break;
                }

                let pixel = &mut self.display[py % DISPLAY_Y][px % DISPLAY_X];
                // Flip the pixel
                *pixel ^= true;

                if !*pixel {
                    any_erased = true;
                }
            }
        }

        self.v[0xF] = u8::from(any_erased);
        Ok(())
    }
}
