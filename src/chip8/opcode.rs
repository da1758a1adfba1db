use crate::u4;

/// CHIP-8 instruction opcodes.
///
/// The fields (x, y, n, nn, nnn) correspond to the operands encoded in the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// 1nnn - Jump to location nnn.
    Jump { nnn: u16 },
    /// Bnnn - Jump to location nnn + V0.
    JumpWithOffset { nnn: u16 },

    /// 2nnn - Call subroutine at nnn.
    Call { nnn: u16 },
    /// 00EE - Return from a subroutine.
    Return,

    /// 3xnn - Skip next instruction if Vx == nn.
    SkipRegEqualImm { x: u4, nn: u8 },
    /// 4xnn - Skip next instruction if Vx != nn.
    SkipRegNotEqualImm { x: u4, nn: u8 },
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipRegEqualReg { x: u4, y: u4 },
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipRegNotEqualReg { x: u4, y: u4 },

    /// 6xnn - Set Vx = nn.
    SetRegImm { x: u4, nn: u8 },
    /// 7xnn - Set Vx = Vx + nn.
    AddRegImm { x: u4, nn: u8 },
    /// Annn - Set I = nnn.
    SetIndexImm { nnn: u16 },
    /// Fx1E - Set I = I + Vx.
    AddIndexReg { x: u4 },

    /// 8xyN - ALU operations
    ALU { x: u4, y: u4, op: OpcodeALU },
    /// Cxnn - Set Vx = random byte AND nn.
    Random { x: u4, nn: u8 },

    /// 00E0 - Clear the display.
    ClearDisplay,
    /// Dxyn - Display sprite.
    Draw { x: u4, y: u4, n: u4 },

    /// Ex9E - Skip next instruction if key with the value of Vx is pressed.
    SkipIfPressed { x: u4 },
    /// ExA1 - Skip next instruction if key with the value of Vx is not pressed.
    SkipIfNotPressed { x: u4 },
    /// Fx0A - Wait for a key press, store the value of the key in Vx.
    WaitForKey { x: u4 },

    /// Fx07 - Set Vx = delay timer value.
    ReadDelayTimer { x: u4 },
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer { x: u4 },
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer { x: u4 },

    /// Fx29 - Set I = location of sprite for digit Vx.
    FontChar { x: u4 },
    /// Fx33 - Store BCD representation of Vx in memory locations I, I+1, and I+2.
    BCD { x: u4 },

    /// Fx55 - Store registers V0 through Vx in memory starting at location I.
    StoreRegs { x: u4 },
    /// Fx65 - Read registers V0 through Vx from memory starting at location I.
    LoadRegs { x: u4 },

    /// An instruction word that matches no opcode. Executing it faults.
    Unknown(u16),
}

/// ALU operations for the 8xyN instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeALU {
    /// 8xy0 - Vx = Vy
    Set,
    /// 8xy1 - Vx = Vx OR Vy
    Or,
    /// 8xy2 - Vx = Vx AND Vy
    And,
    /// 8xy3 - Vx = Vx XOR Vy
    Xor,
    /// 8xy4 - Vx = Vx + Vy, VF = carry
    Add,
    /// 8xy5 - Vx = Vx - Vy, VF = NOT borrow
    Sub,
    /// 8xy6 - Vx = Vx SHR 1, VF = shifted out bit
    ShiftRight,
    /// 8xy7 - Vx = Vy - Vx, VF = NOT borrow
    SubReverse,
    /// 8xyE - Vx = Vx SHL 1, VF = shifted out bit
    ShiftLeft,
}

impl OpcodeALU {
    /// Operation selected by the last nibble of an 8xyN word.
    fn from_selector(selector: u4) -> Option<Self> {
        Some(match selector.get() {
            0x0 => Self::Set,
            0x1 => Self::Or,
            0x2 => Self::And,
            0x3 => Self::Xor,
            0x4 => Self::Add,
            0x5 => Self::Sub,
            0x6 => Self::ShiftRight,
            0x7 => Self::SubReverse,
            0xE => Self::ShiftLeft,
            _ => return None,
        })
    }
}

/// Operand fields of a raw instruction word, read as `Fxyn`.
#[derive(Clone, Copy)]
struct Word(u16);

impl Word {
    fn family(self) -> u8 {
        (self.0 >> 12) as u8
    }

    fn x(self) -> u4 {
        u4::low((self.0 >> 8) as u8)
    }

    fn y(self) -> u4 {
        u4::low((self.0 >> 4) as u8)
    }

    fn n(self) -> u4 {
        u4::low(self.0 as u8)
    }

    fn nn(self) -> u8 {
        self.0 as u8
    }

    fn nnn(self) -> u16 {
        self.0 & 0x0FFF
    }
}

impl Opcode {
    /// Decode a 16-bit raw opcode into an `Opcode` enum variant.
    ///
    /// Words that match no instruction decode to [`Opcode::Unknown`]; decoding never fails.
    pub fn decode(opcode: u16) -> Self {
        let word = Word(opcode);
        let (x, y, n, nn, nnn) = (word.x(), word.y(), word.n(), word.nn(), word.nnn());

        let decoded = match word.family() {
            0x0 => match opcode {
                0x00E0 => Some(Opcode::ClearDisplay),
                0x00EE => Some(Opcode::Return),
                _ => None,
            },
            0x1 => Some(Opcode::Jump { nnn }),
            0x2 => Some(Opcode::Call { nnn }),
            0x3 => Some(Opcode::SkipRegEqualImm { x, nn }),
            0x4 => Some(Opcode::SkipRegNotEqualImm { x, nn }),
            0x5 if n.get() == 0 => Some(Opcode::SkipRegEqualReg { x, y }),
            0x6 => Some(Opcode::SetRegImm { x, nn }),
            0x7 => Some(Opcode::AddRegImm { x, nn }),
            0x8 => OpcodeALU::from_selector(n).map(|op| Opcode::ALU { x, y, op }),
            0x9 if n.get() == 0 => Some(Opcode::SkipRegNotEqualReg { x, y }),
            0xA => Some(Opcode::SetIndexImm { nnn }),
            0xB => Some(Opcode::JumpWithOffset { nnn }),
            0xC => Some(Opcode::Random { x, nn }),
            0xD => Some(Opcode::Draw { x, y, n }),
            0xE => Self::decode_key_skip(x, nn),
            0xF => Self::decode_misc(x, nn),
            _ => None,
        };

        decoded.unwrap_or(Opcode::Unknown(opcode))
    }

    /// Ex9E / ExA1.
    fn decode_key_skip(x: u4, nn: u8) -> Option<Self> {
        match nn {
            0x9E => Some(Opcode::SkipIfPressed { x }),
            0xA1 => Some(Opcode::SkipIfNotPressed { x }),
            _ => None,
        }
    }

    /// The Fx family: timers, key wait, index and register transfer.
    fn decode_misc(x: u4, nn: u8) -> Option<Self> {
        let opcode = match nn {
            0x07 => Opcode::ReadDelayTimer { x },
            0x0A => Opcode::WaitForKey { x },
            0x15 => Opcode::SetDelayTimer { x },
            0x18 => Opcode::SetSoundTimer { x },
            0x1E => Opcode::AddIndexReg { x },
            0x29 => Opcode::FontChar { x },
            0x33 => Opcode::BCD { x },
            0x55 => Opcode::StoreRegs { x },
            0x65 => Opcode::LoadRegs { x },
            _ => return None,
        };
        Some(opcode)
    }
}
