use std::fmt;
use std::ops::{Index, IndexMut};

/// A 4-bit unsigned integer (nibble).
///
/// Used for register operands and keypad indices, so indexing a `[T; 16]` with it
/// can never go out of bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub struct u4(u8);

impl u4 {
    /// Creates a new `u4` from a `u8`.
    ///
    /// Panics if the value is greater than 0x0F.
    pub const fn new(value: u8) -> Self {
        assert!(value <= 0x0F, "u4 value must be in range 0x0-0xF");
        Self(value)
    }

    /// Creates a `u4` from the low nibble of `value`, discarding the high nibble.
    pub const fn low(value: u8) -> Self {
        Self(value & 0x0F)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

/// Error returned when a `u8` does not fit in a nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("value {0:#04X} does not fit in 4 bits")]
pub struct NibbleOverflow(pub u8);

impl TryFrom<u8> for u4 {
    type Error = NibbleOverflow;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 0x0F {
            Ok(Self(value))
        } else {
            Err(NibbleOverflow(value))
        }
    }
}

impl From<u4> for u8 {
    fn from(v: u4) -> u8 {
        v.0
    }
}

impl From<u4> for u16 {
    fn from(v: u4) -> u16 {
        v.0 as u16
    }
}

impl From<u4> for usize {
    fn from(v: u4) -> usize {
        v.0 as usize
    }
}

impl fmt::UpperHex for u4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl<T> Index<u4> for [T; 16] {
    type Output = T;

    fn index(&self, index: u4) -> &Self::Output {
        &self[index.0 as usize]
    }
}

impl<T> IndexMut<u4> for [T; 16] {
    fn index_mut(&mut self, index: u4) -> &mut Self::Output {
        &mut self[index.0 as usize]
    }
}
