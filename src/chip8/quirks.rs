/// Switches for the points where historical interpreters disagree.
///
/// The default is the modern behaviour. [`Quirks::cosmac_vip`] matches the original
/// COSMAC VIP interpreter that many early ROMs were written against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quirks {
    /// 8xy6/8xyE shift Vy and store the result in Vx, instead of shifting Vx in place.
    pub shift_uses_vy: bool,
    /// 8xy1/8xy2/8xy3 clear VF.
    pub logic_resets_vf: bool,
    /// Fx55/Fx65 leave I pointing one past the last register transferred.
    pub load_store_increments_i: bool,
    /// Dxyn clips pixels past the right and bottom edges instead of wrapping them.
    pub clip_sprites: bool,
    /// Fx0A completes when the key is released rather than when it is pressed.
    pub key_wait_on_release: bool,
    /// Only one Dxyn is executed per frame.
    pub display_wait: bool,
}

impl Quirks {
    pub const fn cosmac_vip() -> Self {
        Self {
            shift_uses_vy: true,
            logic_resets_vf: true,
            load_store_increments_i: true,
            clip_sprites: true,
            key_wait_on_release: true,
            display_wait: true,
        }
    }
}
