use crate::fpu::FpuFlags;

/// CPU generation the coprocessor is paired with. Only the 8086/8087 pair
/// differs in control word layout (it keeps the interrupt mask bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CpuArch {
    I8086,
    I286,
    #[default]
    I386,
    I486,
}

impl CpuArch {
    pub fn is_8086(self) -> bool {
        self == CpuArch::I8086
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    Nearest = 0,
    Down = 1,
    Up = 2,
    Chop = 3,
}

impl RoundMode {
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0x03 {
            0 => RoundMode::Nearest,
            1 => RoundMode::Down,
            2 => RoundMode::Up,
            _ => RoundMode::Chop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecisionControl {
    Single24 = 0,
    Reserved = 1,
    Double53 = 2,
    Extended64 = 3,
}

impl PrecisionControl {
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0x03 {
            0 => PrecisionControl::Single24,
            1 => PrecisionControl::Reserved,
            2 => PrecisionControl::Double53,
            _ => PrecisionControl::Extended64,
        }
    }
}

/// The 16-bit control register.
///
/// Layout:
/// ```text
///  15-13  12   11-10  9-8   7   6   5    4    3    2    1    0
///  ----   IC   RC     PC    M   -   PM   UM   OM   ZM   DM   IM
/// ```
/// All access goes through shift/mask helpers on the one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWord(u16);

impl Default for ControlWord {
    fn default() -> Self {
        Self(Self::INIT)
    }
}

impl ControlWord {
    pub const MASK_8087: u16 = 0x1FFF;
    pub const MASK_NON_8087: u16 = 0x1F7F;
    pub const INIT: u16 = 0x037F;

    pub const IM: u16 = 1 << 0;
    pub const DM: u16 = 1 << 1;
    pub const ZM: u16 = 1 << 2;
    pub const OM: u16 = 1 << 3;
    pub const UM: u16 = 1 << 4;
    pub const PM: u16 = 1 << 5;
    pub const M: u16 = 1 << 7;
    pub const IC: u16 = 1 << 12;

    const PC_SHIFT: u16 = 8;
    const RC_SHIFT: u16 = 10;
    const EXCEPTION_MASKS: u16 = 0x003F;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn legal_mask(arch: CpuArch) -> u16 {
        if arch.is_8086() {
            Self::MASK_8087
        } else {
            Self::MASK_NON_8087
        }
    }

    /// FLDCW semantics: bits the architecture doesn't implement read as zero.
    pub fn load(&mut self, raw: u16, arch: CpuArch) {
        self.0 = raw & Self::legal_mask(arch);
    }

    pub fn init(&mut self) {
        self.0 = Self::INIT;
    }

    pub fn raw(&self) -> u16 {
        self.0
    }

    pub fn all_masked(&self) -> Self {
        Self(self.0 | Self::EXCEPTION_MASKS)
    }

    /// True when every exception named in `flags` is masked.
    pub fn is_masked(&self, flags: FpuFlags) -> bool {
        let m = flags.bits() & Self::EXCEPTION_MASKS;
        self.0 & m == m
    }

    pub fn rounding(&self) -> RoundMode {
        RoundMode::from_bits(self.field(Self::RC_SHIFT, 2))
    }

    pub fn set_rounding(&mut self, mode: RoundMode) {
        self.set_field(Self::RC_SHIFT, 2, mode as u16);
    }

    pub fn precision(&self) -> PrecisionControl {
        PrecisionControl::from_bits(self.field(Self::PC_SHIFT, 2))
    }

    pub fn set_precision(&mut self, pc: PrecisionControl) {
        self.set_field(Self::PC_SHIFT, 2, pc as u16);
    }

    pub fn interrupt_mask(&self) -> bool {
        self.0 & Self::M != 0
    }

    pub fn set_interrupt_mask(&mut self, on: bool) {
        self.set_field(7, 1, on as u16);
    }

    pub fn infinity_control(&self) -> bool {
        self.0 & Self::IC != 0
    }

    pub fn set_infinity_control(&mut self, on: bool) {
        self.set_field(12, 1, on as u16);
    }

    fn field(&self, shift: u16, width: u16) -> u16 {
        (self.0 >> shift) & ((1 << width) - 1)
    }

    fn set_field(&mut self, shift: u16, width: u16, value: u16) {
        let mask = ((1u16 << width) - 1) << shift;
        self.0 = (self.0 & !mask) | ((value << shift) & mask);
    }
}
