use bitflags::bitflags;

use crate::control::{ControlWord, RoundMode};
use crate::f80::{F80, Reg};

bitflags! {
    /// Status word bits other than TOP.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FpuFlags: u16 {
        // Condition Codes
        const C0 = 0x0100;
        const C1 = 0x0200;
        const C2 = 0x0400; // Bit 10
        const C3 = 0x4000; // Bit 14

        // Exception Flags (Bits 0-5)
        const IE = 0x0001; // Invalid Operation
        const DE = 0x0002; // Denormalized Operand
        const ZE = 0x0004; // Zero Divide
        const OE = 0x0008; // Overflow
        const UE = 0x0010; // Underflow
        const PE = 0x0020; // Precision

        // Status Bits
        const SF = 0x0040; // Stack Fault
        const ES = 0x0080; // Error Summary Status
        const B  = 0x8000; // Busy bit

        const CONDITION = Self::C0.bits() | Self::C1.bits() | Self::C2.bits() | Self::C3.bits();

        const STICKY = Self::IE.bits() | Self::DE.bits() | Self::ZE.bits() |
                       Self::OE.bits() | Self::UE.bits() | Self::PE.bits();

        // A helper group for FNCLEX
        const EXCEPTIONS = Self::STICKY.bits() | Self::SF.bits() | Self::ES.bits() | Self::B.bits();
    }
}

const TOP_MASK: u16 = 0x3800;
const TOP_SHIFT: u16 = 11;

/// Tag word values, 2 bits per physical register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Valid = 0,
    Zero = 1,
    Special = 2,
    Empty = 3,
}

impl Tag {
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0x03 {
            0 => Tag::Valid,
            1 => Tag::Zero,
            2 => Tag::Special,
            _ => Tag::Empty,
        }
    }

    /// Tag a value would receive when written to a register.
    pub fn classify(reg: &Reg) -> Self {
        match reg {
            Reg::Native(v) => {
                if *v == 0.0 {
                    Tag::Zero
                } else if v.is_nan() || v.is_infinite() {
                    Tag::Special
                } else {
                    Tag::Valid
                }
            }
            Reg::Extended(f) => {
                if f.is_zero() {
                    Tag::Zero
                } else if f.get_exponent() == 0x7FFF || f.is_denormal() || f.is_unsupported() {
                    Tag::Special
                } else {
                    Tag::Valid
                }
            }
        }
    }
}

/// Complete coprocessor state. One instance per emulated coprocessor.
#[derive(Debug, Clone)]
pub struct Fpu {
    /// Physical registers, indexed 0-7 independent of TOP.
    pub regs: [Reg; 8],
    pub tags: [Tag; 8],
    pub cw: ControlWord,
    sw: u16,
}

impl Default for Fpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Fpu {
    pub fn new() -> Self {
        Self {
            regs: [Reg::default(); 8],
            tags: [Tag::Empty; 8],
            cw: ControlWord::new(),
            sw: 0,
        }
    }

    /// FNINIT: control word to 0x037F, status cleared, every tag empty.
    /// Register contents are left as they are.
    pub fn reset(&mut self) {
        self.cw.init();
        self.sw = 0;
        self.tags = [Tag::Empty; 8];
    }

    // ============== Status Word =================

    pub fn status(&self) -> u16 {
        self.sw
    }

    pub fn set_status(&mut self, sw: u16) {
        self.sw = sw;
    }

    pub fn top(&self) -> usize {
        ((self.sw & TOP_MASK) >> TOP_SHIFT) as usize
    }

    pub fn set_top(&mut self, val: usize) {
        self.sw = (self.sw & !TOP_MASK) | (((val & 7) as u16) << TOP_SHIFT);
    }

    pub fn get_fpu_flags(&self) -> FpuFlags {
        FpuFlags::from_bits_truncate(self.sw & !TOP_MASK)
    }

    pub fn get_fpu_flag(&self, flag: FpuFlags) -> bool {
        self.get_fpu_flags().contains(flag)
    }

    pub fn set_fpu_flag(&mut self, flag: FpuFlags, value: bool) {
        if value {
            self.sw |= flag.bits();
        } else {
            self.sw &= !flag.bits();
        }
    }

    pub fn set_c0(&mut self, c: bool) {
        self.set_fpu_flag(FpuFlags::C0, c);
    }

    pub fn set_c1(&mut self, c: bool) {
        self.set_fpu_flag(FpuFlags::C1, c);
    }

    pub fn set_c2(&mut self, c: bool) {
        self.set_fpu_flag(FpuFlags::C2, c);
    }

    pub fn set_c3(&mut self, c: bool) {
        self.set_fpu_flag(FpuFlags::C3, c);
    }

    /// Denormal operand flag.
    pub fn set_d(&mut self, c: bool) {
        self.set_fpu_flag(FpuFlags::DE, c);
    }

    pub fn set_busy(&mut self, c: bool) {
        self.set_fpu_flag(FpuFlags::B, c);
    }

    pub fn set_stack_fault(&mut self, c: bool) {
        self.set_fpu_flag(FpuFlags::SF, c);
    }

    // ============== Exceptions =================

    /// Records exception conditions. The sticky bits are set whether or not
    /// the condition is masked; an unmasked one also raises the error summary
    /// so the host CPU can decide to deliver a fault.
    pub fn raise(&mut self, flags: FpuFlags) {
        let flags = flags & FpuFlags::STICKY;
        if flags.is_empty() {
            return;
        }
        self.set_fpu_flag(flags, true);
        if !self.cw.is_masked(flags) {
            self.set_fpu_flag(FpuFlags::ES | FpuFlags::B, true);
        }
    }

    /// Recomputes ES/B after the control word or the sticky bits were replaced
    /// wholesale (FLDCW, FLDENV, FRSTOR).
    pub fn update_error_summary(&mut self) {
        let sticky = self.get_fpu_flags() & FpuFlags::STICKY;
        let pending = !sticky.is_empty() && !self.cw.is_masked(sticky);
        self.set_fpu_flag(FpuFlags::ES | FpuFlags::B, pending);
    }

    pub fn unmasked_pending(&self) -> bool {
        self.get_fpu_flag(FpuFlags::ES)
    }

    pub fn rounding(&self) -> RoundMode {
        self.cw.rounding()
    }

    pub fn stack_underflow(&mut self) {
        self.raise(FpuFlags::IE);
        self.set_stack_fault(true);
        self.set_c1(false);
    }

    pub fn stack_overflow(&mut self) {
        self.raise(FpuFlags::IE);
        self.set_stack_fault(true);
        self.set_c1(true);
    }

    // ============== Tag Word =================

    pub fn get_tag(&self) -> u16 {
        let mut tag_word = 0u16;
        for (i, tag) in self.tags.iter().enumerate() {
            tag_word |= (*tag as u16) << (i * 2);
        }
        tag_word
    }

    pub fn set_tag(&mut self, tag_word: u16) {
        for i in 0..8 {
            self.tags[i] = Tag::from_bits(tag_word >> (i * 2));
        }
    }

    // ============== Stack Operations =================

    // Get physical index for ST(i)
    pub fn phys(&self, i: usize) -> usize {
        (self.top() + i) & 7
    }

    pub fn tag(&self, i: usize) -> Tag {
        self.tags[self.phys(i)]
    }

    pub fn is_empty(&self, i: usize) -> bool {
        self.tag(i) == Tag::Empty
    }

    /// Raw read of ST(i) without any fault checking.
    pub fn peek(&self, i: usize) -> Reg {
        self.regs[self.phys(i)]
    }

    /// Operand read of ST(i). An empty register is a stack underflow and
    /// reads as the real indefinite.
    pub fn fetch(&mut self, i: usize) -> Reg {
        if self.is_empty(i) {
            self.stack_underflow();
            return Reg::indefinite();
        }
        self.peek(i)
    }

    // Set ST(i) relative to Top and re-tag it
    pub fn set(&mut self, i: usize, val: Reg) {
        let idx = self.phys(i);
        self.regs[idx] = val;
        self.tags[idx] = Tag::classify(&val);
    }

    /// Push onto the stack. Pushing into a register that is still in use is a
    /// stack overflow: TOP still moves and the slot receives the indefinite.
    pub fn push(&mut self, val: Reg) {
        let idx = (self.top().wrapping_sub(1)) & 7;
        self.set_top(idx);
        if self.tags[idx] != Tag::Empty {
            self.stack_overflow();
            self.regs[idx] = Reg::indefinite();
            self.tags[idx] = Tag::Special;
            return;
        }
        self.regs[idx] = val;
        self.tags[idx] = Tag::classify(&val);
    }

    // Pop value from FPU Stack
    pub fn pop(&mut self) -> Reg {
        let idx = self.top();
        let val = self.regs[idx];
        // Mark current top as EMPTY before moving on
        self.tags[idx] = Tag::Empty;
        self.set_top(idx + 1);
        val
    }

    pub fn free(&mut self, i: usize) {
        let idx = self.phys(i);
        self.tags[idx] = Tag::Empty;
    }

    /// Convenience for hosts and tests: push a host double.
    pub fn push_f64(&mut self, v: f64) {
        self.push(Reg::Native(v));
    }

    /// Convenience for hosts and tests: ST(i) as a host double.
    pub fn st_f64(&self, i: usize) -> f64 {
        self.peek(i).value()
    }

    pub fn st_f80(&self, i: usize) -> F80 {
        self.peek(i).to_f80()
    }
}
