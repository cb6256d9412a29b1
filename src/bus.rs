use crate::control::CpuArch;
use crate::f80::F80;

/// What the coprocessor needs from the machine around it: memory for the
/// effective-address forms, the CPU generation (control word masking), AX for
/// FNSTSW AX, and somewhere to report opcodes it does not implement.
///
/// Addresses are physical. Only the byte accessors are required; wider
/// accesses are composed little-endian.
pub trait Bus {
    fn read_8(&self, addr: usize) -> u8;
    fn write_8(&mut self, addr: usize, value: u8);

    fn read_16(&self, addr: usize) -> u16 {
        let low = self.read_8(addr) as u16;
        let high = self.read_8(addr.wrapping_add(1)) as u16;
        (high << 8) | low
    }

    fn read_32(&self, addr: usize) -> u32 {
        let low = self.read_16(addr) as u32;
        let high = self.read_16(addr.wrapping_add(2)) as u32;
        (high << 16) | low
    }

    fn read_64(&self, addr: usize) -> u64 {
        let low = self.read_32(addr) as u64;
        let high = self.read_32(addr.wrapping_add(4)) as u64;
        (high << 32) | low
    }

    fn write_16(&mut self, addr: usize, value: u16) {
        self.write_8(addr, (value & 0xFF) as u8);
        self.write_8(addr.wrapping_add(1), (value >> 8) as u8);
    }

    fn write_32(&mut self, addr: usize, value: u32) {
        self.write_16(addr, (value & 0xFFFF) as u16);
        self.write_16(addr.wrapping_add(2), (value >> 16) as u16);
    }

    fn write_64(&mut self, addr: usize, value: u64) {
        self.write_32(addr, (value & 0xFFFF_FFFF) as u32);
        self.write_32(addr.wrapping_add(4), (value >> 32) as u32);
    }

    fn read_f80(&self, addr: usize) -> F80 {
        let mut bytes = [0u8; 10];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.read_8(addr.wrapping_add(i));
        }
        F80::from_bytes(&bytes)
    }

    fn write_f80(&mut self, addr: usize, value: F80) {
        for (i, b) in value.get_bytes().iter().enumerate() {
            self.write_8(addr.wrapping_add(i), *b);
        }
    }

    fn arch(&self) -> CpuArch {
        CpuArch::I386
    }

    /// 32-bit operand size for the environment image (FNSTENV, FNSAVE...).
    fn big_operands(&self) -> bool {
        false
    }

    /// Receives the status word for FNSTSW AX.
    fn store_ax(&mut self, _value: u16) {}

    fn log_unhandled(&mut self, esc: u8, ea: bool, group: u8, sub: u8) {
        warn_unhandled(esc, ea, group, sub);
    }
}

pub fn warn_unhandled(esc: u8, ea: bool, group: u8, sub: u8) {
    log::warn!(
        "[FPU] ESC {}{}:Unhandled group {} subfunction {}",
        esc,
        if ea { " EA" } else { "" },
        group,
        sub
    );
}

/// One unimplemented-opcode report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unhandled {
    pub esc: u8,
    pub ea: bool,
    pub group: u8,
    pub sub: u8,
}

/// 1 MiB of real-mode memory plus the few CPU bits the coprocessor touches.
pub struct FlatBus {
    pub ram: Vec<u8>,
    pub ax: u16,
    pub arch: CpuArch,
    pub big_operands: bool,
    pub unhandled: Vec<Unhandled>,
}

impl Default for FlatBus {
    fn default() -> Self {
        Self::new(CpuArch::default())
    }
}

impl FlatBus {
    pub const RAM_SIZE: usize = 1024 * 1024;

    pub fn new(arch: CpuArch) -> Self {
        Self {
            ram: vec![0; Self::RAM_SIZE],
            ax: 0,
            arch,
            big_operands: false,
            unhandled: Vec::new(),
        }
    }

    pub fn with_big_operands(mut self, big: bool) -> Self {
        self.big_operands = big;
        self
    }

    pub fn load(&mut self, addr: usize, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.write_8(addr.wrapping_add(i), b);
        }
    }
}

impl Bus for FlatBus {
    fn read_8(&self, addr: usize) -> u8 {
        // Real-mode addresses wrap at 1 MiB
        self.ram[addr & (Self::RAM_SIZE - 1)]
    }

    fn write_8(&mut self, addr: usize, value: u8) {
        self.ram[addr & (Self::RAM_SIZE - 1)] = value;
    }

    fn arch(&self) -> CpuArch {
        self.arch
    }

    fn big_operands(&self) -> bool {
        self.big_operands
    }

    fn store_ax(&mut self, value: u16) {
        self.ax = value;
    }

    fn log_unhandled(&mut self, esc: u8, ea: bool, group: u8, sub: u8) {
        warn_unhandled(esc, ea, group, sub);
        self.unhandled.push(Unhandled { esc, ea, group, sub });
    }
}
