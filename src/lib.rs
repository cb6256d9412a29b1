pub mod bus;
pub mod control;
pub mod f80;
pub mod fpu;
pub mod instructions;
pub mod runner;
pub mod trace;

pub use bus::{Bus, FlatBus};
pub use control::{ControlWord, CpuArch, PrecisionControl, RoundMode};
pub use f80::{F80, Reg};
pub use fpu::{Fpu, FpuFlags, Tag};
