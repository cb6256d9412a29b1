use clap::{Parser, ValueEnum};
use log::LevelFilter;

use rust_x87::bus::FlatBus;
use rust_x87::control::CpuArch;
use rust_x87::fpu::{Fpu, Tag};
use rust_x87::{runner, trace};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Arch {
    #[value(name = "8086")]
    I8086,
    #[value(name = "286")]
    I286,
    #[value(name = "386")]
    I386,
    #[value(name = "486")]
    I486,
}

impl From<Arch> for CpuArch {
    fn from(a: Arch) -> Self {
        match a {
            Arch::I8086 => CpuArch::I8086,
            Arch::I286 => CpuArch::I286,
            Arch::I386 => CpuArch::I386,
            Arch::I486 => CpuArch::I486,
        }
    }
}

/// Runs 16-bit x87 machine code on an emulated coprocessor and dumps its state.
#[derive(Parser, Debug)]
#[command(name = "x87run", version, about)]
struct Args {
    /// Machine code as hex bytes, e.g. "D9E8 D9EB DEC1"
    code: String,

    /// CPU the coprocessor is paired with
    #[arg(long, value_enum, default_value_t = Arch::I386)]
    arch: Arch,

    /// Use the 32-bit environment layout for FNSTENV/FLDENV/FNSAVE/FRSTOR
    #[arg(long)]
    big: bool,

    /// Preload memory before running, ADDR=HEXBYTES (address in hex)
    #[arg(long = "load", value_name = "ADDR=HEX")]
    load: Vec<String>,

    /// Write the log to this file as well as stdout
    #[arg(long)]
    trace_file: Option<String>,

    /// Log every executed instruction
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), String> {
    let args = Args::parse();

    let level = if args.verbose { LevelFilter::Trace } else { LevelFilter::Warn };
    trace::init(args.trace_file.as_deref(), level)?;

    let code = runner::parse_hex(&args.code)?;
    let mut bus = FlatBus::new(args.arch.into()).with_big_operands(args.big);
    for preload in &args.load {
        let (addr, bytes) = runner::parse_load(preload)?;
        bus.load(addr, &bytes);
    }

    let mut fpu = Fpu::new();
    let executed = runner::run_code(&mut fpu, &mut bus, &code)?;
    log::logger().flush();

    println!("Executed {} instruction(s)", executed);
    for i in 0..8 {
        let tag = fpu.tag(i);
        if tag == Tag::Empty {
            continue;
        }
        let f = fpu.st_f80(i);
        println!(
            "ST({}) = {:<24e} [{:04X} {:016X}] {:?}",
            i,
            fpu.st_f64(i),
            f.sign_exp,
            f.mantissa,
            tag
        );
    }
    println!(
        "SW={:04X} CW={:04X} TW={:04X} TOP={} AX={:04X}",
        fpu.status(),
        fpu.cw.raw(),
        fpu.get_tag(),
        fpu.top(),
        bus.ax
    );
    if !bus.unhandled.is_empty() {
        println!("{} unhandled opcode(s)", bus.unhandled.len());
    }
    Ok(())
}
