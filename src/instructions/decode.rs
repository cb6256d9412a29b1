//! Opcode table for the eight escape groups.
//!
//! Every coprocessor instruction is `11011eee` followed by a ModRM byte. The
//! `reg` field (bits 3-5) is the group and, for the register form, the `rm`
//! field (bits 0-2) is either ST(i) or a sub-function. Both entry point
//! flavours funnel through [`decode`].

/// Memory operand formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemFormat {
    Real32,
    Real64,
    Real80,
    Int16,
    Int32,
    Int64,
    Bcd80,
}

/// Where an operand lives: ST(i) or memory at the resolved address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    St(u8),
    Mem(MemFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithKind {
    Add,
    Mul,
    Sub,
    SubR,
    Div,
    DivR,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    One,
    L2T,
    L2E,
    Pi,
    Lg2,
    Ln2,
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Register,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Arithmetic. `dest` is a logical register; the other operand is `src`.
    Arith { kind: ArithKind, dest: u8, src: Source, pop: bool },
    Chs,
    Abs,
    Sqrt,
    Rndint,
    Scale,
    Xtract,
    Prem,
    Prem1,
    F2xm1,
    Yl2x,
    Yl2xp1,

    // Comparison
    Compare { src: Source, pops: u8, unordered: bool },
    Tst,
    Xam,

    // Data transfer
    Load(Source),
    LoadConst(Constant),
    Store { dest: Source, pop: bool },
    Xch(u8),

    // Transcendental
    Sin,
    Cos,
    SinCos,
    Ptan,
    Patan,

    // Control
    Nop,
    Free { reg: u8, pop: bool },
    Decstp,
    Incstp,
    Init,
    Clex,
    Eni,
    Disi,
    Setpm,
    Ldcw,
    Stcw,
    Stsw,
    StswAx,
    Ldenv,
    Stenv,
    Rstor,
    Save,
}

pub fn group(rm: u8) -> u8 {
    (rm >> 3) & 7
}

pub fn sub(rm: u8) -> u8 {
    rm & 7
}

/// Looks up the operation for escape group `esc` (0-7, i.e. opcode D8+esc).
/// `None` marks a reserved or unimplemented encoding.
pub fn decode(esc: u8, form: Form, rm: u8) -> Option<Op> {
    match form {
        Form::Register => decode_register(esc, group(rm), sub(rm)),
        Form::Memory => decode_memory(esc, group(rm)),
    }
}

// Group order shared by D8, DA, DC and DE memory forms.
fn arith_group(g: u8) -> Option<ArithKind> {
    match g {
        0 => Some(ArithKind::Add),
        1 => Some(ArithKind::Mul),
        4 => Some(ArithKind::Sub),
        5 => Some(ArithKind::SubR),
        6 => Some(ArithKind::Div),
        7 => Some(ArithKind::DivR),
        _ => None,
    }
}

// DC and DE register forms encode the reverse variants in swapped slots:
// DC E0+i is FSUBR ST(i),ST and DC E8+i is FSUB ST(i),ST.
fn arith_group_to_sti(g: u8) -> Option<ArithKind> {
    match g {
        0 => Some(ArithKind::Add),
        1 => Some(ArithKind::Mul),
        4 => Some(ArithKind::SubR),
        5 => Some(ArithKind::Sub),
        6 => Some(ArithKind::DivR),
        7 => Some(ArithKind::Div),
        _ => None,
    }
}

/// Memory-form instructions of the shape `op ST(0), m` for one format.
fn memory_math(g: u8, fmt: MemFormat) -> Option<Op> {
    let src = Source::Mem(fmt);
    let op = match g {
        2 => Op::Compare { src, pops: 0, unordered: false },
        3 => Op::Compare { src, pops: 1, unordered: false },
        _ => Op::Arith { kind: arith_group(g)?, dest: 0, src, pop: false },
    };
    Some(op)
}

fn decode_memory(esc: u8, g: u8) -> Option<Op> {
    use MemFormat::*;
    let op = match esc {
        0 => memory_math(g, Real32)?,
        1 => match g {
            0 => Op::Load(Source::Mem(Real32)),
            2 => Op::Store { dest: Source::Mem(Real32), pop: false },
            3 => Op::Store { dest: Source::Mem(Real32), pop: true },
            4 => Op::Ldenv,
            5 => Op::Ldcw,
            6 => Op::Stenv,
            7 => Op::Stcw,
            _ => return None,
        },
        2 => memory_math(g, Int32)?,
        3 => match g {
            0 => Op::Load(Source::Mem(Int32)),
            2 => Op::Store { dest: Source::Mem(Int32), pop: false },
            3 => Op::Store { dest: Source::Mem(Int32), pop: true },
            5 => Op::Load(Source::Mem(Real80)),
            7 => Op::Store { dest: Source::Mem(Real80), pop: true },
            _ => return None,
        },
        4 => memory_math(g, Real64)?,
        5 => match g {
            0 => Op::Load(Source::Mem(Real64)),
            2 => Op::Store { dest: Source::Mem(Real64), pop: false },
            3 => Op::Store { dest: Source::Mem(Real64), pop: true },
            4 => Op::Rstor,
            6 => Op::Save,
            7 => Op::Stsw,
            _ => return None,
        },
        6 => memory_math(g, Int16)?,
        7 => match g {
            0 => Op::Load(Source::Mem(Int16)),
            2 => Op::Store { dest: Source::Mem(Int16), pop: false },
            3 => Op::Store { dest: Source::Mem(Int16), pop: true },
            4 => Op::Load(Source::Mem(Bcd80)),
            5 => Op::Load(Source::Mem(Int64)),
            6 => Op::Store { dest: Source::Mem(Bcd80), pop: true },
            7 => Op::Store { dest: Source::Mem(Int64), pop: true },
            _ => return None,
        },
        _ => return None,
    };
    Some(op)
}

fn decode_register(esc: u8, g: u8, s: u8) -> Option<Op> {
    let sti = Source::St(s);
    let op = match esc {
        // D8: ST(0) <- ST(0) op ST(i)
        0 => match g {
            2 => Op::Compare { src: sti, pops: 0, unordered: false },
            3 => Op::Compare { src: sti, pops: 1, unordered: false },
            _ => Op::Arith { kind: arith_group(g)?, dest: 0, src: sti, pop: false },
        },
        1 => match (g, s) {
            (0, _) => Op::Load(sti),
            (1, _) => Op::Xch(s),
            (2, 0) => Op::Nop,
            // Undocumented alias of DD D8+i
            (3, _) => Op::Store { dest: sti, pop: true },
            (4, 0) => Op::Chs,
            (4, 1) => Op::Abs,
            (4, 4) => Op::Tst,
            (4, 5) => Op::Xam,
            (5, 0) => Op::LoadConst(Constant::One),
            (5, 1) => Op::LoadConst(Constant::L2T),
            (5, 2) => Op::LoadConst(Constant::L2E),
            (5, 3) => Op::LoadConst(Constant::Pi),
            (5, 4) => Op::LoadConst(Constant::Lg2),
            (5, 5) => Op::LoadConst(Constant::Ln2),
            (5, 6) => Op::LoadConst(Constant::Zero),
            (6, 0) => Op::F2xm1,
            (6, 1) => Op::Yl2x,
            (6, 2) => Op::Ptan,
            (6, 3) => Op::Patan,
            (6, 4) => Op::Xtract,
            (6, 5) => Op::Prem1,
            (6, 6) => Op::Decstp,
            (6, 7) => Op::Incstp,
            (7, 0) => Op::Prem,
            (7, 1) => Op::Yl2xp1,
            (7, 2) => Op::Sqrt,
            (7, 3) => Op::SinCos,
            (7, 4) => Op::Rndint,
            (7, 5) => Op::Scale,
            (7, 6) => Op::Sin,
            (7, 7) => Op::Cos,
            _ => return None,
        },
        // DA C0-DF are the P6 FCMOVcc forms, which need EFLAGS
        2 => match (g, s) {
            (5, 1) => Op::Compare { src: Source::St(1), pops: 2, unordered: true },
            _ => return None,
        },
        3 => match (g, s) {
            (4, 0) => Op::Eni,
            (4, 1) => Op::Disi,
            (4, 2) => Op::Clex,
            (4, 3) => Op::Init,
            (4, 4) => Op::Setpm,
            _ => return None,
        },
        // DC: ST(i) <- ST(i) op ST(0)
        4 => match g {
            2 => Op::Compare { src: sti, pops: 0, unordered: false },
            3 => Op::Compare { src: sti, pops: 1, unordered: false },
            _ => Op::Arith { kind: arith_group_to_sti(g)?, dest: s, src: Source::St(0), pop: false },
        },
        5 => match g {
            0 => Op::Free { reg: s, pop: false },
            1 => Op::Xch(s),
            2 => Op::Store { dest: sti, pop: false },
            3 => Op::Store { dest: sti, pop: true },
            4 => Op::Compare { src: sti, pops: 0, unordered: true },
            5 => Op::Compare { src: sti, pops: 1, unordered: true },
            _ => return None,
        },
        6 => match (g, s) {
            (2, _) => Op::Compare { src: sti, pops: 1, unordered: false },
            (3, 1) => Op::Compare { src: Source::St(1), pops: 2, unordered: false },
            (3, _) => return None,
            _ => Op::Arith { kind: arith_group_to_sti(g)?, dest: s, src: Source::St(0), pop: true },
        },
        7 => match (g, s) {
            (0, _) => Op::Free { reg: s, pop: true },
            (1, _) => Op::Xch(s),
            (2, _) | (3, _) => Op::Store { dest: sti, pop: true },
            (4, 0) => Op::StswAx,
            _ => return None,
        },
        _ => return None,
    };
    Some(op)
}
