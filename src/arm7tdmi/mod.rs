use std::fmt;

use num::Num;
use serde::{Deserialize, Serialize};

pub mod arm;
pub mod thumb;

use arm::ArmInstruction;
use thumb::ThumbInstruction;

pub mod cpu;
pub use cpu::*;
pub mod alu;
pub mod memory;
pub use alu::*;
pub mod exception;
pub mod psr;
pub use psr::*;

/// Bit positions of fields shared by several THUMB instruction formats.
pub mod consts {
    pub mod flags {
        /// Format 5: selects whether Rd/Hd indexes r0-7 or r8-15.
        pub const FLAG_H1: usize = 7;
        /// Format 5: selects whether Rs/Hs indexes r0-7 or r8-15.
        pub const FLAG_H2: usize = 6;
        /// Format 8: sign-extend the loaded value.
        pub const FLAG_SIGN_EXTEND: usize = 11;
        /// Format 8: transfer a halfword rather than a byte.
        pub const FLAG_HALFWORD: usize = 10;
        /// Format 12: base register is SP rather than PC.
        pub const FLAG_SP: usize = 11;
        /// Format 14: also transfer LR (push) or PC (pop).
        pub const FLAG_R: usize = 8;
        /// Format 19: this halfword carries the low 11 bits of the offset.
        pub const FLAG_LOW_OFFSET: usize = 11;
    }
}

pub const REG_PC: usize = 15;
pub const REG_LR: usize = 14;
pub const REG_SP: usize = 13;

pub type Addr = u32;

/// Either a decoded ARM or THUMB instruction, tagged with the word it came from.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub enum DecodedInstruction {
    Arm(ArmInstruction),
    Thumb(ThumbInstruction),
}

impl DecodedInstruction {
    pub fn get_pc(&self) -> Addr {
        match self {
            DecodedInstruction::Arm(a) => a.pc,
            DecodedInstruction::Thumb(t) => t.pc,
        }
    }

    pub fn is_arm(&self) -> bool {
        matches!(self, DecodedInstruction::Arm(_))
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedInstruction::Arm(a) => write!(f, "{}", a),
            DecodedInstruction::Thumb(t) => write!(f, "{}", t),
        }
    }
}

/// Pure decode: same bit pattern in, same tagged record out. Implementors
/// MUST return an error variant rather than panic when no decode pattern
/// matches -- see `arm::ArmDecodeError` and `thumb::ThumbDecodeError`.
pub trait InstructionDecoder: Sized {
    type IntType: Num;
    type Error;

    fn decode(n: Self::IntType, addr: Addr) -> Result<Self, Self::Error>;
    fn decode_from_bytes(bytes: &[u8], addr: Addr) -> Result<Self, Self::Error>;
    fn get_raw(&self) -> Self::IntType;
}

pub fn reg_string(reg: usize) -> &'static str {
    let reg_names = &[
        "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "fp", "ip", "sp", "lr",
        "pc",
    ];
    reg_names[reg]
}

#[derive(Debug, PartialEq, Primitive, Copy, Clone, Serialize, Deserialize)]
#[repr(u8)]
pub enum CpuState {
    ARM = 0,
    THUMB = 1,
}

impl fmt::Display for CpuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CpuState::*;
        match self {
            ARM => write!(f, "ARM"),
            THUMB => write!(f, "THUMB"),
        }
    }
}

/// The seven ARM7TDMI privilege modes, with their raw CPSR mode-field encoding.
#[derive(Debug, Primitive, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum CpuMode {
    User = 0b10000,
    Fiq = 0b10001,
    Irq = 0b10010,
    Supervisor = 0b10011,
    Abort = 0b10111,
    Undefined = 0b11011,
    System = 0b11111,
}

impl CpuMode {
    /// Index into the 5-entry SPSR bank, or `None` for modes that alias SPSR to CPSR.
    pub fn spsr_index(&self) -> Option<usize> {
        match self {
            CpuMode::Fiq => Some(0),
            CpuMode::Irq => Some(1),
            CpuMode::Supervisor => Some(2),
            CpuMode::Abort => Some(3),
            CpuMode::Undefined => Some(4),
            _ => None,
        }
    }

    /// Index into the r13/r14 banks. User and System share bank 0.
    pub fn bank_index(&self) -> usize {
        match self {
            CpuMode::User | CpuMode::System => 0,
            CpuMode::Fiq => 1,
            CpuMode::Irq => 2,
            CpuMode::Supervisor => 3,
            CpuMode::Abort => 4,
            CpuMode::Undefined => 5,
        }
    }
}

impl fmt::Display for CpuMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CpuMode::*;
        match self {
            User => write!(f, "USR"),
            Fiq => write!(f, "FIQ"),
            Irq => write!(f, "IRQ"),
            Supervisor => write!(f, "SVC"),
            Abort => write!(f, "ABT"),
            Undefined => write!(f, "UND"),
            System => write!(f, "SYS"),
        }
    }
}
