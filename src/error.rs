use crate::arm7tdmi::arm::ArmDecodeError;
use crate::arm7tdmi::thumb::ThumbDecodeError;
use crate::arm7tdmi::Addr;

/// Unified decode failure, tagged by the instruction set that rejected the bit pattern.
#[derive(Debug, PartialEq)]
pub enum DecodeError {
    Arm(ArmDecodeError),
    Thumb(ThumbDecodeError),
}

impl From<ArmDecodeError> for DecodeError {
    fn from(e: ArmDecodeError) -> DecodeError {
        DecodeError::Arm(e)
    }
}

impl From<ThumbDecodeError> for DecodeError {
    fn from(e: ThumbDecodeError) -> DecodeError {
        DecodeError::Thumb(e)
    }
}

#[derive(Debug, PartialEq)]
pub enum CpuError {
    DecodeError(DecodeError),
    IllegalInstruction(Addr, u32),
    UnimplementedSwi(u32),
}

impl From<DecodeError> for CpuError {
    fn from(e: DecodeError) -> CpuError {
        CpuError::DecodeError(e)
    }
}

impl std::fmt::Display for CpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuError::DecodeError(e) => write!(f, "decode error: {:?}", e),
            CpuError::IllegalInstruction(addr, insn) => {
                write!(f, "illegal instruction {:08x} at {:#x}", insn, addr)
            }
            CpuError::UnimplementedSwi(comment) => {
                write!(f, "unimplemented swi call {:#x}", comment)
            }
        }
    }
}

impl std::error::Error for CpuError {}

pub type CpuResult<T> = Result<T, CpuError>;
