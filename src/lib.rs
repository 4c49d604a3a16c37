//! ARM7TDMI processor core: ARM+THUMB interpreter with BIOS HLE, generic
//! over a host-supplied bus.

#[macro_use]
extern crate enum_primitive_derive;
#[macro_use]
extern crate bitfield;

// Re-exported so submodules can address dependencies as `crate::bit`,
// `crate::num`, `crate::byteorder` regardless of nesting depth.
pub use bit;
pub use byteorder;
pub use num;

pub mod arm7tdmi;
pub mod error;
pub mod interrupt;
mod swi;

pub use error::{CpuError, CpuResult, DecodeError};
pub use interrupt::{Interrupt, InterruptConnect, InterruptController, SharedInterruptFlags};

pub mod prelude {
    pub use crate::arm7tdmi;
    pub use crate::arm7tdmi::memory::{MemoryAccess, MemoryInterface};
    pub use crate::arm7tdmi::Core;
    pub use crate::error::{CpuError, CpuResult};
    pub use crate::interrupt::{Interrupt, InterruptConnect, InterruptController, SharedInterruptFlags};
}
