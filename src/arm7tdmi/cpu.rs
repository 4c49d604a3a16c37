use std::fmt;

use serde::{Deserialize, Serialize};

pub use super::exception::Exception;

use super::arm::{ArmCond, ArmFormat};
use super::thumb::ThumbFormat;
#[cfg(feature = "trace_opcodes")]
use super::arm::ArmInstruction;
#[cfg(feature = "trace_opcodes")]
use super::thumb::ThumbInstruction;
use super::{psr::RegPSR, reg_string, Addr, CpuMode, CpuState, InstructionDecoder};

use super::memory::{MemoryAccess, MemoryInterface};
use MemoryAccess::*;

use bit::BitIndex;
use num::FromPrimitive;

/// What a handler did to the pipeline, so `step` knows whether to merely
/// advance PC or to refetch both pipeline slots from scratch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CpuAction {
    AdvancePC(MemoryAccess),
    PipelineFlushed,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub(super) struct BankedRegisters {
    // r13 and r14 are banked for all modes. System & User mode share them.
    pub(super) gpr_banked_r13: [u32; 6],
    pub(super) gpr_banked_r14: [u32; 6],
    // r8-r12 are banked for fiq mode only.
    pub(super) gpr_banked_old_r8_12: [u32; 5],
    pub(super) gpr_banked_fiq_r8_12: [u32; 5],
    pub(super) spsr_bank: [RegPSR; 6],
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SavedCpuState {
    pub pc: u32,
    pub gpr: [u32; 15],
    next_fetch_access: MemoryAccess,
    pipeline: [u32; 2],

    pub cpsr: RegPSR,
    pub(super) spsr: RegPSR,

    pub(super) banks: BankedRegisters,
}

/// The ARM7TDMI register file, pipeline and mode-banked state, generic over
/// the bus it executes against.
#[derive(Clone, Debug)]
pub struct Core<I: MemoryInterface> {
    pub pc: u32,
    pub bus: I,

    next_fetch_access: MemoryAccess,
    pipeline: [u32; 2],
    pub gpr: [u32; 15],

    pub cpsr: RegPSR,
    pub(super) spsr: RegPSR,

    pub(super) banks: BankedRegisters,

    /// Set by SWI Halt/IntrWait; cleared by the host once `IE & IF != 0`.
    pub halt_cpu: bool,
    /// IE-register snapshot an SWI Halt/IntrWait is waiting on.
    pub halt_condition: u16,
}

impl<I: MemoryInterface> Core<I> {
    pub fn new(bus: I) -> Core<I> {
        Core {
            bus,
            pc: 0,
            gpr: [0; 15],
            pipeline: [0; 2],
            next_fetch_access: MemoryAccess::NonSeq,
            cpsr: RegPSR::new(0x0000_00D3),
            spsr: Default::default(),
            banks: BankedRegisters::default(),
            halt_cpu: false,
            halt_condition: 0,
        }
    }

    pub fn from_saved_state(bus: I, state: SavedCpuState) -> Core<I> {
        Core {
            bus,
            pc: state.pc,
            cpsr: state.cpsr,
            gpr: state.gpr,
            banks: state.banks,
            spsr: state.spsr,
            pipeline: state.pipeline,
            next_fetch_access: state.next_fetch_access,
            halt_cpu: false,
            halt_condition: 0,
        }
    }

    pub fn save_state(&self) -> SavedCpuState {
        SavedCpuState {
            cpsr: self.cpsr,
            pc: self.pc,
            gpr: self.gpr,
            spsr: self.spsr,
            banks: self.banks.clone(),
            pipeline: self.pipeline,
            next_fetch_access: self.next_fetch_access,
        }
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halt_cpu
    }

    /// Called by the host once `IE & IF != 0` observed against `halt_condition`.
    #[inline]
    pub fn resume(&mut self) {
        self.halt_cpu = false;
    }

    pub fn restore_state(&mut self, state: SavedCpuState) {
        self.pc = state.pc;
        self.cpsr = state.cpsr;
        self.gpr = state.gpr;
        self.spsr = state.spsr;
        self.banks = state.banks;
        self.pipeline = state.pipeline;
        self.next_fetch_access = state.next_fetch_access;
    }

    /// Serializes the saved state to a flat byte buffer a host can persist as a savestate.
    pub fn save_state_to_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(&self.save_state())
    }

    /// Inverse of `save_state_to_bytes`.
    pub fn restore_state_from_bytes(&mut self, bytes: &[u8]) -> bincode::Result<()> {
        let decoded: Box<SavedCpuState> = bincode::deserialize_from(bytes)?;
        self.restore_state(*decoded);
        Ok(())
    }

    pub fn get_reg(&self, r: usize) -> u32 {
        match r {
            0..=14 => self.gpr[r],
            15 => self.pc,
            _ => panic!("invalid register {}", r),
        }
    }

    #[inline]
    /// PC of the currently executed instruction in arm mode (pipeline holds pc+8).
    pub fn pc_arm(&self) -> u32 {
        self.pc.wrapping_sub(8)
    }

    #[inline]
    /// PC of the currently executed instruction in thumb mode (pipeline holds pc+4).
    pub fn pc_thumb(&self) -> u32 {
        self.pc.wrapping_sub(4)
    }

    pub fn get_reg_user(&mut self, r: usize) -> u32 {
        match r {
            0..=7 => self.gpr[r],
            8..=12 => {
                if self.cpsr.mode() == CpuMode::Fiq {
                    self.gpr[r]
                } else {
                    self.banks.gpr_banked_old_r8_12[r - 8]
                }
            }
            13 => self.banks.gpr_banked_r13[0],
            14 => self.banks.gpr_banked_r14[0],
            _ => panic!("invalid register"),
        }
    }

    pub fn set_reg(&mut self, r: usize, val: u32) {
        match r {
            0..=14 => self.gpr[r] = val,
            15 => {
                self.pc = match self.cpsr.state() {
                    CpuState::THUMB => val & !1,
                    CpuState::ARM => val & !3,
                }
            }
            _ => panic!("invalid register"),
        }
    }

    pub fn set_reg_user(&mut self, r: usize, val: u32) {
        match r {
            0..=7 => self.gpr[r] = val,
            8..=12 => {
                if self.cpsr.mode() == CpuMode::Fiq {
                    self.gpr[r] = val;
                } else {
                    self.banks.gpr_banked_old_r8_12[r - 8] = val;
                }
            }
            13 => self.banks.gpr_banked_r13[0] = val,
            14 => self.banks.gpr_banked_r14[0] = val,
            _ => panic!("invalid register"),
        }
    }

    pub fn get_registers(&self) -> [u32; 15] {
        self.gpr
    }

    /// Swaps the r13/r14/SPSR bank and (for FIQ) the r8-r12 bank between
    /// `old_mode` and `new_mode`. A no-op when both modes share a bank.
    pub(super) fn change_mode(&mut self, old_mode: CpuMode, new_mode: CpuMode) {
        let new_index = new_mode.bank_index();
        let old_index = old_mode.bank_index();

        if new_index == old_index {
            return;
        }

        let banks = &mut self.banks;

        banks.spsr_bank[old_index] = self.spsr;
        banks.gpr_banked_r13[old_index] = self.gpr[13];
        banks.gpr_banked_r14[old_index] = self.gpr[14];

        self.spsr = banks.spsr_bank[new_index];
        self.gpr[13] = banks.gpr_banked_r13[new_index];
        self.gpr[14] = banks.gpr_banked_r14[new_index];

        if new_mode == CpuMode::Fiq {
            for r in 0..5 {
                banks.gpr_banked_old_r8_12[r] = self.gpr[r + 8];
                self.gpr[r + 8] = banks.gpr_banked_fiq_r8_12[r];
            }
        } else if old_mode == CpuMode::Fiq {
            for r in 0..5 {
                banks.gpr_banked_fiq_r8_12[r] = self.gpr[r + 8];
                self.gpr[r + 8] = banks.gpr_banked_old_r8_12[r];
            }
        }
        self.cpsr.set_mode(new_mode);
    }

    /// Resets the cpu: jumps through the reset exception vector.
    pub fn reset(&mut self) {
        self.exception(Exception::Reset, 0);
    }

    pub fn word_size(&self) -> usize {
        match self.cpsr.state() {
            CpuState::ARM => 4,
            CpuState::THUMB => 2,
        }
    }

    pub(super) fn get_required_multipiler_array_cycles(&self, rs: u32) -> usize {
        if rs & 0xff == rs {
            1
        } else if rs & 0xffff == rs {
            2
        } else if rs & 0xffffff == rs {
            3
        } else {
            4
        }
    }

    #[inline(always)]
    pub(super) fn check_arm_cond(&self, cond: ArmCond) -> bool {
        use ArmCond::*;
        match cond {
            Invalid => {
                log::warn!("bad condition code decoded, treating as never-taken");
                false
            }
            EQ => self.cpsr.Z(),
            NE => !self.cpsr.Z(),
            HS => self.cpsr.C(),
            LO => !self.cpsr.C(),
            MI => self.cpsr.N(),
            PL => !self.cpsr.N(),
            VS => self.cpsr.V(),
            VC => !self.cpsr.V(),
            HI => self.cpsr.C() && !self.cpsr.Z(),
            LS => !self.cpsr.C() || self.cpsr.Z(),
            GE => self.cpsr.N() == self.cpsr.V(),
            LT => self.cpsr.N() != self.cpsr.V(),
            GT => !self.cpsr.Z() && (self.cpsr.N() == self.cpsr.V()),
            LE => self.cpsr.Z() || (self.cpsr.N() != self.cpsr.V()),
            AL => true,
        }
    }

    fn step_arm_exec(&mut self, insn: u32) -> CpuAction {
        let fmt = ArmFormat::from(insn);
        #[cfg(feature = "trace_opcodes")]
        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "{:08x}: {}",
                self.pc_arm(),
                ArmInstruction::new(insn, self.pc_arm(), fmt)
            );
        }
        self.exec_arm(insn, fmt)
    }

    fn step_thumb_exec(&mut self, insn: u16) -> CpuAction {
        let fmt = ThumbFormat::from(insn);
        #[cfg(feature = "trace_opcodes")]
        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "{:08x}: {}",
                self.pc_thumb(),
                ThumbInstruction::new(insn, self.pc_thumb(), fmt)
            );
        }
        self.exec_thumb(insn, fmt)
    }

    /// 2S + 1N
    #[inline(always)]
    pub fn reload_pipeline16(&mut self) {
        self.pipeline[0] = self.load_16(self.pc, NonSeq) as u32;
        self.advance_thumb();
        self.pipeline[1] = self.load_16(self.pc, Seq) as u32;
        self.advance_thumb();
        self.next_fetch_access = Seq;
    }

    /// 2S + 1N
    #[inline(always)]
    pub fn reload_pipeline32(&mut self) {
        self.pipeline[0] = self.load_32(self.pc, NonSeq);
        self.advance_arm();
        self.pipeline[1] = self.load_32(self.pc, Seq);
        self.advance_arm();
        self.next_fetch_access = Seq;
    }

    #[inline]
    pub(super) fn advance_thumb(&mut self) {
        self.pc = self.pc.wrapping_add(2)
    }

    #[inline]
    pub(super) fn advance_arm(&mut self) {
        self.pc = self.pc.wrapping_add(4)
    }

    #[inline]
    pub fn get_decoded_opcode(&self) -> u32 {
        self.pipeline[0]
    }

    #[inline]
    pub fn get_prefetched_opcode(&self) -> u32 {
        self.pipeline[1]
    }

    /// Advances the pipeline by one stage: fetch, promote, decode+execute.
    /// Conditionally-false ARM instructions are fetched and promoted like
    /// any other but never reach a handler.
    #[inline]
    pub fn step(&mut self) {
        match self.cpsr.state() {
            CpuState::ARM => {
                let pc = self.pc & !3;

                let fetched_now = self.load_32(pc, self.next_fetch_access);
                let insn = self.pipeline[0];
                self.pipeline[0] = self.pipeline[1];
                self.pipeline[1] = fetched_now;
                let cond = ArmCond::from_u8(insn.bit_range(28..32) as u8)
                    .unwrap_or(ArmCond::Invalid);
                if cond != ArmCond::AL && !self.check_arm_cond(cond) {
                    self.advance_arm();
                    self.next_fetch_access = MemoryAccess::NonSeq;
                    return;
                }
                match self.step_arm_exec(insn) {
                    CpuAction::AdvancePC(access) => {
                        self.next_fetch_access = access;
                        self.advance_arm();
                    }
                    CpuAction::PipelineFlushed => {}
                }
            }
            CpuState::THUMB => {
                let pc = self.pc & !1;

                let fetched_now = self.load_16(pc, self.next_fetch_access);
                let insn = self.pipeline[0];
                self.pipeline[0] = self.pipeline[1];
                self.pipeline[1] = fetched_now as u32;
                match self.step_thumb_exec(insn as u16) {
                    CpuAction::AdvancePC(access) => {
                        self.advance_thumb();
                        self.next_fetch_access = access;
                    }
                    CpuAction::PipelineFlushed => {}
                }
            }
        }
    }

    /// Address of the next instruction to be executed (pipeline's decode slot).
    pub fn get_next_pc(&self) -> Addr {
        let insn_size = self.word_size() as u32;
        self.pc - 2 * insn_size
    }

    pub fn get_cpu_state(&self) -> CpuState {
        self.cpsr.state()
    }

    /// Seeds register/mode state as if the BIOS boot sequence already ran,
    /// and points PC at the cartridge entry point. Used by hosts that don't
    /// ship a BIOS image.
    pub fn skip_bios(&mut self) {
        self.banks.gpr_banked_r13[0] = 0x0300_7f00; // USR/SYS
        self.banks.gpr_banked_r13[1] = 0x0300_7f00; // FIQ
        self.banks.gpr_banked_r13[2] = 0x0300_7fa0; // IRQ
        self.banks.gpr_banked_r13[3] = 0x0300_7fe0; // SVC
        self.banks.gpr_banked_r13[4] = 0x0300_7f00; // ABT
        self.banks.gpr_banked_r13[5] = 0x0300_7f00; // UND

        self.gpr[13] = 0x0300_7f00;
        self.pc = 0x0800_0000;

        self.cpsr.set(0x5f);
        self.reload_pipeline32();
    }
}

impl<I: MemoryInterface> fmt::Display for Core<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ARM7TDMI Core Status:")?;
        writeln!(f, "\tCPSR: {}", self.cpsr)?;
        writeln!(f, "\tGeneral Purpose Registers:")?;
        let gpr = self.get_registers();
        for i in 0..15 {
            let mut reg_name = reg_string(i).to_string();
            reg_name.make_ascii_uppercase();
            write!(f, "\t{:-3} = 0x{:08x}", reg_name, gpr[i])?;
            if (i + 1) % 4 == 0 {
                writeln!(f)?;
            }
        }
        writeln!(f, "\tPC  = 0x{:08x}", self.get_next_pc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm7tdmi::memory::MemoryAccess;

    struct NullMem;

    impl MemoryInterface for NullMem {
        fn load_8(&mut self, _addr: u32, _access: MemoryAccess) -> u8 {
            0
        }
        fn load_16(&mut self, _addr: u32, _access: MemoryAccess) -> u16 {
            0
        }
        fn load_32(&mut self, _addr: u32, _access: MemoryAccess) -> u32 {
            0
        }
        fn store_8(&mut self, _addr: u32, _value: u8, _access: MemoryAccess) {}
        fn store_16(&mut self, _addr: u32, _value: u16, _access: MemoryAccess) {}
        fn store_32(&mut self, _addr: u32, _value: u32, _access: MemoryAccess) {}
        fn idle_cycle(&mut self) {}
    }

    fn core() -> Core<NullMem> {
        Core::new(NullMem)
    }

    #[test]
    fn condition_truth_table_matches_arm_reference() {
        use ArmCond::*;

        // (N, Z, C, V) -> set of conditions that must hold
        let cases: &[(bool, bool, bool, bool, &[ArmCond])] = &[
            (false, true, false, false, &[EQ, PL, VC, GE, LE, LS, AL]),
            (false, false, false, false, &[NE, PL, VC, GE, GT, LO, AL]),
            (false, false, true, false, &[NE, PL, VC, GE, GT, HS, HI, AL]),
            (true, false, false, false, &[NE, MI, VC, LT, LE, LO, AL]),
            (true, false, false, true, &[NE, MI, VS, GE, GT, LO, AL]),
        ];

        let mut cpu = core();
        for &(n, z, c, v, expected) in cases {
            cpu.cpsr.set_N(n);
            cpu.cpsr.set_Z(z);
            cpu.cpsr.set_C(c);
            cpu.cpsr.set_V(v);

            for &cond in &[
                EQ, NE, HS, LO, MI, PL, VS, VC, HI, LS, GE, LT, GT, LE, AL,
            ] {
                let expect_taken = expected.contains(&cond);
                assert_eq!(
                    cpu.check_arm_cond(cond),
                    expect_taken,
                    "cond {:?} with N={} Z={} C={} V={}",
                    cond,
                    n,
                    z,
                    c,
                    v
                );
            }
        }
    }

    #[test]
    fn register_banking_is_private_to_modes_that_do_not_share_a_bank() {
        let mut cpu = core();
        cpu.cpsr.set_mode(CpuMode::System);
        cpu.set_reg(13, 0x0300_7f00);

        cpu.change_mode(CpuMode::System, CpuMode::Irq);
        cpu.set_reg(13, 0x0300_7fa0);
        assert_eq!(cpu.get_reg(13), 0x0300_7fa0);

        // System and User share a bank; Irq has its own.
        cpu.change_mode(CpuMode::Irq, CpuMode::System);
        assert_eq!(cpu.get_reg(13), 0x0300_7f00);

        cpu.change_mode(CpuMode::System, CpuMode::Irq);
        assert_eq!(cpu.get_reg(13), 0x0300_7fa0);
    }
}
