use std::fmt;

use crate::bit::BitIndex;

use super::{OpFormat5, ThumbAluOps, ThumbDecodeHelper, ThumbFormat, ThumbInstruction};
use crate::arm7tdmi::consts::flags::*;
use crate::arm7tdmi::*;

impl fmt::Display for ThumbAluOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ThumbAluOps::*;
        match self {
            AND => write!(f, "and"),
            EOR => write!(f, "eor"),
            LSL => write!(f, "lsl"),
            LSR => write!(f, "lsr"),
            ASR => write!(f, "asr"),
            ADC => write!(f, "adc"),
            SBC => write!(f, "sbc"),
            ROR => write!(f, "ror"),
            TST => write!(f, "tst"),
            NEG => write!(f, "neg"),
            CMP => write!(f, "cmp"),
            CMN => write!(f, "cmn"),
            ORR => write!(f, "orr"),
            MUL => write!(f, "mul"),
            BIC => write!(f, "bic"),
            MVN => write!(f, "mvn"),
        }
    }
}

impl ThumbInstruction {
    fn fmt_move_shifted_reg(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = (self.raw & 0b111) as usize;
        let rs = self.raw.bit_range(3..6) as usize;
        write!(
            f,
            "{op}\t{Rd}, {Rs}, #{ofs}",
            op = self.raw.format1_op(),
            Rd = reg_string(rd),
            Rs = reg_string(rs),
            ofs = self.raw.offset5()
        )
    }

    fn fmt_add_sub(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = (self.raw & 0b111) as usize;
        write!(
            f,
            "{mnem}\t{Rd}, {Rs}, ",
            mnem = if self.raw.is_subtract() { "sub" } else { "add" },
            Rd = reg_string(rd),
            Rs = reg_string(self.raw.rs()),
        )?;
        if self.raw.is_immediate_operand() {
            write!(f, "#{}", self.raw.rn())
        } else {
            write!(f, "{}", reg_string(self.raw.rn()))
        }
    }

    fn fmt_data_process_imm(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use super::OpFormat3::*;
        let rd = self.raw.bit_range(8..11) as usize;
        let mnem = match self.raw.format3_op() {
            MOV => "mov",
            CMP => "cmp",
            ADD => "add",
            SUB => "sub",
        };
        write!(
            f,
            "{mnem}\t{Rd}, #{imm}",
            mnem = mnem,
            Rd = reg_string(rd),
            imm = self.raw & 0xff
        )
    }

    fn fmt_alu_ops(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = (self.raw & 0b111) as usize;
        write!(
            f,
            "{op}\t{Rd}, {Rs}",
            op = self.raw.format4_alu_op(),
            Rd = reg_string(rd),
            Rs = reg_string(self.raw.rs())
        )
    }

    fn fmt_hi_reg_op_or_bx(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = (self.raw & 0b111) as usize;
        let dst_reg = if self.raw.bit(FLAG_H1) { rd + 8 } else { rd };
        let src_reg = if self.raw.bit(FLAG_H2) {
            self.raw.rs() + 8
        } else {
            self.raw.rs()
        };
        match self.raw.format5_op() {
            OpFormat5::BX => write!(f, "bx\t{}", reg_string(src_reg)),
            OpFormat5::ADD => write!(f, "add\t{}, {}", reg_string(dst_reg), reg_string(src_reg)),
            OpFormat5::CMP => write!(f, "cmp\t{}, {}", reg_string(dst_reg), reg_string(src_reg)),
            OpFormat5::MOV => write!(f, "mov\t{}, {}", reg_string(dst_reg), reg_string(src_reg)),
        }
    }

    fn fmt_ldr_pc(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = self.raw.bit_range(8..11) as usize;
        write!(
            f,
            "ldr\t{Rd}, [pc, #{ofs:#x}]",
            Rd = reg_string(rd),
            ofs = self.raw.word8()
        )
    }

    fn fmt_ldr_str_reg_offset(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = (self.raw & 0b111) as usize;
        let rb = self.raw.bit_range(3..6) as usize;
        write!(
            f,
            "{mnem}{B}\t{Rd}, [{Rb}, {Ro}]",
            mnem = if self.raw.is_load() { "ldr" } else { "str" },
            B = if self.raw.bit(10) { "b" } else { "" },
            Rd = reg_string(rd),
            Rb = reg_string(rb),
            Ro = reg_string(self.raw.ro())
        )
    }

    fn fmt_ldr_str_shb(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = (self.raw & 0b111) as usize;
        let rb = self.raw.bit_range(3..6) as usize;
        let mnem = match (self.raw.bit(FLAG_SIGN_EXTEND), self.raw.bit(FLAG_HALFWORD)) {
            (false, false) => "strh",
            (false, true) => "ldrh",
            (true, false) => "ldsb",
            (true, true) => "ldsh",
        };
        write!(
            f,
            "{mnem}\t{Rd}, [{Rb}, {Ro}]",
            mnem = mnem,
            Rd = reg_string(rd),
            Rb = reg_string(rb),
            Ro = reg_string(self.raw.ro())
        )
    }

    fn fmt_ldr_str_imm_offset(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = (self.raw & 0b111) as usize;
        let rb = self.raw.bit_range(3..6) as usize;
        let is_byte = self.raw.bit(12);
        let offset = if is_byte {
            self.raw.offset5()
        } else {
            (self.raw.offset5() << 3) >> 1
        };
        write!(
            f,
            "{mnem}{B}\t{Rd}, [{Rb}, #{ofs}]",
            mnem = if self.raw.is_load() { "ldr" } else { "str" },
            B = if is_byte { "b" } else { "" },
            Rd = reg_string(rd),
            Rb = reg_string(rb),
            ofs = offset
        )
    }

    fn fmt_ldr_str_halfword(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = (self.raw & 0b111) as usize;
        let rb = self.raw.bit_range(3..6) as usize;
        write!(
            f,
            "{mnem}\t{Rd}, [{Rb}, #{ofs}]",
            mnem = if self.raw.is_load() { "ldrh" } else { "strh" },
            Rd = reg_string(rd),
            Rb = reg_string(rb),
            ofs = self.raw.offset5() << 1
        )
    }

    fn fmt_ldr_str_sp(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = self.raw.bit_range(8..11) as usize;
        write!(
            f,
            "{mnem}\t{Rd}, [sp, #{ofs:#x}]",
            mnem = if self.raw.is_load() { "ldr" } else { "str" },
            Rd = reg_string(rd),
            ofs = self.raw.word8()
        )
    }

    fn fmt_load_address(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rd = self.raw.bit_range(8..11) as usize;
        write!(
            f,
            "add\t{Rd}, {src}, #{ofs:#x}",
            Rd = reg_string(rd),
            src = if self.raw.bit(FLAG_SP) { "sp" } else { "pc" },
            ofs = self.raw.word8()
        )
    }

    fn fmt_add_sp(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "add\tsp, #{}", self.raw.sword7())
    }

    fn fmt_push_pop(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let is_pop = self.raw.is_load();
        write!(f, "{}\t{{", if is_pop { "pop" } else { "push" })?;
        let rlist = self.raw.register_list();
        let mut has_first = false;
        for i in 0..8 {
            if rlist.bit(i) {
                write!(f, "{}{}", if has_first { ", " } else { "" }, reg_string(i))?;
                has_first = true;
            }
        }
        if self.raw.bit(FLAG_R) {
            write!(
                f,
                "{}{}",
                if has_first { ", " } else { "" },
                if is_pop { "pc" } else { "lr" }
            )?;
        }
        write!(f, "}}")
    }

    fn fmt_ldm_stm(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rb = self.raw.bit_range(8..11) as usize;
        write!(
            f,
            "{mnem}\t{Rb}!, {{",
            mnem = if self.raw.is_load() { "ldmia" } else { "stmia" },
            Rb = reg_string(rb)
        )?;
        let rlist = self.raw.register_list();
        let mut has_first = false;
        for i in 0..8 {
            if rlist.bit(i) {
                write!(f, "{}{}", if has_first { ", " } else { "" }, reg_string(i))?;
                has_first = true;
            }
        }
        write!(f, "}}")
    }

    fn fmt_branch_with_cond(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "b{cond}\t{ofs:#x}",
            cond = self.raw.cond(),
            ofs = (self.pc as i32).wrapping_add(4).wrapping_add(self.raw.bcond_offset())
        )
    }

    fn fmt_swi(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swi\t#{:#x}", self.raw & 0xff)
    }

    fn fmt_branch(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offset = ((self.raw.offset11() << 21) >> 20) as i32;
        write!(f, "b\t{:#x}", (self.pc as i32).wrapping_add(4).wrapping_add(offset))
    }

    fn fmt_branch_long_with_link(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.bit(FLAG_LOW_OFFSET) {
            write!(f, "bl\t#{:#x}\t; low", self.raw.offset11())
        } else {
            write!(f, "bl\t#{:#x}\t; high", self.raw.offset11())
        }
    }
}

impl fmt::Display for ThumbInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ThumbFormat::*;
        match self.fmt {
            MoveShiftedReg => self.fmt_move_shifted_reg(f),
            AddSub => self.fmt_add_sub(f),
            DataProcessImm => self.fmt_data_process_imm(f),
            AluOps => self.fmt_alu_ops(f),
            HiRegOpOrBranchExchange => self.fmt_hi_reg_op_or_bx(f),
            LdrPc => self.fmt_ldr_pc(f),
            LdrStrRegOffset => self.fmt_ldr_str_reg_offset(f),
            LdrStrSHB => self.fmt_ldr_str_shb(f),
            LdrStrImmOffset => self.fmt_ldr_str_imm_offset(f),
            LdrStrHalfWord => self.fmt_ldr_str_halfword(f),
            LdrStrSp => self.fmt_ldr_str_sp(f),
            LoadAddress => self.fmt_load_address(f),
            AddSp => self.fmt_add_sp(f),
            PushPop => self.fmt_push_pop(f),
            LdmStm => self.fmt_ldm_stm(f),
            BranchConditional => self.fmt_branch_with_cond(f),
            Swi => self.fmt_swi(f),
            Branch => self.fmt_branch(f),
            BranchLongWithLink => self.fmt_branch_long_with_link(f),
            Undefined => write!(f, "<Undefined>"),
        }
    }
}
