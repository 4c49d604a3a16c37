//! High-level emulation of the GBA BIOS call table. No BIOS image is ever
//! executed; each entry point mutates `Core` and the bus directly, the way
//! `Core::software_interrupt` expects (see `arm7tdmi::exception`).

use crate::arm7tdmi::memory::{MemoryAccess::NonSeq, MemoryInterface};
use crate::arm7tdmi::Core;
use crate::error::CpuError;

const BIOS_CHECKSUM: u32 = 0x0BAAE18F;

pub fn dispatch<I: MemoryInterface>(core: &mut Core<I>, comment: u32) {
    let index = (comment & 0xff) as u8;
    match index {
        0x00 => stub(core, "SoftReset"),
        0x01 => stub(core, "RegisterRamReset"),
        0x02 => halt(core),
        0x03 => stub(core, "Stop"),
        0x04 => intr_wait(core),
        0x05 => vblank_intr_wait(core),
        0x06 => div(core),
        0x07 => div_arm(core),
        0x08 => sqrt(core),
        0x09 => arc_tan(core),
        0x0a => arc_tan2(core),
        0x0b => unimplemented(core, comment, "CpuSet"),
        0x0c => unimplemented(core, comment, "CpuFastSet"),
        0x0d => bios_checksum(core),
        0x0e => bg_affine_set(core),
        0x0f => obj_affine_set(core),
        0x10 => bit_unpack(core),
        0x11 | 0x12 => lz77_uncomp(core),
        0x13 => huff_uncomp(core),
        0x14 | 0x15 => rl_uncomp(core),
        0x16 | 0x17 => diff_unfilter(core, true),
        0x18 => diff_unfilter(core, false),
        0x19 => stub(core, "SoundBiasChange"),
        0x1a => stub(core, "SoundDriverInit"),
        0x1b => stub(core, "SoundDriverMode"),
        0x1c => stub(core, "SoundDriverMain"),
        0x1d => stub(core, "SoundDriverVSync"),
        0x1e => stub(core, "SoundChannelClear"),
        0x1f => stub(core, "MIDIKey2Freq"),
        0x20 => stub(core, "MusicPlayerOpen"),
        0x21 => stub(core, "MusicPlayerStart"),
        0x22 => stub(core, "MusicPlayerStop"),
        0x23 => stub(core, "MusicPlayerContinue"),
        0x24 => stub(core, "MusicPlayerFadeOut"),
        0x25 => stub(core, "MultiBoot"),
        0x26 => stub(core, "HardReset"),
        0x27 => stub(core, "CustomHalt"),
        0x28 => stub(core, "SoundDriverVSyncOff"),
        0x29 => stub(core, "SoundDriverVSyncOn"),
        0x2a => stub(core, "GetJumpList"),
        _ => log::warn!("swi: unknown bios call index {:#x}", index),
    }
}

fn stub<I: MemoryInterface>(_core: &mut Core<I>, name: &str) {
    log::warn!("swi: {} not implemented", name);
}

fn unimplemented<I: MemoryInterface>(_core: &mut Core<I>, comment: u32, name: &str) {
    let err = CpuError::UnimplementedSwi(comment);
    log::warn!("swi: {} requires a real BIOS image: {}", name, err);
}

fn halt<I: MemoryInterface>(core: &mut Core<I>) {
    core.halt_cpu = true;
    core.halt_condition = core.get_reg(0) as u16;
}

fn intr_wait<I: MemoryInterface>(core: &mut Core<I>) {
    // r0 (clear current flags before waiting) has no effect here: this core
    // doesn't own the interrupt flag register, only the wait condition.
    core.halt_condition = core.get_reg(1) as u16;
    core.halt_cpu = true;
}

fn vblank_intr_wait<I: MemoryInterface>(core: &mut Core<I>) {
    core.set_reg(0, 0);
    core.set_reg(1, 1);
    intr_wait(core);
}

fn div_result<I: MemoryInterface>(core: &mut Core<I>, numerator: i32, denominator: i32) {
    if denominator == 0 {
        log::warn!("swi: division by zero (n={})", numerator);
        core.set_reg(0, if numerator < 0 { -1i32 as u32 } else { 1 });
        core.set_reg(1, numerator as u32);
        core.set_reg(3, 1);
    } else if numerator == i32::MIN && denominator == -1 {
        core.set_reg(0, i32::MIN as u32);
        core.set_reg(1, 0);
        core.set_reg(3, i32::MIN as u32);
    } else {
        let quot = numerator / denominator;
        let rem = numerator % denominator;
        core.set_reg(0, quot as u32);
        core.set_reg(1, rem as u32);
        core.set_reg(3, quot.unsigned_abs());
    }
}

fn div<I: MemoryInterface>(core: &mut Core<I>) {
    let numerator = core.get_reg(0) as i32;
    let denominator = core.get_reg(1) as i32;
    div_result(core, numerator, denominator);
}

fn div_arm<I: MemoryInterface>(core: &mut Core<I>) {
    let numerator = core.get_reg(1) as i32;
    let denominator = core.get_reg(0) as i32;
    div_result(core, numerator, denominator);
}

fn sqrt<I: MemoryInterface>(core: &mut Core<I>) {
    let value = core.get_reg(0);
    let result = (value as f64).sqrt() as i32 as u32;
    core.set_reg(0, result);
}

/// Seven-term Horner evaluation in Q14, reproduced from `swi.cpp::arcTan`.
fn arc_tan<I: MemoryInterface>(core: &mut Core<I>) {
    let i = core.get_reg(0) as i32;
    let a = -((i.wrapping_mul(i)) >> 14);
    let mut b = ((0xA9 * a) >> 14) + 0x390;
    b = ((b * a) >> 14) + 0x91C;
    b = ((b * a) >> 14) + 0xFB6;
    b = ((b * a) >> 14) + 0x16AA;
    b = ((b * a) >> 14) + 0x2081;
    b = ((b * a) >> 14) + 0x3651;
    b = ((b * a) >> 14) + 0xA2F9;
    let r0 = (i.wrapping_mul(b)) >> 16;
    core.set_reg(0, r0 as u32);
    if a != 0 {
        core.set_reg(1, a as u32);
    }
    if b != 0 {
        core.set_reg(2, b as u32);
    }
    log::warn!("swi: arcTan return format is known to be inaccurate outside [-pi/4, pi/4]");
}

fn convert_from_q1_14(fixed: u16) -> f64 {
    let magnitude = (fixed & 0x7FFF) as f64 / (1u32 << 14) as f64;
    if fixed & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn arc_tan2<I: MemoryInterface>(core: &mut Core<I>) {
    let x = convert_from_q1_14((core.get_reg(0) & 0xffff) as u16);
    let y = convert_from_q1_14((core.get_reg(1) & 0xffff) as u16);
    let res = y.atan2(x) * 2.0 + std::f64::consts::PI;
    let result = ((res * 0xFFFF as f64) / (2.0 * std::f64::consts::PI)) as u16;
    core.set_reg(0, result as u32);
}

fn bios_checksum<I: MemoryInterface>(core: &mut Core<I>) {
    core.set_reg(0, BIOS_CHECKSUM);
}

fn to_fixed16(value: f32) -> u16 {
    (value * 128.0).round() as i32 as i16 as u16
}

fn to_fixed32(value: f32) -> u32 {
    (value * (1u32 << 19) as f32).round() as i32 as u32
}

/// Rotation/scale matrix computation, from `swi.cpp::bgAffineSet`.
fn bg_affine_set<I: MemoryInterface>(core: &mut Core<I>) {
    let mut source_addr = core.get_reg(0);
    let mut dest_addr = core.get_reg(1);
    let count = core.get_reg(2);

    for _ in 0..count {
        let ox = core.load_32(source_addr, NonSeq) as i32 as f32 / 256.0;
        let oy = core.load_32(source_addr + 4, NonSeq) as i32 as f32 / 256.0;
        let cx = core.load_16(source_addr + 8, NonSeq) as i16 as f32;
        let cy = core.load_16(source_addr + 10, NonSeq) as i16 as f32;
        let sx = core.load_16(source_addr + 12, NonSeq) as i16 as f32 / 256.0;
        let sy = core.load_16(source_addr + 14, NonSeq) as i16 as f32 / 256.0;
        let theta = ((core.load_32(source_addr + 16, NonSeq) >> 8) as f32 / 128.0) * std::f32::consts::PI;

        let (mut a, mut b, mut c, mut d);
        a = theta.cos();
        d = a;
        b = theta.sin();
        c = b;
        a *= sx;
        b *= -sx;
        c *= sy;
        d *= sy;
        let rx = ox - (a * cx + b * cy);
        let ry = oy - (c * cx + d * cy);

        core.store_16(dest_addr, to_fixed16(a), NonSeq);
        core.store_16(dest_addr + 2, to_fixed16(b), NonSeq);
        core.store_16(dest_addr + 4, to_fixed16(c), NonSeq);
        core.store_16(dest_addr + 6, to_fixed16(d), NonSeq);
        core.store_32(dest_addr + 8, to_fixed32(rx), NonSeq);
        core.store_32(dest_addr + 12, to_fixed32(ry), NonSeq);

        source_addr += 20;
        dest_addr += 16;
    }
}

/// Rotation/scale matrix computation, from `swi.cpp::objAffineSet`.
fn obj_affine_set<I: MemoryInterface>(core: &mut Core<I>) {
    let mut source_addr = core.get_reg(0);
    let mut dest_addr = core.get_reg(1);
    let count = core.get_reg(2);
    let diff = core.get_reg(3);

    for _ in 0..count {
        let org_sx = core.load_16(source_addr, NonSeq);
        let org_sy = core.load_16(source_addr + 2, NonSeq);
        let org_theta = core.load_16(source_addr + 4, NonSeq);
        source_addr += 8;

        let theta = ((org_theta >> 8) as f32 / 128.0) * std::f32::consts::PI;
        let sx = org_sx as i16 as f32 / 128.0;
        let sy = org_sy as i16 as f32 / 128.0;

        let (mut a, mut b, mut c, mut d);
        a = theta.cos();
        d = a;
        b = theta.sin();
        c = b;
        a *= sx;
        b *= -sx;
        c *= sy;
        d *= sy;

        core.store_16(dest_addr, to_fixed16(a), NonSeq);
        core.store_16(dest_addr + diff, to_fixed16(b), NonSeq);
        core.store_16(dest_addr + diff * 2, to_fixed16(c), NonSeq);
        core.store_16(dest_addr + diff * 3, to_fixed16(d), NonSeq);
        dest_addr += diff * 4;
    }
}

/// Bit-granular unpack, from `swi.cpp::bitUnPack`.
fn bit_unpack<I: MemoryInterface>(core: &mut Core<I>) {
    let mut source_addr = core.get_reg(0);
    let mut dest_addr = core.get_reg(1);
    let unpack_info = core.get_reg(2);

    let mut src_byte_count = core.load_16(unpack_info, NonSeq);
    let src_unit_width = core.load_8(unpack_info + 2, NonSeq);
    let dest_unit_width = core.load_8(unpack_info + 3, NonSeq);
    let mut data_offset = core.load_32(unpack_info + 4, NonSeq);
    let zero_data_offset = data_offset & (1 << 31) != 0;
    data_offset &= 0x07FF_FFFF;

    let mut write_buf: u32 = 0;
    let mut write_buf_offset: u32 = 0;

    while src_byte_count > 0 {
        let mut src_units = core.load_8(source_addr, NonSeq);
        source_addr += 1;
        src_byte_count -= 1;

        let mut src_unit_bits_left: i32 = 8;
        while src_unit_bits_left > 0 {
            let mut unit = (src_units as u32) & ((1u32 << src_unit_width) - 1);
            src_units >>= src_unit_width;

            if zero_data_offset || unit > 0 {
                unit = unit.wrapping_add(data_offset);
            }
            unit &= (1u32 << dest_unit_width) - 1;

            write_buf |= unit << write_buf_offset;
            write_buf_offset += dest_unit_width as u32;

            let last_unit = src_byte_count == 0 && src_unit_bits_left <= src_unit_width as i32;
            if write_buf_offset + (dest_unit_width as u32) > 32 || last_unit {
                core.store_32(dest_addr, write_buf, NonSeq);
                dest_addr += 4;
                write_buf = 0;
                write_buf_offset = 0;
            }

            src_unit_bits_left -= src_unit_width as i32;
        }
    }
}

/// Flag-byte/8-block LZ77 decode with backreferences relative to the
/// destination cursor, from `swi.cpp::_LZ77UnComp`.
fn lz77_uncomp<I: MemoryInterface>(core: &mut Core<I>) {
    let mut source_addr = core.get_reg(0);
    let mut dest_addr = core.get_reg(1);

    let header = core.load_32(source_addr, NonSeq);
    source_addr += 4;

    if (header >> 4) & 0xf != 1 {
        log::warn!("swi: LZ77UnComp called with non-LZ77 header");
    }
    let mut decompressed_size = ((header >> 8) & 0x00FF_FFFF) as i32;

    while decompressed_size > 0 {
        let type_bitset = core.load_8(source_addr, NonSeq);
        source_addr += 1;

        for i in 0..8 {
            if decompressed_size <= 0 {
                break;
            }
            let type1 = (type_bitset >> (7 - i)) & 1 != 0;
            if type1 {
                let desc = core.load_16(source_addr, NonSeq);
                source_addr += 2;
                let disp = (((desc & 0x0F) << 8) | ((desc >> 8) & 0xFF)) + 1;
                let mut n = ((desc >> 4) & 0x0F) + 3;
                decompressed_size -= n as i32;

                let mut read_addr = dest_addr.wrapping_sub(disp as u32);
                while n > 0 {
                    let byte = core.load_8(read_addr, NonSeq);
                    core.store_8(dest_addr, byte, NonSeq);
                    dest_addr += 1;
                    read_addr += 1;
                    n -= 1;
                }
            } else {
                let byte = core.load_8(source_addr, NonSeq);
                source_addr += 1;
                decompressed_size -= 1;
                core.store_8(dest_addr, byte, NonSeq);
                dest_addr += 1;
            }
        }
    }
}

/// Tree-walk decode, from `swi.cpp::huffUnComp`.
fn huff_uncomp<I: MemoryInterface>(core: &mut Core<I>) {
    let mut source_addr = core.get_reg(0);
    let mut dest_addr = core.get_reg(1);

    let header = core.load_32(source_addr, NonSeq);
    source_addr += 4;

    let mut decompressed_bits: i64 = (((header >> 8) & 0x00FF_FFFF) * 8) as i64;
    let data_size = (header & 0x0f) as u32;
    if (header >> 4) & 0xf != 2 {
        log::warn!("swi: huffUnComp called with non-Huffman header");
    }

    let tree_size = core.load_8(source_addr, NonSeq);
    source_addr += 1;

    let tree_root = source_addr;
    source_addr += tree_size as u32;

    let mut write_buf: u32 = 0;
    let mut write_buf_offset: u32 = 0;

    let mut read_buf = core.load_32(source_addr, NonSeq);
    source_addr += 4;
    let mut read_buf_bits_left: u32 = 32;

    while decompressed_bits > 0 {
        let mut current_addr = tree_root;
        let mut is_data_node = false;

        loop {
            let node = core.load_8(current_addr, NonSeq);
            if is_data_node {
                write_buf |= (node as u32) << write_buf_offset;
                write_buf_offset += data_size;
                break;
            }

            let offset = (node & 0x1F) as u32;
            let node1_end = (node >> 6) & 1 != 0;
            let node0_end = (node >> 7) & 1 != 0;

            read_buf_bits_left -= 1;
            let decompress_bit = (read_buf >> read_buf_bits_left) & 1 != 0;
            is_data_node = if decompress_bit { node1_end } else { node0_end };
            current_addr = (current_addr & !1) + offset * 2 + if decompress_bit { 3 } else { 2 };

            if read_buf_bits_left == 0 {
                read_buf = core.load_32(source_addr, NonSeq);
                source_addr += 4;
                read_buf_bits_left = 32;
            }
        }

        if write_buf_offset + data_size > 32 || decompressed_bits == data_size as i64 {
            core.store_32(dest_addr, write_buf, NonSeq);
            dest_addr += 4;
            write_buf = 0;
            write_buf_offset = 0;
        }

        decompressed_bits -= data_size as i64;
    }
}

/// Flag-byte run-length decode, from `swi.cpp::_rlUnComp`.
fn rl_uncomp<I: MemoryInterface>(core: &mut Core<I>) {
    let mut source_addr = core.get_reg(0);
    let mut dest_addr = core.get_reg(1);

    let header = core.load_32(source_addr, NonSeq);
    source_addr += 4;
    if (header >> 4) & 0xf != 3 {
        log::warn!("swi: RLUnComp called with non-RLE header");
    }
    let mut decompressed_size = ((header >> 8) & 0x00FF_FFFF) as i32;

    while decompressed_size > 0 {
        let flag = core.load_8(source_addr, NonSeq);
        source_addr += 1;

        let compressed = flag & 0x80 != 0;
        let len = (flag & 0x7f) as i32 + if compressed { 3 } else { 1 };
        decompressed_size -= len;

        if compressed {
            let data = core.load_8(source_addr, NonSeq);
            source_addr += 1;
            for _ in 0..len {
                core.store_8(dest_addr, data, NonSeq);
                dest_addr += 1;
            }
        } else {
            for _ in 0..len {
                let data = core.load_8(source_addr, NonSeq);
                source_addr += 1;
                core.store_8(dest_addr, data, NonSeq);
                dest_addr += 1;
            }
        }
    }
}

/// Cumulative-sum decode, from `swi.cpp::_diffUnFilter`.
fn diff_unfilter<I: MemoryInterface>(core: &mut Core<I>, bits8: bool) {
    let mut src_addr = core.get_reg(0);
    let mut dest_addr = core.get_reg(1);

    let header = core.load_32(src_addr, NonSeq);
    src_addr += 4;
    let mut size = (header >> 8) & 0x00FF_FFFF;

    let step = if bits8 { 1 } else { 2 };
    let mut current: u16 = 0;

    while size > 0 {
        let diff = if bits8 {
            core.load_8(src_addr, NonSeq) as u16
        } else {
            core.load_16(src_addr, NonSeq)
        };
        current = current.wrapping_add(diff);
        if bits8 {
            core.store_8(dest_addr, (current & 0xff) as u8, NonSeq);
        } else {
            core.store_16(dest_addr, current, NonSeq);
        }
        dest_addr += step;
        src_addr += step;
        size -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm7tdmi::memory::MemoryAccess;

    #[derive(Default)]
    struct VecMem(Vec<u8>);

    impl MemoryInterface for VecMem {
        fn load_8(&mut self, addr: u32, _access: MemoryAccess) -> u8 {
            self.0[addr as usize]
        }
        fn load_16(&mut self, addr: u32, _access: MemoryAccess) -> u16 {
            let a = addr as usize;
            u16::from_le_bytes([self.0[a], self.0[a + 1]])
        }
        fn load_32(&mut self, addr: u32, _access: MemoryAccess) -> u32 {
            let a = addr as usize;
            u32::from_le_bytes([self.0[a], self.0[a + 1], self.0[a + 2], self.0[a + 3]])
        }
        fn store_8(&mut self, addr: u32, value: u8, _access: MemoryAccess) {
            self.0[addr as usize] = value;
        }
        fn store_16(&mut self, addr: u32, value: u16, _access: MemoryAccess) {
            let a = addr as usize;
            self.0[a..a + 2].copy_from_slice(&value.to_le_bytes());
        }
        fn store_32(&mut self, addr: u32, value: u32, _access: MemoryAccess) {
            let a = addr as usize;
            self.0[a..a + 4].copy_from_slice(&value.to_le_bytes());
        }
        fn idle_cycle(&mut self) {}
    }

    fn core_with(bytes: Vec<u8>) -> Core<VecMem> {
        Core::new(VecMem(bytes))
    }

    #[test]
    fn div_truncates_toward_zero() {
        let mut core = core_with(vec![0; 16]);
        core.set_reg(0, (-7i32) as u32);
        core.set_reg(1, 2);
        div(&mut core);
        assert_eq!(core.get_reg(0) as i32, -3);
        assert_eq!(core.get_reg(1) as i32, -1);
        assert_eq!(core.get_reg(3), 3);
    }

    #[test]
    fn div_by_zero_returns_sentinel() {
        let mut core = core_with(vec![0; 16]);
        core.set_reg(0, 5);
        core.set_reg(1, 0);
        div(&mut core);
        assert_eq!(core.get_reg(0), 1);
        assert_eq!(core.get_reg(1), 5);
        assert_eq!(core.get_reg(3), 1);
    }

    #[test]
    fn div_int_min_by_minus_one_does_not_trap() {
        let mut core = core_with(vec![0; 16]);
        core.set_reg(0, i32::MIN as u32);
        core.set_reg(1, (-1i32) as u32);
        div(&mut core);
        assert_eq!(core.get_reg(0), i32::MIN as u32);
        assert_eq!(core.get_reg(1), 0);
        assert_eq!(core.get_reg(3), i32::MIN as u32);
    }

    #[test]
    fn bios_checksum_is_fixed_magic() {
        let mut core = core_with(vec![0; 16]);
        bios_checksum(&mut core);
        assert_eq!(core.get_reg(0), BIOS_CHECKSUM);
    }

    #[test]
    fn lz77_uncomp_copies_literal_bytes() {
        // header: type=1, decompressed size=4
        let mut bytes = vec![0u8; 64];
        bytes[0] = 0x10;
        bytes[1] = 0x04;
        bytes[2] = 0x00;
        bytes[3] = 0x00;
        // one flag byte: all literal (0x00), four literal bytes
        bytes[4] = 0x00;
        bytes[5] = 0xaa;
        bytes[6] = 0xbb;
        bytes[7] = 0xcc;
        bytes[8] = 0xdd;
        let mut core = core_with(bytes);
        core.set_reg(0, 0);
        core.set_reg(1, 32);
        lz77_uncomp(&mut core);
        assert_eq!(core.load_8(32, MemoryAccess::NonSeq), 0xaa);
        assert_eq!(core.load_8(33, MemoryAccess::NonSeq), 0xbb);
        assert_eq!(core.load_8(34, MemoryAccess::NonSeq), 0xcc);
        assert_eq!(core.load_8(35, MemoryAccess::NonSeq), 0xdd);
    }

    #[test]
    fn rl_uncomp_expands_a_compressed_run() {
        // header: type=3, decompressed size=5
        let mut bytes = vec![0u8; 32];
        bytes[0] = 0x30;
        bytes[1] = 0x05;
        // flag: compressed (bit7=1), len-3 = 2 -> len = 5
        bytes[4] = 0x80 | 0x02;
        bytes[5] = 0x42;
        let mut core = core_with(bytes);
        core.set_reg(0, 0);
        core.set_reg(1, 16);
        rl_uncomp(&mut core);
        for i in 0..5u32 {
            assert_eq!(core.load_8(16 + i, MemoryAccess::NonSeq), 0x42);
        }
    }

    #[test]
    fn halt_sets_condition_from_ie_register_value() {
        let mut core = core_with(vec![0; 16]);
        core.set_reg(0, 0x20);
        halt(&mut core);
        assert!(core.is_halted());
        assert_eq!(core.halt_condition, 0x20);
    }

    #[test]
    fn vblank_intr_wait_forces_wait_flags() {
        let mut core = core_with(vec![0; 16]);
        core.set_reg(0, 0xff);
        core.set_reg(1, 0xff);
        vblank_intr_wait(&mut core);
        assert_eq!(core.get_reg(0), 0);
        assert_eq!(core.get_reg(1), 1);
        assert!(core.is_halted());
    }
}
