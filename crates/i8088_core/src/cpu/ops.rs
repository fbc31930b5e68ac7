use super::calc;
use super::decode::Location;
use super::Intel8088;
use crate::address::{Port, SegmentAndOffset};
use crate::error::Result;
use crate::processor::Processor;
use crate::registers::{Flags, Segment, AX};
use tracing::warn;

macro_rules! op {
    ($op_code:literal, $exec:ident) => {{
        OpCodeEntry {
            exec: Self::$exec,
            extended: false,
        }
    }};

    ($op_code:literal, $exec:ident, extended) => {{
        OpCodeEntry {
            exec: Self::$exec,
            extended: true,
        }
    }};
}

struct OpCodeEntry {
    exec: fn(&mut Intel8088) -> Result<()>,
    /// Only decoded by the V20. The baseline CPU treats the op code as invalid.
    extended: bool,
}

const ACCUMULATOR: Location = Location::Register(AX as u8);

impl Intel8088 {
    pub(crate) fn execute_op_code(&mut self, op_code: u8) -> Result<()> {
        let entry = &Self::OP_CODE_TABLE[op_code as usize];
        if entry.extended && !self.config.is_v20() {
            return self.invalid_opcode();
        }
        (entry.exec)(self)
    }

    const OP_CODE_TABLE: [OpCodeEntry; 0x100] = [
        op!(0x00, op_alu_rm_reg),
        op!(0x01, op_alu_rm_reg),
        op!(0x02, op_alu_rm_reg),
        op!(0x03, op_alu_rm_reg),
        op!(0x04, op_alu_acc_imm),
        op!(0x05, op_alu_acc_imm),
        op!(0x06, op_push_segment),
        op!(0x07, op_pop_segment),
        op!(0x08, op_alu_rm_reg),
        op!(0x09, op_alu_rm_reg),
        op!(0x0A, op_alu_rm_reg),
        op!(0x0B, op_alu_rm_reg),
        op!(0x0C, op_alu_acc_imm),
        op!(0x0D, op_alu_acc_imm),
        op!(0x0E, op_push_segment),
        op!(0x0F, op_pop_cs),
        op!(0x10, op_alu_rm_reg),
        op!(0x11, op_alu_rm_reg),
        op!(0x12, op_alu_rm_reg),
        op!(0x13, op_alu_rm_reg),
        op!(0x14, op_alu_acc_imm),
        op!(0x15, op_alu_acc_imm),
        op!(0x16, op_push_segment),
        op!(0x17, op_pop_segment),
        op!(0x18, op_alu_rm_reg),
        op!(0x19, op_alu_rm_reg),
        op!(0x1A, op_alu_rm_reg),
        op!(0x1B, op_alu_rm_reg),
        op!(0x1C, op_alu_acc_imm),
        op!(0x1D, op_alu_acc_imm),
        op!(0x1E, op_push_segment),
        op!(0x1F, op_pop_segment),
        op!(0x20, op_alu_rm_reg),
        op!(0x21, op_alu_rm_reg),
        op!(0x22, op_alu_rm_reg),
        op!(0x23, op_alu_rm_reg),
        op!(0x24, op_alu_acc_imm),
        op!(0x25, op_alu_acc_imm),
        op!(0x26, op_prefix),
        op!(0x27, op_daa),
        op!(0x28, op_alu_rm_reg),
        op!(0x29, op_alu_rm_reg),
        op!(0x2A, op_alu_rm_reg),
        op!(0x2B, op_alu_rm_reg),
        op!(0x2C, op_alu_acc_imm),
        op!(0x2D, op_alu_acc_imm),
        op!(0x2E, op_prefix),
        op!(0x2F, op_das),
        op!(0x30, op_alu_rm_reg),
        op!(0x31, op_alu_rm_reg),
        op!(0x32, op_alu_rm_reg),
        op!(0x33, op_alu_rm_reg),
        op!(0x34, op_alu_acc_imm),
        op!(0x35, op_alu_acc_imm),
        op!(0x36, op_prefix),
        op!(0x37, op_aaa),
        op!(0x38, op_alu_rm_reg),
        op!(0x39, op_alu_rm_reg),
        op!(0x3A, op_alu_rm_reg),
        op!(0x3B, op_alu_rm_reg),
        op!(0x3C, op_alu_acc_imm),
        op!(0x3D, op_alu_acc_imm),
        op!(0x3E, op_prefix),
        op!(0x3F, op_aas),
        op!(0x40, op_inc_reg16),
        op!(0x41, op_inc_reg16),
        op!(0x42, op_inc_reg16),
        op!(0x43, op_inc_reg16),
        op!(0x44, op_inc_reg16),
        op!(0x45, op_inc_reg16),
        op!(0x46, op_inc_reg16),
        op!(0x47, op_inc_reg16),
        op!(0x48, op_dec_reg16),
        op!(0x49, op_dec_reg16),
        op!(0x4A, op_dec_reg16),
        op!(0x4B, op_dec_reg16),
        op!(0x4C, op_dec_reg16),
        op!(0x4D, op_dec_reg16),
        op!(0x4E, op_dec_reg16),
        op!(0x4F, op_dec_reg16),
        op!(0x50, op_push_reg16),
        op!(0x51, op_push_reg16),
        op!(0x52, op_push_reg16),
        op!(0x53, op_push_reg16),
        op!(0x54, op_push_reg16),
        op!(0x55, op_push_reg16),
        op!(0x56, op_push_reg16),
        op!(0x57, op_push_reg16),
        op!(0x58, op_pop_reg16),
        op!(0x59, op_pop_reg16),
        op!(0x5A, op_pop_reg16),
        op!(0x5B, op_pop_reg16),
        op!(0x5C, op_pop_reg16),
        op!(0x5D, op_pop_reg16),
        op!(0x5E, op_pop_reg16),
        op!(0x5F, op_pop_reg16),
        op!(0x60, op_pusha, extended),
        op!(0x61, op_popa, extended),
        op!(0x62, op_bound, extended),
        op!(0x63, op_invalid),
        op!(0x64, op_invalid),
        op!(0x65, op_invalid),
        op!(0x66, op_invalid),
        op!(0x67, op_invalid),
        op!(0x68, op_push_imm16, extended),
        op!(0x69, op_imul_reg16_rm16_imm, extended),
        op!(0x6A, op_push_imm8, extended),
        op!(0x6B, op_imul_reg16_rm16_imm, extended),
        op!(0x6C, op_ins, extended),
        op!(0x6D, op_ins, extended),
        op!(0x6E, op_outs, extended),
        op!(0x6F, op_outs, extended),
        op!(0x70, op_jo),
        op!(0x71, op_jno),
        op!(0x72, op_jb),
        op!(0x73, op_jnb),
        op!(0x74, op_je),
        op!(0x75, op_jne),
        op!(0x76, op_jbe),
        op!(0x77, op_jnbe),
        op!(0x78, op_js),
        op!(0x79, op_jns),
        op!(0x7A, op_jp),
        op!(0x7B, op_jnp),
        op!(0x7C, op_jl),
        op!(0x7D, op_jnl),
        op!(0x7E, op_jle),
        op!(0x7F, op_jnle),
        op!(0x80, op_group_1),
        op!(0x81, op_group_1),
        op!(0x82, op_group_1),
        op!(0x83, op_group_1),
        op!(0x84, op_test_rm_reg),
        op!(0x85, op_test_rm_reg),
        op!(0x86, op_xchg_rm_reg),
        op!(0x87, op_xchg_rm_reg),
        op!(0x88, op_mov_rm_reg),
        op!(0x89, op_mov_rm_reg),
        op!(0x8A, op_mov_rm_reg),
        op!(0x8B, op_mov_rm_reg),
        op!(0x8C, op_mov_rm16_seg),
        op!(0x8D, op_lea),
        op!(0x8E, op_mov_seg_rm16),
        op!(0x8F, op_pop_rm16),
        op!(0x90, op_nop),
        op!(0x91, op_xchg_ax_reg16),
        op!(0x92, op_xchg_ax_reg16),
        op!(0x93, op_xchg_ax_reg16),
        op!(0x94, op_xchg_ax_reg16),
        op!(0x95, op_xchg_ax_reg16),
        op!(0x96, op_xchg_ax_reg16),
        op!(0x97, op_xchg_ax_reg16),
        op!(0x98, op_cbw),
        op!(0x99, op_cwd),
        op!(0x9A, op_call_far),
        op!(0x9B, op_wait),
        op!(0x9C, op_pushf),
        op!(0x9D, op_popf),
        op!(0x9E, op_sahf),
        op!(0x9F, op_lahf),
        op!(0xA0, op_mov_acc_moffs),
        op!(0xA1, op_mov_acc_moffs),
        op!(0xA2, op_mov_acc_moffs),
        op!(0xA3, op_mov_acc_moffs),
        op!(0xA4, op_movs),
        op!(0xA5, op_movs),
        op!(0xA6, op_cmps),
        op!(0xA7, op_cmps),
        op!(0xA8, op_test_acc_imm),
        op!(0xA9, op_test_acc_imm),
        op!(0xAA, op_stos),
        op!(0xAB, op_stos),
        op!(0xAC, op_lods),
        op!(0xAD, op_lods),
        op!(0xAE, op_scas),
        op!(0xAF, op_scas),
        op!(0xB0, op_mov_reg8_imm8),
        op!(0xB1, op_mov_reg8_imm8),
        op!(0xB2, op_mov_reg8_imm8),
        op!(0xB3, op_mov_reg8_imm8),
        op!(0xB4, op_mov_reg8_imm8),
        op!(0xB5, op_mov_reg8_imm8),
        op!(0xB6, op_mov_reg8_imm8),
        op!(0xB7, op_mov_reg8_imm8),
        op!(0xB8, op_mov_reg16_imm16),
        op!(0xB9, op_mov_reg16_imm16),
        op!(0xBA, op_mov_reg16_imm16),
        op!(0xBB, op_mov_reg16_imm16),
        op!(0xBC, op_mov_reg16_imm16),
        op!(0xBD, op_mov_reg16_imm16),
        op!(0xBE, op_mov_reg16_imm16),
        op!(0xBF, op_mov_reg16_imm16),
        op!(0xC0, op_group_2_imm8, extended),
        op!(0xC1, op_group_2_imm8, extended),
        op!(0xC2, op_ret_imm16),
        op!(0xC3, op_ret),
        op!(0xC4, op_les),
        op!(0xC5, op_lds),
        op!(0xC6, op_mov_rm_imm),
        op!(0xC7, op_mov_rm_imm),
        op!(0xC8, op_enter, extended),
        op!(0xC9, op_leave, extended),
        op!(0xCA, op_retf_imm16),
        op!(0xCB, op_retf),
        op!(0xCC, op_int3),
        op!(0xCD, op_int_imm8),
        op!(0xCE, op_into),
        op!(0xCF, op_iret),
        op!(0xD0, op_group_2),
        op!(0xD1, op_group_2),
        op!(0xD2, op_group_2),
        op!(0xD3, op_group_2),
        op!(0xD4, op_aam),
        op!(0xD5, op_aad),
        op!(0xD6, op_salc),
        op!(0xD7, op_xlat),
        op!(0xD8, op_esc),
        op!(0xD9, op_esc),
        op!(0xDA, op_esc),
        op!(0xDB, op_esc),
        op!(0xDC, op_esc),
        op!(0xDD, op_esc),
        op!(0xDE, op_esc),
        op!(0xDF, op_esc),
        op!(0xE0, op_loopnz),
        op!(0xE1, op_loopz),
        op!(0xE2, op_loop),
        op!(0xE3, op_jcxz),
        op!(0xE4, op_in_acc_imm8),
        op!(0xE5, op_in_acc_imm8),
        op!(0xE6, op_out_imm8_acc),
        op!(0xE7, op_out_imm8_acc),
        op!(0xE8, op_call_rel16),
        op!(0xE9, op_jmp_rel16),
        op!(0xEA, op_jmp_far),
        op!(0xEB, op_jmp_rel8),
        op!(0xEC, op_in_acc_dx),
        op!(0xED, op_in_acc_dx),
        op!(0xEE, op_out_dx_acc),
        op!(0xEF, op_out_dx_acc),
        op!(0xF0, op_prefix),
        op!(0xF1, op_prefix),
        op!(0xF2, op_prefix),
        op!(0xF3, op_prefix),
        op!(0xF4, op_hlt),
        op!(0xF5, op_cmc),
        op!(0xF6, op_group_3),
        op!(0xF7, op_group_3),
        op!(0xF8, op_clc),
        op!(0xF9, op_stc),
        op!(0xFA, op_cli),
        op!(0xFB, op_sti),
        op!(0xFC, op_cld),
        op!(0xFD, op_std),
        op!(0xFE, op_group_4),
        op!(0xFF, op_group_5),
    ];

    fn op_invalid(&mut self) -> Result<()> {
        self.invalid_opcode()
    }

    /// Prefix bytes never reach the table; `parse_opcode` consumes them.
    fn op_prefix(&mut self) -> Result<()> {
        Ok(())
    }

    /// Run ALU operation `operation` on `destination` and write the result back unless the
    /// operation is CMP.
    pub(crate) fn alu_byte(&mut self, operation: u8, destination: Location, value: u8) {
        let a = self.load_byte(destination);
        let result = calc::byte::alu(operation, a, value, &mut self.registers.flags);
        if operation != calc::CMP {
            self.store_byte(destination, result);
        }
    }

    pub(crate) fn alu_word(&mut self, operation: u8, destination: Location, value: u16) {
        let a = self.load_word(destination);
        let result = calc::word::alu(operation, a, value, &mut self.registers.flags);
        if operation != calc::CMP {
            self.store_word(destination, result);
        }
    }

    // 00..03 08..0B 10..13 18..1B 20..23 28..2B 30..33 38..3B
    fn op_alu_rm_reg(&mut self) -> Result<()> {
        let operation = (self.state.op_code >> 3) & 0b111;
        let (destination, source) = self.operands();

        if self.state.wide {
            let value = self.load_word(source);
            self.alu_word(operation, destination, value);
        } else {
            let value = self.load_byte(source);
            self.alu_byte(operation, destination, value);
        }

        Ok(())
    }

    // 04 05 0C 0D 14 15 1C 1D 24 25 2C 2D 34 35 3C 3D
    fn op_alu_acc_imm(&mut self) -> Result<()> {
        let operation = (self.state.op_code >> 3) & 0b111;

        if self.state.wide {
            let value = self.fetch_word();
            self.alu_word(operation, ACCUMULATOR, value);
        } else {
            let value = self.fetch();
            self.alu_byte(operation, ACCUMULATOR, value);
        }

        Ok(())
    }

    // 06 0E 16 1E
    fn op_push_segment(&mut self) -> Result<()> {
        let value = self
            .registers
            .segment_by_encoding(self.state.op_code >> 3);
        self.push(value);
        Ok(())
    }

    // 07 17 1F
    fn op_pop_segment(&mut self) -> Result<()> {
        let value = self.pop();
        self.registers
            .set_segment_by_encoding(self.state.op_code >> 3, value);
        Ok(())
    }

    // 0F
    fn op_pop_cs(&mut self) -> Result<()> {
        if self.config.is_v20() {
            warn!(
                "Unimplemented extended op code 0F at {:04X}:{:04X}",
                self.registers.cs(),
                self.state.decode_at
            );
            return Ok(());
        }

        let value = self.pop();
        self.registers.set_cs(value);
        Ok(())
    }

    // 27
    fn op_daa(&mut self) -> Result<()> {
        let al = calc::daa(self.registers.al(), &mut self.registers.flags);
        self.registers.set_al(al);
        Ok(())
    }

    // 2F
    fn op_das(&mut self) -> Result<()> {
        let al = calc::das(self.registers.al(), &mut self.registers.flags);
        self.registers.set_al(al);
        Ok(())
    }

    // 37
    fn op_aaa(&mut self) -> Result<()> {
        let ax = calc::aaa(self.registers.ax(), &mut self.registers.flags);
        self.registers.set_ax(ax);
        Ok(())
    }

    // 3F
    fn op_aas(&mut self) -> Result<()> {
        let ax = calc::aas(self.registers.ax(), &mut self.registers.flags);
        self.registers.set_ax(ax);
        Ok(())
    }

    // 40..47
    fn op_inc_reg16(&mut self) -> Result<()> {
        let encoding = self.state.op_code & 0b111;
        let value = calc::word::inc(self.registers.word(encoding), &mut self.registers.flags);
        self.registers.set_word(encoding, value);
        Ok(())
    }

    // 48..4F
    fn op_dec_reg16(&mut self) -> Result<()> {
        let encoding = self.state.op_code & 0b111;
        let value = calc::word::dec(self.registers.word(encoding), &mut self.registers.flags);
        self.registers.set_word(encoding, value);
        Ok(())
    }

    // 50..57
    fn op_push_reg16(&mut self) -> Result<()> {
        let value = self.registers.word(self.state.op_code & 0b111);
        self.push(value);
        Ok(())
    }

    // 58..5F
    fn op_pop_reg16(&mut self) -> Result<()> {
        let value = self.pop();
        self.registers.set_word(self.state.op_code & 0b111, value);
        Ok(())
    }

    // 60
    fn op_pusha(&mut self) -> Result<()> {
        let sp = self.registers.sp();
        for encoding in 0..8 {
            let value = if encoding == 4 {
                sp
            } else {
                self.registers.word(encoding)
            };
            self.push(value);
        }
        Ok(())
    }

    // 61
    fn op_popa(&mut self) -> Result<()> {
        for encoding in (0..8).rev() {
            let value = self.pop();
            // The saved SP is discarded.
            if encoding != 4 {
                self.registers.set_word(encoding, value);
            }
        }
        Ok(())
    }

    // 62
    fn op_bound(&mut self) -> Result<()> {
        let (reg, rm) = self.mod_reg_rm();
        let Some(at) = rm.address() else {
            return self.invalid_opcode();
        };

        let index = self.registers.word(reg) as i16;
        let lower = self.read_memory_word(at) as i16;
        let upper = self.read_memory_word(at.add_offset(2)) as i16;

        if index < lower || index > upper {
            self.interrupt(5)?;
        }

        Ok(())
    }

    // 68
    fn op_push_imm16(&mut self) -> Result<()> {
        let value = self.fetch_word();
        self.push(value);
        Ok(())
    }

    // 69 6B
    fn op_imul_reg16_rm16_imm(&mut self) -> Result<()> {
        let (reg, rm) = self.mod_reg_rm();
        let a = self.load_word(rm);
        let b = if self.state.to_register {
            self.fetch() as i8 as u16
        } else {
            self.fetch_word()
        };

        let result = calc::word::imul(a, b, &mut self.registers.flags);
        self.registers.set_word(reg, result as u16);

        Ok(())
    }

    // 6A
    fn op_push_imm8(&mut self) -> Result<()> {
        let value = self.fetch() as i8 as u16;
        self.push(value);
        Ok(())
    }

    fn jump_if(&mut self, condition: impl FnOnce(Flags) -> bool) -> Result<()> {
        let displacement = self.fetch() as i8 as u16;
        if condition(self.registers.flags) {
            self.registers.ip = self.registers.ip.wrapping_add(displacement);
        }
        Ok(())
    }

    // 70
    fn op_jo(&mut self) -> Result<()> {
        self.jump_if(|f| f.contains(Flags::OVERFLOW))
    }

    // 71
    fn op_jno(&mut self) -> Result<()> {
        self.jump_if(|f| !f.contains(Flags::OVERFLOW))
    }

    // 72
    fn op_jb(&mut self) -> Result<()> {
        self.jump_if(|f| f.contains(Flags::CARRY))
    }

    // 73
    fn op_jnb(&mut self) -> Result<()> {
        self.jump_if(|f| !f.contains(Flags::CARRY))
    }

    // 74
    fn op_je(&mut self) -> Result<()> {
        self.jump_if(|f| f.contains(Flags::ZERO))
    }

    // 75
    fn op_jne(&mut self) -> Result<()> {
        self.jump_if(|f| !f.contains(Flags::ZERO))
    }

    // 76
    fn op_jbe(&mut self) -> Result<()> {
        self.jump_if(|f| f.intersects(Flags::CARRY | Flags::ZERO))
    }

    // 77
    fn op_jnbe(&mut self) -> Result<()> {
        self.jump_if(|f| !f.intersects(Flags::CARRY | Flags::ZERO))
    }

    // 78
    fn op_js(&mut self) -> Result<()> {
        self.jump_if(|f| f.contains(Flags::SIGN))
    }

    // 79
    fn op_jns(&mut self) -> Result<()> {
        self.jump_if(|f| !f.contains(Flags::SIGN))
    }

    // 7A
    fn op_jp(&mut self) -> Result<()> {
        self.jump_if(|f| f.contains(Flags::PARITY))
    }

    // 7B
    fn op_jnp(&mut self) -> Result<()> {
        self.jump_if(|f| !f.contains(Flags::PARITY))
    }

    // 7C
    fn op_jl(&mut self) -> Result<()> {
        self.jump_if(|f| f.contains(Flags::SIGN) != f.contains(Flags::OVERFLOW))
    }

    // 7D
    fn op_jnl(&mut self) -> Result<()> {
        self.jump_if(|f| f.contains(Flags::SIGN) == f.contains(Flags::OVERFLOW))
    }

    // 7E
    fn op_jle(&mut self) -> Result<()> {
        self.jump_if(|f| {
            f.contains(Flags::ZERO) || f.contains(Flags::SIGN) != f.contains(Flags::OVERFLOW)
        })
    }

    // 7F
    fn op_jnle(&mut self) -> Result<()> {
        self.jump_if(|f| {
            !f.contains(Flags::ZERO) && f.contains(Flags::SIGN) == f.contains(Flags::OVERFLOW)
        })
    }

    // 84 85
    fn op_test_rm_reg(&mut self) -> Result<()> {
        let (reg, rm) = self.mod_reg_rm();
        let reg = Location::Register(reg);

        if self.state.wide {
            let (a, b) = (self.load_word(rm), self.load_word(reg));
            calc::word::test(a, b, &mut self.registers.flags);
        } else {
            let (a, b) = (self.load_byte(rm), self.load_byte(reg));
            calc::byte::test(a, b, &mut self.registers.flags);
        }

        Ok(())
    }

    // 86 87
    fn op_xchg_rm_reg(&mut self) -> Result<()> {
        let (reg, rm) = self.mod_reg_rm();
        let reg = Location::Register(reg);

        if self.state.wide {
            let (a, b) = (self.load_word(reg), self.load_word(rm));
            self.store_word(reg, b);
            self.store_word(rm, a);
        } else {
            let (a, b) = (self.load_byte(reg), self.load_byte(rm));
            self.store_byte(reg, b);
            self.store_byte(rm, a);
        }

        Ok(())
    }

    // 88..8B
    fn op_mov_rm_reg(&mut self) -> Result<()> {
        let (destination, source) = self.operands();

        if self.state.wide {
            let value = self.load_word(source);
            self.store_word(destination, value);
        } else {
            let value = self.load_byte(source);
            self.store_byte(destination, value);
        }

        Ok(())
    }

    // 8C
    fn op_mov_rm16_seg(&mut self) -> Result<()> {
        let (reg, rm) = self.mod_reg_rm();
        let value = self.load_word(Location::Segment(reg & 0b11));
        self.store_word(rm, value);
        Ok(())
    }

    // 8D
    fn op_lea(&mut self) -> Result<()> {
        let (reg, rm) = self.mod_reg_rm();
        let Some(at) = rm.address() else {
            return self.invalid_opcode();
        };
        self.registers.set_word(reg, at.offset);
        Ok(())
    }

    // 8E
    fn op_mov_seg_rm16(&mut self) -> Result<()> {
        let (reg, rm) = self.mod_reg_rm();
        let value = self.load_word(rm);
        self.store_word(Location::Segment(reg & 0b11), value);
        Ok(())
    }

    // 8F
    fn op_pop_rm16(&mut self) -> Result<()> {
        let (_, rm) = self.mod_reg_rm();
        let value = self.pop();
        self.store_word(rm, value);
        Ok(())
    }

    // 90
    fn op_nop(&mut self) -> Result<()> {
        self.stats.nops += 1;
        Ok(())
    }

    // 91..97
    fn op_xchg_ax_reg16(&mut self) -> Result<()> {
        let encoding = self.state.op_code & 0b111;
        let value = self.registers.word(encoding);
        self.registers.set_word(encoding, self.registers.ax());
        self.registers.set_ax(value);
        Ok(())
    }

    // 98
    fn op_cbw(&mut self) -> Result<()> {
        let value = self.registers.al() as i8 as u16;
        self.registers.set_ax(value);
        Ok(())
    }

    // 99
    fn op_cwd(&mut self) -> Result<()> {
        let value = if self.registers.ax() & 0x8000 != 0 {
            0xFFFF
        } else {
            0x0000
        };
        self.registers.set_dx(value);
        Ok(())
    }

    // 9A
    fn op_call_far(&mut self) -> Result<()> {
        let ip = self.fetch_word();
        let cs = self.fetch_word();

        self.push(self.registers.cs());
        self.push(self.registers.ip);

        self.registers.ip = ip;
        self.registers.set_cs(cs);

        Ok(())
    }

    // 9B
    fn op_wait(&mut self) -> Result<()> {
        Ok(())
    }

    // 9C
    fn op_pushf(&mut self) -> Result<()> {
        self.push(self.registers.flags.store());
        Ok(())
    }

    // 9D
    fn op_popf(&mut self) -> Result<()> {
        let value = self.pop();
        self.registers.flags = Flags::load(value);
        Ok(())
    }

    // 9E
    fn op_sahf(&mut self) -> Result<()> {
        let low = Flags::from_bits_truncate(self.registers.ah() as u16) & Flags::LOW_BYTE;
        self.registers.flags = (self.registers.flags - Flags::LOW_BYTE) | low;
        Ok(())
    }

    // 9F
    fn op_lahf(&mut self) -> Result<()> {
        self.registers.set_ah(self.registers.flags.store() as u8);
        Ok(())
    }

    // A0..A3
    fn op_mov_acc_moffs(&mut self) -> Result<()> {
        let offset = self.fetch_word();
        let memory = Location::Memory(SegmentAndOffset::new(
            self.segment_or(Segment::DS),
            offset,
        ));

        let (destination, source) = if self.state.to_register {
            (memory, ACCUMULATOR)
        } else {
            (ACCUMULATOR, memory)
        };

        if self.state.wide {
            let value = self.load_word(source);
            self.store_word(destination, value);
        } else {
            let value = self.load_byte(source);
            self.store_byte(destination, value);
        }

        Ok(())
    }

    // A8 A9
    fn op_test_acc_imm(&mut self) -> Result<()> {
        if self.state.wide {
            let value = self.fetch_word();
            calc::word::test(self.registers.ax(), value, &mut self.registers.flags);
        } else {
            let value = self.fetch();
            calc::byte::test(self.registers.al(), value, &mut self.registers.flags);
        }
        Ok(())
    }

    // B0..B7
    fn op_mov_reg8_imm8(&mut self) -> Result<()> {
        let value = self.fetch();
        self.registers.set_byte(self.state.op_code & 0b111, value);
        Ok(())
    }

    // B8..BF
    fn op_mov_reg16_imm16(&mut self) -> Result<()> {
        let value = self.fetch_word();
        self.registers.set_word(self.state.op_code & 0b111, value);
        Ok(())
    }

    // C2
    fn op_ret_imm16(&mut self) -> Result<()> {
        let size = self.fetch_word();
        self.registers.ip = self.pop();
        let sp = self.registers.sp().wrapping_add(size);
        self.registers.set_sp(sp);
        Ok(())
    }

    // C3
    fn op_ret(&mut self) -> Result<()> {
        self.registers.ip = self.pop();
        Ok(())
    }

    /// Load a far pointer from memory into `reg` and `segment`.
    fn load_far_pointer(&mut self, segment: Segment) -> Result<()> {
        let (reg, rm) = self.mod_reg_rm();
        let Some(at) = rm.address() else {
            return self.invalid_opcode();
        };

        let offset = self.read_memory_word(at);
        let value = self.read_memory_word(at.add_offset(2));
        self.registers.set_word(reg, offset);
        self.registers.set_segment(segment, value);

        Ok(())
    }

    // C4
    fn op_les(&mut self) -> Result<()> {
        self.load_far_pointer(Segment::ES)
    }

    // C5
    fn op_lds(&mut self) -> Result<()> {
        self.load_far_pointer(Segment::DS)
    }

    // C6 C7
    fn op_mov_rm_imm(&mut self) -> Result<()> {
        let (_, rm) = self.mod_reg_rm();

        if self.state.wide {
            let value = self.fetch_word();
            self.store_word(rm, value);
        } else {
            let value = self.fetch();
            self.store_byte(rm, value);
        }

        Ok(())
    }

    // C8
    fn op_enter(&mut self) -> Result<()> {
        let size = self.fetch_word();
        let level = self.fetch() & 0x1F;

        self.push(self.registers.bp());
        let frame = self.registers.sp();

        if level > 0 {
            for _ in 1..level {
                let bp = self.registers.bp().wrapping_sub(2);
                self.registers.set_bp(bp);
                let value =
                    self.read_memory_word(SegmentAndOffset::new(self.registers.ss(), bp));
                self.push(value);
            }
            self.push(frame);
        }

        self.registers.set_bp(frame);
        let sp = self.registers.sp().wrapping_sub(size);
        self.registers.set_sp(sp);

        Ok(())
    }

    // C9
    fn op_leave(&mut self) -> Result<()> {
        self.registers.set_sp(self.registers.bp());
        let bp = self.pop();
        self.registers.set_bp(bp);
        Ok(())
    }

    // CA
    fn op_retf_imm16(&mut self) -> Result<()> {
        let size = self.fetch_word();
        self.op_retf()?;
        let sp = self.registers.sp().wrapping_add(size);
        self.registers.set_sp(sp);
        Ok(())
    }

    // CB
    fn op_retf(&mut self) -> Result<()> {
        self.registers.ip = self.pop();
        let cs = self.pop();
        self.registers.set_cs(cs);
        Ok(())
    }

    // CC
    fn op_int3(&mut self) -> Result<()> {
        self.interrupt(3)
    }

    // CD
    fn op_int_imm8(&mut self) -> Result<()> {
        let vector = self.fetch();
        self.interrupt(vector)
    }

    // CE
    fn op_into(&mut self) -> Result<()> {
        if self.registers.flags.contains(Flags::OVERFLOW) {
            self.interrupt(4)?;
        }
        Ok(())
    }

    // CF
    fn op_iret(&mut self) -> Result<()> {
        self.registers.ip = self.pop();
        let cs = self.pop();
        self.registers.set_cs(cs);
        let flags = self.pop();
        self.registers.flags = Flags::load(flags);
        Ok(())
    }

    // D4
    fn op_aam(&mut self) -> Result<()> {
        let base = self.fetch();
        match calc::aam(self.registers.al(), base, &mut self.registers.flags) {
            Some(ax) => {
                self.registers.set_ax(ax);
                Ok(())
            }
            None => self.divide_fault(),
        }
    }

    // D5
    fn op_aad(&mut self) -> Result<()> {
        let base = self.fetch();
        let ax = calc::aad(self.registers.ax(), base, &mut self.registers.flags);
        self.registers.set_ax(ax);
        Ok(())
    }

    // D6
    fn op_salc(&mut self) -> Result<()> {
        if self.config.is_v20() {
            return self.op_xlat();
        }

        let value = if self.registers.flags.contains(Flags::CARRY) {
            0xFF
        } else {
            0x00
        };
        self.registers.set_al(value);
        Ok(())
    }

    // D7
    fn op_xlat(&mut self) -> Result<()> {
        let offset = self
            .registers
            .bx()
            .wrapping_add(self.registers.al() as u16);
        let at = SegmentAndOffset::new(self.segment_or(Segment::DS), offset);
        let value = self.read_memory_byte(at);
        self.registers.set_al(value);
        Ok(())
    }

    // D8..DF
    fn op_esc(&mut self) -> Result<()> {
        // No coprocessor. Only the operand bytes are consumed.
        self.mod_reg_rm();
        Ok(())
    }

    /// Decrement CX and take the short jump when CX is still non-zero and `condition` holds.
    fn loop_while(&mut self, condition: impl FnOnce(Flags) -> bool) -> Result<()> {
        let cx = self.registers.cx().wrapping_sub(1);
        self.registers.set_cx(cx);
        self.jump_if(|f| cx != 0 && condition(f))
    }

    // E0
    fn op_loopnz(&mut self) -> Result<()> {
        self.loop_while(|f| !f.contains(Flags::ZERO))
    }

    // E1
    fn op_loopz(&mut self) -> Result<()> {
        self.loop_while(|f| f.contains(Flags::ZERO))
    }

    // E2
    fn op_loop(&mut self) -> Result<()> {
        self.loop_while(|_| true)
    }

    // E3
    fn op_jcxz(&mut self) -> Result<()> {
        let cx = self.registers.cx();
        self.jump_if(|_| cx == 0)
    }

    fn input(&mut self, port: Port) {
        if self.state.wide {
            let value = self.in_word(port);
            self.registers.set_ax(value);
        } else {
            let value = self.in_byte(port);
            self.registers.set_al(value);
        }
    }

    fn output(&mut self, port: Port) {
        if self.state.wide {
            self.out_word(port, self.registers.ax());
        } else {
            self.out_byte(port, self.registers.al());
        }
    }

    // E4 E5
    fn op_in_acc_imm8(&mut self) -> Result<()> {
        let port = self.fetch() as Port;
        self.input(port);
        Ok(())
    }

    // E6 E7
    fn op_out_imm8_acc(&mut self) -> Result<()> {
        let port = self.fetch() as Port;
        self.output(port);
        Ok(())
    }

    // E8
    fn op_call_rel16(&mut self) -> Result<()> {
        let displacement = self.fetch_word();
        self.push(self.registers.ip);
        self.registers.ip = self.registers.ip.wrapping_add(displacement);
        Ok(())
    }

    // E9
    fn op_jmp_rel16(&mut self) -> Result<()> {
        let displacement = self.fetch_word();
        self.registers.ip = self.registers.ip.wrapping_add(displacement);
        Ok(())
    }

    // EA
    fn op_jmp_far(&mut self) -> Result<()> {
        let ip = self.fetch_word();
        let cs = self.fetch_word();
        self.registers.ip = ip;
        self.registers.set_cs(cs);
        Ok(())
    }

    // EB
    fn op_jmp_rel8(&mut self) -> Result<()> {
        self.jump_if(|_| true)
    }

    // EC ED
    fn op_in_acc_dx(&mut self) -> Result<()> {
        self.input(self.registers.dx());
        Ok(())
    }

    // EE EF
    fn op_out_dx_acc(&mut self) -> Result<()> {
        self.output(self.registers.dx());
        Ok(())
    }

    // F4
    fn op_hlt(&mut self) -> Result<()> {
        self.state.halted = true;
        self.registers.ip = self.registers.ip.wrapping_sub(1);
        Ok(())
    }

    // F5
    fn op_cmc(&mut self) -> Result<()> {
        self.registers.flags.toggle(Flags::CARRY);
        Ok(())
    }

    // F8
    fn op_clc(&mut self) -> Result<()> {
        self.registers.flags.remove(Flags::CARRY);
        Ok(())
    }

    // F9
    fn op_stc(&mut self) -> Result<()> {
        self.registers.flags.insert(Flags::CARRY);
        Ok(())
    }

    // FA
    fn op_cli(&mut self) -> Result<()> {
        self.registers.flags.remove(Flags::INTERRUPT);
        Ok(())
    }

    // FB
    fn op_sti(&mut self) -> Result<()> {
        self.registers.flags.insert(Flags::INTERRUPT);
        Ok(())
    }

    // FC
    fn op_cld(&mut self) -> Result<()> {
        self.registers.flags.remove(Flags::DIRECTION);
        Ok(())
    }

    // FD
    fn op_std(&mut self) -> Result<()> {
        self.registers.flags.insert(Flags::DIRECTION);
        Ok(())
    }
}
