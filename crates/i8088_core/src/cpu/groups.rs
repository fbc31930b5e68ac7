//! Instruction families that pick their operation from the `reg` field of the ModRM byte.

use super::calc::{self, Shift};
use super::decode::Location;
use super::Intel8088;
use crate::error::Result;
use crate::registers::Flags;

impl Intel8088 {
    // 80..83
    pub(crate) fn op_group_1(&mut self) -> Result<()> {
        let (operation, rm) = self.mod_reg_rm();

        match self.state.op_code {
            0x81 => {
                let value = self.fetch_word();
                self.alu_word(operation, rm, value);
            }
            0x83 => {
                let value = self.fetch() as i8 as u16;
                self.alu_word(operation, rm, value);
            }
            // 0x82 is an alias of 0x80.
            _ => {
                let value = self.fetch();
                self.alu_byte(operation, rm, value);
            }
        }

        Ok(())
    }

    // D0..D3
    pub(crate) fn op_group_2(&mut self) -> Result<()> {
        let (operation, rm) = self.mod_reg_rm();
        let count = if self.state.op_code & 0b10 != 0 {
            self.registers.cl()
        } else {
            1
        };
        self.shift(operation, rm, count)
    }

    // C0 C1
    pub(crate) fn op_group_2_imm8(&mut self) -> Result<()> {
        let (operation, rm) = self.mod_reg_rm();
        let count = self.fetch();
        self.shift(operation, rm, count)
    }

    fn shift(&mut self, operation: u8, rm: Location, count: u8) -> Result<()> {
        let Some(operation) = Shift::from_encoding(operation) else {
            return self.invalid_opcode();
        };

        let count = if self.config.is_v20() {
            count & 0x1F
        } else {
            count
        };

        if self.state.wide {
            let value = self.load_word(rm);
            let result = calc::word::shift(operation, value, count, &mut self.registers.flags);
            self.store_word(rm, result);
        } else {
            let value = self.load_byte(rm);
            let result = calc::byte::shift(operation, value, count, &mut self.registers.flags);
            self.store_byte(rm, result);
        }

        Ok(())
    }

    /// The 8088 always clears ZF after a multiply.
    fn multiply_quirks(&mut self) {
        if !self.config.is_v20() {
            self.registers.flags.remove(Flags::ZERO);
        }
    }

    // F6 F7
    pub(crate) fn op_group_3(&mut self) -> Result<()> {
        let (operation, rm) = self.mod_reg_rm();

        if self.state.wide {
            self.group_3_word(operation, rm)
        } else {
            self.group_3_byte(operation, rm)
        }
    }

    fn group_3_byte(&mut self, operation: u8, rm: Location) -> Result<()> {
        let value = self.load_byte(rm);

        match operation {
            // TEST r/m8, imm8 (1 is an undocumented alias)
            0 | 1 => {
                let imm = self.fetch();
                calc::byte::test(value, imm, &mut self.registers.flags);
            }
            // NOT
            2 => self.store_byte(rm, !value),
            // NEG
            3 => {
                let result = calc::byte::neg(value, &mut self.registers.flags);
                self.store_byte(rm, result);
            }
            // MUL
            4 => {
                let result = calc::byte::mul(self.registers.al(), value, &mut self.registers.flags);
                self.registers.set_ax(result);
                self.multiply_quirks();
            }
            // IMUL
            5 => {
                let result = calc::byte::imul(
                    self.registers.al(),
                    value,
                    &mut self.registers.flags,
                );
                self.registers.set_ax(result);
                self.multiply_quirks();
            }
            // DIV
            6 => match calc::byte::div(self.registers.ax(), value) {
                Some((quotient, remainder)) => {
                    self.registers.set_al(quotient);
                    self.registers.set_ah(remainder);
                }
                None => return self.divide_fault(),
            },
            // IDIV
            _ => match calc::byte::idiv(self.registers.ax(), value) {
                Some((quotient, remainder)) => {
                    self.registers.set_al(quotient);
                    self.registers.set_ah(remainder);
                }
                None => return self.divide_fault(),
            },
        }

        Ok(())
    }

    fn group_3_word(&mut self, operation: u8, rm: Location) -> Result<()> {
        let value = self.load_word(rm);
        let dividend = ((self.registers.dx() as u32) << 16) | self.registers.ax() as u32;

        match operation {
            0 | 1 => {
                let imm = self.fetch_word();
                calc::word::test(value, imm, &mut self.registers.flags);
            }
            2 => self.store_word(rm, !value),
            3 => {
                let result = calc::word::neg(value, &mut self.registers.flags);
                self.store_word(rm, result);
            }
            4 => {
                let result = calc::word::mul(self.registers.ax(), value, &mut self.registers.flags);
                self.registers.set_ax(result as u16);
                self.registers.set_dx((result >> 16) as u16);
                self.multiply_quirks();
            }
            5 => {
                let result = calc::word::imul(
                    self.registers.ax(),
                    value,
                    &mut self.registers.flags,
                );
                self.registers.set_ax(result as u16);
                self.registers.set_dx((result >> 16) as u16);
                self.multiply_quirks();
            }
            6 => match calc::word::div(dividend, value) {
                Some((quotient, remainder)) => {
                    self.registers.set_ax(quotient);
                    self.registers.set_dx(remainder);
                }
                None => return self.divide_fault(),
            },
            _ => match calc::word::idiv(dividend, value) {
                Some((quotient, remainder)) => {
                    self.registers.set_ax(quotient);
                    self.registers.set_dx(remainder);
                }
                None => return self.divide_fault(),
            },
        }

        Ok(())
    }

    // FE
    pub(crate) fn op_group_4(&mut self) -> Result<()> {
        let (operation, rm) = self.mod_reg_rm();
        let value = self.load_byte(rm);

        let result = match operation {
            0 => calc::byte::inc(value, &mut self.registers.flags),
            1 => calc::byte::dec(value, &mut self.registers.flags),
            _ => return self.invalid_opcode(),
        };
        self.store_byte(rm, result);

        Ok(())
    }

    // FF
    pub(crate) fn op_group_5(&mut self) -> Result<()> {
        let (operation, rm) = self.mod_reg_rm();

        match operation {
            // INC
            0 => {
                let value = self.load_word(rm);
                let result = calc::word::inc(value, &mut self.registers.flags);
                self.store_word(rm, result);
            }
            // DEC
            1 => {
                let value = self.load_word(rm);
                let result = calc::word::dec(value, &mut self.registers.flags);
                self.store_word(rm, result);
            }
            // CALL near
            2 => {
                let target = self.load_word(rm);
                self.push(self.registers.ip);
                self.registers.ip = target;
            }
            // CALL far
            3 => {
                let Some(at) = rm.address() else {
                    return self.invalid_opcode();
                };
                let ip = self.read_memory_word(at);
                let cs = self.read_memory_word(at.add_offset(2));

                self.push(self.registers.cs());
                self.push(self.registers.ip);

                self.registers.ip = ip;
                self.registers.set_cs(cs);
            }
            // JMP near
            4 => self.registers.ip = self.load_word(rm),
            // JMP far
            5 => {
                let Some(at) = rm.address() else {
                    return self.invalid_opcode();
                };
                self.registers.ip = self.read_memory_word(at);
                let cs = self.read_memory_word(at.add_offset(2));
                self.registers.set_cs(cs);
            }
            // PUSH
            6 => {
                let value = self.load_word(rm);
                self.push(value);
            }
            _ => return self.invalid_opcode(),
        }

        Ok(())
    }
}
