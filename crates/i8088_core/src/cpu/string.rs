//! String primitives and the REP loop that drives them.

use super::calc;
use super::decode::Repeat;
use super::Intel8088;
use crate::address::SegmentAndOffset;
use crate::error::Result;
use crate::processor::Processor;
use crate::registers::{Flags, Segment};

impl Intel8088 {
    /// Whether the decoded op code honours a REP prefix.
    pub(crate) fn is_repeatable(&self) -> bool {
        match self.state.op_code {
            0xA4..=0xA7 | 0xAA..=0xAF => true,
            0x6C..=0x6F => self.config.is_v20(),
            _ => false,
        }
    }

    /// Run the decoded string primitive CX times. CMPS and SCAS stop early on the ZF condition
    /// of the prefix.
    pub(crate) fn repeat(&mut self) -> Result<()> {
        let compare = matches!(self.state.op_code, 0xA6 | 0xA7 | 0xAE | 0xAF);
        let ip = self.registers.ip;

        while self.registers.cx() != 0 {
            self.registers.ip = ip;
            self.execute()?;

            let cx = self.registers.cx().wrapping_sub(1);
            self.registers.set_cx(cx);

            if compare {
                let zero = self.registers.flags.contains(Flags::ZERO);
                let done = match self.state.repeat {
                    Repeat::NotEqual => zero,
                    Repeat::Equal => !zero,
                    Repeat::None => false,
                };
                if done {
                    break;
                }
            }
        }

        Ok(())
    }

    fn string_delta(&self) -> u16 {
        let size = if self.state.wide { 2 } else { 1 };
        if self.registers.flags.contains(Flags::DIRECTION) {
            0u16.wrapping_sub(size)
        } else {
            size
        }
    }

    fn advance_si(&mut self) {
        let si = self.registers.si().wrapping_add(self.string_delta());
        self.registers.set_si(si);
    }

    fn advance_di(&mut self) {
        let di = self.registers.di().wrapping_add(self.string_delta());
        self.registers.set_di(di);
    }

    /// DS:SI, the segment can be overridden.
    fn string_source(&self) -> SegmentAndOffset {
        SegmentAndOffset::new(self.segment_or(Segment::DS), self.registers.si())
    }

    /// ES:DI, never overridden.
    fn string_destination(&self) -> SegmentAndOffset {
        SegmentAndOffset::new(self.registers.es(), self.registers.di())
    }

    // A4 A5
    pub(crate) fn op_movs(&mut self) -> Result<()> {
        let (source, destination) = (self.string_source(), self.string_destination());

        if self.state.wide {
            let value = self.read_memory_word(source);
            self.write_memory_word(destination, value);
        } else {
            let value = self.read_memory_byte(source);
            self.write_memory_byte(destination, value);
        }

        self.advance_si();
        self.advance_di();
        Ok(())
    }

    // A6 A7
    pub(crate) fn op_cmps(&mut self) -> Result<()> {
        let (source, destination) = (self.string_source(), self.string_destination());

        if self.state.wide {
            let a = self.read_memory_word(source);
            let b = self.read_memory_word(destination);
            calc::word::sub(a, b, false, &mut self.registers.flags);
        } else {
            let a = self.read_memory_byte(source);
            let b = self.read_memory_byte(destination);
            calc::byte::sub(a, b, false, &mut self.registers.flags);
        }

        self.advance_si();
        self.advance_di();
        Ok(())
    }

    // AA AB
    pub(crate) fn op_stos(&mut self) -> Result<()> {
        let destination = self.string_destination();

        if self.state.wide {
            self.write_memory_word(destination, self.registers.ax());
        } else {
            self.write_memory_byte(destination, self.registers.al());
        }

        self.advance_di();
        Ok(())
    }

    // AC AD
    pub(crate) fn op_lods(&mut self) -> Result<()> {
        let source = self.string_source();

        if self.state.wide {
            let value = self.read_memory_word(source);
            self.registers.set_ax(value);
        } else {
            let value = self.read_memory_byte(source);
            self.registers.set_al(value);
        }

        self.advance_si();
        Ok(())
    }

    // AE AF
    pub(crate) fn op_scas(&mut self) -> Result<()> {
        let destination = self.string_destination();

        if self.state.wide {
            let value = self.read_memory_word(destination);
            calc::word::sub(self.registers.ax(), value, false, &mut self.registers.flags);
        } else {
            let value = self.read_memory_byte(destination);
            calc::byte::sub(self.registers.al(), value, false, &mut self.registers.flags);
        }

        self.advance_di();
        Ok(())
    }

    // 6C 6D
    pub(crate) fn op_ins(&mut self) -> Result<()> {
        let destination = self.string_destination();
        let port = self.registers.dx();

        if self.state.wide {
            let value = self.in_word(port);
            self.write_memory_word(destination, value);
        } else {
            let value = self.in_byte(port);
            self.write_memory_byte(destination, value);
        }

        self.advance_di();
        Ok(())
    }

    // 6E 6F
    pub(crate) fn op_outs(&mut self) -> Result<()> {
        let source = self.string_source();
        let port = self.registers.dx();

        if self.state.wide {
            let value = self.read_memory_word(source);
            self.out_word(port, value);
        } else {
            let value = self.read_memory_byte(source);
            self.out_byte(port, value);
        }

        self.advance_si();
        Ok(())
    }
}
