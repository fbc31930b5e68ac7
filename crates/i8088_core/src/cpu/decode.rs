use super::Intel8088;
use crate::address::SegmentAndOffset;
use crate::processor::Processor;
use crate::registers::Segment;

/// Active repeat prefix of the instruction being decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Repeat {
    #[default]
    None,
    /// REPNE/REPNZ (0xF2)
    NotEqual,
    /// REP/REPE/REPZ (0xF3)
    Equal,
}

/// Everything decoded for the current instruction. Reset by [`Intel8088::parse_opcode`] at the
/// start of every step.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct InstructionState {
    pub op_code: u8,
    pub mod_reg_rm: u8,
    pub wide: bool,
    /// Bit 1 of the op code. When set the `reg` field is the destination.
    pub to_register: bool,
    pub segment_override: Option<Segment>,
    pub repeat: Repeat,
    pub cycles: usize,
    /// IP of the first prefix byte. Faults roll back to here.
    pub decode_at: u16,
    pub halted: bool,
}

/// Where an operand lives. Every instruction reads and writes its operands through this so the
/// register and memory forms share one implementation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Location {
    /// General register by its 3-bit encoding. Byte access uses the 8-bit register set.
    Register(u8),
    /// Segment register by its 2-bit encoding.
    Segment(u8),
    Memory(SegmentAndOffset),
}

impl Location {
    pub fn address(&self) -> Option<SegmentAndOffset> {
        match *self {
            Location::Memory(address) => Some(address),
            _ => None,
        }
    }
}

type EffectiveAddress = fn(&mut Intel8088) -> Location;

/// [BX+SI], [BX+DI], [BP+SI], [BP+DI], [SI], [DI], [BP], [BX] with an optional displacement.
fn memory<const RM: u8, const MOD: u8>(cpu: &mut Intel8088) -> Location {
    let displacement = match MOD {
        0b00 => 0,
        0b01 => cpu.fetch() as i8 as u16,
        _ => cpu.fetch_word(),
    };

    let r = &cpu.registers;
    let (base, default_segment) = match RM {
        0b000 => (r.bx().wrapping_add(r.si()), Segment::DS),
        0b001 => (r.bx().wrapping_add(r.di()), Segment::DS),
        0b010 => (r.bp().wrapping_add(r.si()), Segment::SS),
        0b011 => (r.bp().wrapping_add(r.di()), Segment::SS),
        0b100 => (r.si(), Segment::DS),
        0b101 => (r.di(), Segment::DS),
        0b110 => (r.bp(), Segment::SS),
        _ => (r.bx(), Segment::DS),
    };

    Location::Memory(SegmentAndOffset::new(
        cpu.segment_or(default_segment),
        base.wrapping_add(displacement),
    ))
}

/// mod=00 rm=110 is a plain 16-bit offset instead of [BP].
fn direct(cpu: &mut Intel8088) -> Location {
    let offset = cpu.fetch_word();
    Location::Memory(SegmentAndOffset::new(cpu.segment_or(Segment::DS), offset))
}

fn register<const RM: u8>(_: &mut Intel8088) -> Location {
    Location::Register(RM)
}

/// The 32 distinct addressing forms, indexed by `mod << 3 | rm`.
const FORMS: [EffectiveAddress; 32] = [
    memory::<0, 0b00>,
    memory::<1, 0b00>,
    memory::<2, 0b00>,
    memory::<3, 0b00>,
    memory::<4, 0b00>,
    memory::<5, 0b00>,
    direct,
    memory::<7, 0b00>,
    memory::<0, 0b01>,
    memory::<1, 0b01>,
    memory::<2, 0b01>,
    memory::<3, 0b01>,
    memory::<4, 0b01>,
    memory::<5, 0b01>,
    memory::<6, 0b01>,
    memory::<7, 0b01>,
    memory::<0, 0b10>,
    memory::<1, 0b10>,
    memory::<2, 0b10>,
    memory::<3, 0b10>,
    memory::<4, 0b10>,
    memory::<5, 0b10>,
    memory::<6, 0b10>,
    memory::<7, 0b10>,
    register::<0>,
    register::<1>,
    register::<2>,
    register::<3>,
    register::<4>,
    register::<5>,
    register::<6>,
    register::<7>,
];

const fn build_effective_address_table() -> [EffectiveAddress; 0x100] {
    let mut table: [EffectiveAddress; 0x100] = [FORMS[0]; 0x100];
    let mut i = 0;
    while i < 0x100 {
        table[i] = FORMS[((i >> 3) & 0b11000) | (i & 0b111)];
        i += 1;
    }
    table
}

/// Effective address calculation, indexed by `mod_reg_rm & 0xC7`.
static EFFECTIVE_ADDRESS: [EffectiveAddress; 0x100] = build_effective_address_table();

impl Intel8088 {
    /// Consume prefix bytes until the op code is found.
    pub(crate) fn parse_opcode(&mut self) {
        self.state.segment_override = None;
        self.state.repeat = Repeat::None;
        self.state.decode_at = self.registers.ip;

        let op_code = loop {
            match self.fetch() {
                0x26 => self.state.segment_override = Some(Segment::ES),
                0x2E => self.state.segment_override = Some(Segment::CS),
                0x36 => self.state.segment_override = Some(Segment::SS),
                0x3E => self.state.segment_override = Some(Segment::DS),
                // LOCK and its undocumented alias.
                0xF0 | 0xF1 => {}
                0xF2 => self.state.repeat = Repeat::NotEqual,
                0xF3 => self.state.repeat = Repeat::Equal,
                op_code => break op_code,
            }
        };

        self.state.op_code = op_code;
        self.state.wide = op_code & 0b01 != 0;
        self.state.to_register = op_code & 0b10 != 0;
    }

    #[inline(always)]
    pub(crate) fn fetch(&mut self) -> u8 {
        let at = SegmentAndOffset::new(self.registers.cs(), self.registers.ip);
        self.registers.ip = self.registers.ip.wrapping_add(1);
        self.read_byte(at.flat())
    }

    #[inline(always)]
    pub(crate) fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch();
        let hi = self.fetch();
        u16::from_le_bytes([lo, hi])
    }

    /// Return the overriding segment value for this instruction, or `default` when there is no
    /// override prefix.
    #[inline(always)]
    pub(crate) fn segment_or(&self, default: Segment) -> u16 {
        self.registers
            .segment(self.state.segment_override.unwrap_or(default))
    }

    /// Read the ModRM byte and resolve it to `(reg, rm)`. Consumes the ModRM byte and any
    /// displacement, so call it exactly once per instruction and before fetching an immediate.
    pub(crate) fn mod_reg_rm(&mut self) -> (u8, Location) {
        self.state.mod_reg_rm = self.fetch();
        let reg = (self.state.mod_reg_rm >> 3) & 0b111;
        let rm = EFFECTIVE_ADDRESS[(self.state.mod_reg_rm & 0xC7) as usize](self);
        (reg, rm)
    }

    /// Decode the ModRM byte into `(destination, source)` following the direction bit.
    pub(crate) fn operands(&mut self) -> (Location, Location) {
        let (reg, rm) = self.mod_reg_rm();
        if self.state.to_register {
            (Location::Register(reg), rm)
        } else {
            (rm, Location::Register(reg))
        }
    }

    pub(crate) fn read_memory_byte(&mut self, at: SegmentAndOffset) -> u8 {
        self.read_byte(at.flat())
    }

    pub(crate) fn write_memory_byte(&mut self, at: SegmentAndOffset, value: u8) {
        self.write_byte(at.flat(), value)
    }

    /// The high byte comes from the next offset in the same segment.
    pub(crate) fn read_memory_word(&mut self, at: SegmentAndOffset) -> u16 {
        let lo = self.read_byte(at.flat());
        let hi = self.read_byte(at.add_offset(1).flat());
        u16::from_le_bytes([lo, hi])
    }

    pub(crate) fn write_memory_word(&mut self, at: SegmentAndOffset, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(at.flat(), lo);
        self.write_byte(at.add_offset(1).flat(), hi);
    }

    pub(crate) fn load_byte(&mut self, location: Location) -> u8 {
        match location {
            Location::Register(encoding) => self.registers.byte(encoding),
            Location::Segment(encoding) => self.registers.segment_by_encoding(encoding) as u8,
            Location::Memory(at) => self.read_memory_byte(at),
        }
    }

    pub(crate) fn store_byte(&mut self, location: Location, value: u8) {
        match location {
            Location::Register(encoding) => self.registers.set_byte(encoding, value),
            Location::Segment(encoding) => {
                let word = self.registers.segment_by_encoding(encoding);
                self.registers
                    .set_segment_by_encoding(encoding, (word & 0xFF00) | value as u16);
            }
            Location::Memory(at) => self.write_memory_byte(at, value),
        }
    }

    pub(crate) fn load_word(&mut self, location: Location) -> u16 {
        match location {
            Location::Register(encoding) => self.registers.word(encoding),
            Location::Segment(encoding) => self.registers.segment_by_encoding(encoding),
            Location::Memory(at) => self.read_memory_word(at),
        }
    }

    pub(crate) fn store_word(&mut self, location: Location, value: u16) {
        match location {
            Location::Register(encoding) => self.registers.set_word(encoding, value),
            Location::Segment(encoding) => self.registers.set_segment_by_encoding(encoding, value),
            Location::Memory(at) => self.write_memory_word(at, value),
        }
    }
}
