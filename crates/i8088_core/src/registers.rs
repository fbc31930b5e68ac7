use bitflags::bitflags;
use std::fmt::{Display, Formatter};

pub const AX: usize = 0b000;
pub const CX: usize = 0b001;
pub const DX: usize = 0b010;
pub const BX: usize = 0b011;
pub const SP: usize = 0b100;
pub const BP: usize = 0b101;
pub const SI: usize = 0b110;
pub const DI: usize = 0b111;

pub const ES: usize = 0b00;
pub const CS: usize = 0b01;
pub const SS: usize = 0b10;
pub const DS: usize = 0b11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ByteRegister {
    AL = 0,
    CL = 1,
    DL = 2,
    BL = 3,
    AH = 4,
    CH = 5,
    DH = 6,
    BH = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WordRegister {
    AX = 0,
    CX = 1,
    DX = 2,
    BX = 3,
    SP = 4,
    BP = 5,
    SI = 6,
    DI = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Segment {
    ES = 0,
    CS = 1,
    SS = 2,
    DS = 3,
}

bitflags! {
    #[derive(Default)]
    pub struct Flags : u16 {
        const CARRY = 1 << 0;
        const RESERVED_1 = 1 << 1;
        const PARITY = 1 << 2;
        const AUX_CARRY = 1 << 4;
        const ZERO = 1 << 6;
        const SIGN = 1 << 7;
        const TRAP = 1 << 8;
        const INTERRUPT = 1 << 9;
        const DIRECTION = 1 << 10;
        const OVERFLOW = 1 << 11;
    }
}

impl Flags {
    /// The nine flags that carry meaning. Everything else in the flags word is reserved.
    pub const SEMANTIC: Flags = Flags {
        bits: Flags::CARRY.bits
            | Flags::PARITY.bits
            | Flags::AUX_CARRY.bits
            | Flags::ZERO.bits
            | Flags::SIGN.bits
            | Flags::TRAP.bits
            | Flags::INTERRUPT.bits
            | Flags::DIRECTION.bits
            | Flags::OVERFLOW.bits,
    };

    /// The flags that live in the low byte of the flags word (SAHF/LAHF).
    pub const LOW_BYTE: Flags = Flags {
        bits: Flags::CARRY.bits
            | Flags::PARITY.bits
            | Flags::AUX_CARRY.bits
            | Flags::ZERO.bits
            | Flags::SIGN.bits,
    };

    /// Unpack a flags word as pushed on the stack.
    pub fn load(word: u16) -> Self {
        Self::from_bits_truncate(word) & Self::SEMANTIC
    }

    /// Pack the flags into the word format used by PUSHF/POPF/IRET. Reserved bit 1 is always
    /// set.
    pub fn store(self) -> u16 {
        ((self & Self::SEMANTIC) | Self::RESERVED_1).bits()
    }
}

pub trait RegisterAccess<T> {
    fn get_value(&self, registers: &Registers) -> T;
    fn set_value(&self, registers: &mut Registers, value: T);
}

impl RegisterAccess<u8> for ByteRegister {
    #[inline(always)]
    fn get_value(&self, registers: &Registers) -> u8 {
        registers.byte(*self as u8)
    }

    #[inline(always)]
    fn set_value(&self, registers: &mut Registers, value: u8) {
        registers.set_byte(*self as u8, value)
    }
}

impl RegisterAccess<u16> for WordRegister {
    #[inline(always)]
    fn get_value(&self, registers: &Registers) -> u16 {
        registers.word(*self as u8)
    }

    #[inline(always)]
    fn set_value(&self, registers: &mut Registers, value: u16) {
        registers.set_word(*self as u8, value)
    }
}

macro_rules! word_accessors {
    ($($get:ident, $set:ident => $array:ident[$index:expr];)*) => {
        $(
            #[inline(always)]
            pub fn $get(&self) -> u16 {
                self.$array[$index]
            }

            #[inline(always)]
            pub fn $set(&mut self, value: u16) {
                self.$array[$index] = value;
            }
        )*
    };
}

macro_rules! byte_accessors {
    ($($get:ident, $set:ident => $register:ident;)*) => {
        $(
            #[inline(always)]
            pub fn $get(&self) -> u8 {
                self.byte(ByteRegister::$register as u8)
            }

            #[inline(always)]
            pub fn $set(&mut self, value: u8) {
                self.set_byte(ByteRegister::$register as u8, value)
            }
        )*
    };
}

/// The programmer visible state of the processor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    words: [u16; 8],
    segments: [u16; 4],

    pub ip: u16,
    pub flags: Flags,

    /// Set when execution should stop for inspection.
    pub debug: bool,
}

impl Registers {
    word_accessors! {
        ax, set_ax => words[AX];
        cx, set_cx => words[CX];
        dx, set_dx => words[DX];
        bx, set_bx => words[BX];
        sp, set_sp => words[SP];
        bp, set_bp => words[BP];
        si, set_si => words[SI];
        di, set_di => words[DI];
        es, set_es => segments[ES];
        cs, set_cs => segments[CS];
        ss, set_ss => segments[SS];
        ds, set_ds => segments[DS];
    }

    byte_accessors! {
        al, set_al => AL;
        cl, set_cl => CL;
        dl, set_dl => DL;
        bl, set_bl => BL;
        ah, set_ah => AH;
        ch, set_ch => CH;
        dh, set_dh => DH;
        bh, set_bh => BH;
    }

    /// Clear every register. Flags end up in their packed reset state.
    pub fn reset(&mut self) {
        *self = Self::default();
        self.flags = Flags::load(Flags::empty().store());
    }

    #[inline(always)]
    pub fn register<T, A: RegisterAccess<T>>(&self, register: A) -> T {
        register.get_value(self)
    }

    #[inline(always)]
    pub fn set_register<T, A: RegisterAccess<T>>(&mut self, register: A, value: T) {
        register.set_value(self, value);
    }

    /// Read an 8-bit register by its 3-bit encoding (AL, CL, DL, BL, AH, CH, DH, BH).
    #[inline(always)]
    pub fn byte(&self, encoding: u8) -> u8 {
        let word = self.words[(encoding & 0b11) as usize];
        if encoding & 0b100 != 0 {
            (word >> 8) as u8
        } else {
            word as u8
        }
    }

    #[inline(always)]
    pub fn set_byte(&mut self, encoding: u8, value: u8) {
        let word = &mut self.words[(encoding & 0b11) as usize];
        *word = if encoding & 0b100 != 0 {
            (*word & 0x00FF) | ((value as u16) << 8)
        } else {
            (*word & 0xFF00) | value as u16
        };
    }

    /// Read a 16-bit general register by its 3-bit encoding.
    #[inline(always)]
    pub fn word(&self, encoding: u8) -> u16 {
        self.words[(encoding & 0b111) as usize]
    }

    #[inline(always)]
    pub fn set_word(&mut self, encoding: u8, value: u16) {
        self.words[(encoding & 0b111) as usize] = value;
    }

    #[inline(always)]
    pub fn segment(&self, segment: Segment) -> u16 {
        self.segments[segment as usize]
    }

    #[inline(always)]
    pub fn set_segment(&mut self, segment: Segment, value: u16) {
        self.segments[segment as usize] = value;
    }

    /// Read a segment register by its 2-bit encoding.
    #[inline(always)]
    pub fn segment_by_encoding(&self, encoding: u8) -> u16 {
        self.segments[(encoding & 0b11) as usize]
    }

    #[inline(always)]
    pub fn set_segment_by_encoding(&mut self, encoding: u8, value: u16) {
        self.segments[(encoding & 0b11) as usize] = value;
    }
}

impl Display for Registers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AX: {:04X} ", self.ax())?;
        write!(f, "BX: {:04X} ", self.bx())?;
        write!(f, "CX: {:04X} ", self.cx())?;
        write!(f, "DX: {:04X} ", self.dx())?;

        write!(f, "SP: {:04X} ", self.sp())?;
        write!(f, "BP: {:04X} ", self.bp())?;
        write!(f, "SI: {:04X} ", self.si())?;
        write!(f, "DI: {:04X} ", self.di())?;

        write!(f, "ES: {:04X} ", self.es())?;
        write!(f, "CS: {:04X} ", self.cs())?;
        write!(f, "SS: {:04X} ", self.ss())?;
        write!(f, "DS: {:04X} ", self.ds())?;

        write!(f, "IP: {:04X} ", self.ip)?;

        macro_rules! print_flag {
            ($name:ident,$flag:expr) => {{
                if self.flags.contains($flag) {
                    write!(f, "{}", stringify!($name))?;
                } else {
                    write!(f, ".")?;
                }
            }};
        }

        print_flag!(O, Flags::OVERFLOW);
        print_flag!(D, Flags::DIRECTION);
        print_flag!(I, Flags::INTERRUPT);
        print_flag!(T, Flags::TRAP);
        print_flag!(S, Flags::SIGN);
        print_flag!(Z, Flags::ZERO);
        print_flag!(A, Flags::AUX_CARRY);
        print_flag!(P, Flags::PARITY);
        print_flag!(C, Flags::CARRY);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_registers_alias_word_registers() {
        let mut registers = Registers::default();

        registers.set_ax(0x1234);
        assert_eq!(registers.al(), 0x34);
        assert_eq!(registers.ah(), 0x12);

        registers.set_bh(0xAB);
        registers.set_bl(0xCD);
        assert_eq!(registers.bx(), 0xABCD);

        registers.set_register(ByteRegister::DH, 0x80);
        assert_eq!(registers.register::<u16, _>(WordRegister::DX), 0x8000);

        registers.set_byte(0b101, 0x55); // CH
        assert_eq!(registers.cx(), 0x5500);
    }

    #[test]
    fn segments_by_encoding() {
        let mut registers = Registers::default();
        registers.set_segment_by_encoding(0b10, 0x3000);
        assert_eq!(registers.ss(), 0x3000);
        assert_eq!(registers.segment(Segment::SS), 0x3000);
        assert_eq!(registers.segment_by_encoding(0b110), 0x3000);
    }

    #[test]
    fn flags_round_trip_keeps_semantic_bits() {
        for value in 0..=u16::MAX {
            let stored = Flags::load(value).store();

            assert_eq!(stored & 0b10, 0b10);
            assert_eq!(stored & !0b10, value & Flags::SEMANTIC.bits());

            // A second pass changes nothing.
            assert_eq!(Flags::load(stored).store(), stored);
        }
    }

    #[test]
    fn reset_forces_reserved_bit_only() {
        let mut registers = Registers::default();
        registers.set_ax(0xFFFF);
        registers.set_cs(0xF000);
        registers.flags = Flags::all();
        registers.debug = true;

        registers.reset();

        assert_eq!(registers.ax(), 0);
        assert_eq!(registers.cs(), 0);
        assert!(!registers.debug);
        assert_eq!(registers.flags.store(), 0x0002);
    }

    #[test]
    fn display() {
        let mut registers = Registers::default();
        registers.set_ax(0x1234);
        registers.flags.insert(Flags::CARRY | Flags::ZERO);
        let text = registers.to_string();
        assert!(text.starts_with("AX: 1234 "));
        assert!(text.ends_with(".....Z..C"));
    }
}
