//! Flag computations for every instruction family. Nothing in here touches the bus or the
//! register file, so the results can be checked in isolation.

use crate::registers::Flags;

const PARITY_TABLE: [u8; 0x100] = [
    1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0,
    0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1,
    0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1,
    1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0,
    0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1,
    1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0,
    1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0,
    0, 1, 1, 0, 1, 0, 0, 1, 1, 0, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 0, 0, 1, 1, 0, 1, 0, 0, 1,
];

/// Even parity of the low 8 bits.
#[inline(always)]
pub fn parity(value: u8) -> bool {
    PARITY_TABLE[value as usize] == 1
}

/// ALU operations encoded in bits 3..5 of opcodes 00..3F and in the reg field of group 1.
pub const ADD: u8 = 0b000;
pub const OR: u8 = 0b001;
pub const ADC: u8 = 0b010;
pub const SBB: u8 = 0b011;
pub const AND: u8 = 0b100;
pub const SUB: u8 = 0b101;
pub const XOR: u8 = 0b110;
pub const CMP: u8 = 0b111;

/// Shift and rotate operations of group 2. Encoding 0b110 has no operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shift {
    Rol,
    Ror,
    Rcl,
    Rcr,
    Shl,
    Shr,
    Sar,
}

impl Shift {
    pub fn from_encoding(encoding: u8) -> Option<Self> {
        Some(match encoding & 0b111 {
            0b000 => Shift::Rol,
            0b001 => Shift::Ror,
            0b010 => Shift::Rcl,
            0b011 => Shift::Rcr,
            0b100 => Shift::Shl,
            0b101 => Shift::Shr,
            0b111 => Shift::Sar,
            _ => return None,
        })
    }
}

macro_rules! ops {
    () => {
        const BITS: u32 = Type::BITS;
        const SIGN_BIT: Type = 1 << (BITS - 1);
        const CARRY_MASK: u32 = !(Type::MAX as u32);
        const OVERFLOW_MASK: u32 = SIGN_BIT as u32;

        pub fn flags_from_value(value: Type, flags: &mut Flags) {
            flags.set(Flags::ZERO, value == 0);
            flags.set(Flags::SIGN, value & SIGN_BIT != 0);
            flags.set(Flags::PARITY, parity(value as u8));
        }

        fn flags_from_add(result: u32, a: u32, b: u32, flags: &mut Flags) {
            flags.set(Flags::CARRY, result & CARRY_MASK != 0);
            flags.set(Flags::AUX_CARRY, (a ^ b ^ result) & 0x10 == 0x10);
            flags.set(
                Flags::OVERFLOW,
                (result ^ a) & (result ^ b) & OVERFLOW_MASK == OVERFLOW_MASK,
            );
        }

        fn flags_from_sub(result: u32, a: u32, b: u32, flags: &mut Flags) {
            flags.set(Flags::CARRY, result & CARRY_MASK != 0);
            flags.set(Flags::AUX_CARRY, (a ^ b ^ result) & 0x10 != 0);
            flags.set(Flags::OVERFLOW, (result ^ a) & (a ^ b) & OVERFLOW_MASK != 0);
        }

        pub fn add(dst: Type, src: Type, carry: bool, flags: &mut Flags) -> Type {
            let (a, b) = (dst as u32, src as u32);
            let result = a + b + carry as u32;

            flags_from_add(result, a, b, flags);
            flags_from_value(result as Type, flags);

            result as Type
        }

        pub fn sub(dst: Type, src: Type, borrow: bool, flags: &mut Flags) -> Type {
            let (a, b) = (dst as u32, src as u32);
            let result = a.wrapping_sub(b).wrapping_sub(borrow as u32);

            flags_from_sub(result, a, b, flags);
            flags_from_value(result as Type, flags);

            result as Type
        }

        fn logic(result: Type, flags: &mut Flags) -> Type {
            flags.remove(Flags::CARRY | Flags::OVERFLOW);
            flags_from_value(result, flags);
            result
        }

        pub fn or(dst: Type, src: Type, flags: &mut Flags) -> Type {
            logic(dst | src, flags)
        }

        pub fn and(dst: Type, src: Type, flags: &mut Flags) -> Type {
            logic(dst & src, flags)
        }

        pub fn xor(dst: Type, src: Type, flags: &mut Flags) -> Type {
            logic(dst ^ src, flags)
        }

        pub fn test(dst: Type, src: Type, flags: &mut Flags) {
            logic(dst & src, flags);
        }

        /// Run one of the eight ALU operations. CMP returns `dst` untouched; callers must not
        /// write it back.
        pub fn alu(operation: u8, dst: Type, src: Type, flags: &mut Flags) -> Type {
            match operation & 0b111 {
                ADD => add(dst, src, false, flags),
                OR => or(dst, src, flags),
                ADC => {
                    let carry = flags.contains(Flags::CARRY);
                    add(dst, src, carry, flags)
                }
                SBB => {
                    let borrow = flags.contains(Flags::CARRY);
                    sub(dst, src, borrow, flags)
                }
                AND => and(dst, src, flags),
                SUB => sub(dst, src, false, flags),
                XOR => xor(dst, src, flags),
                _ => {
                    sub(dst, src, false, flags);
                    dst
                }
            }
        }

        /// Carry is left exactly as it was.
        pub fn inc(dst: Type, flags: &mut Flags) -> Type {
            let carry = flags.contains(Flags::CARRY);
            let result = add(dst, 1, false, flags);
            flags.set(Flags::CARRY, carry);
            result
        }

        /// Carry is left exactly as it was.
        pub fn dec(dst: Type, flags: &mut Flags) -> Type {
            let carry = flags.contains(Flags::CARRY);
            let result = sub(dst, 1, false, flags);
            flags.set(Flags::CARRY, carry);
            result
        }

        pub fn neg(src: Type, flags: &mut Flags) -> Type {
            let result = sub(0, src, false, flags);
            flags.set(Flags::CARRY, src != 0);
            result
        }

        /// Shift or rotate `value` by `count` bits, one bit at a time. A count of zero leaves the
        /// value and every flag alone.
        pub fn shift(operation: Shift, value: Type, count: u8, flags: &mut Flags) -> Type {
            if count == 0 {
                return value;
            }

            let original = value;
            let mut result = value;

            for _ in 0..count {
                let carry = flags.contains(Flags::CARRY);
                let (next, carry_out) = match operation {
                    Shift::Rol => (result.rotate_left(1), result & SIGN_BIT != 0),
                    Shift::Ror => (result.rotate_right(1), result & 1 != 0),
                    Shift::Rcl => ((result << 1) | carry as Type, result & SIGN_BIT != 0),
                    Shift::Rcr => (
                        (result >> 1) | if carry { SIGN_BIT } else { 0 },
                        result & 1 != 0,
                    ),
                    Shift::Shl => (result << 1, result & SIGN_BIT != 0),
                    Shift::Shr => (result >> 1, result & 1 != 0),
                    Shift::Sar => ((result >> 1) | (result & SIGN_BIT), result & 1 != 0),
                };
                result = next;
                flags.set(Flags::CARRY, carry_out);
            }

            let carry = flags.contains(Flags::CARRY);
            let top = result & SIGN_BIT != 0;
            let below_top = result & (SIGN_BIT >> 1) != 0;

            match operation {
                Shift::Rol | Shift::Rcl => flags.set(Flags::OVERFLOW, carry != top),
                Shift::Ror | Shift::Rcr => flags.set(Flags::OVERFLOW, top != below_top),
                Shift::Shl => {
                    flags.set(Flags::OVERFLOW, carry != top);
                    flags_from_value(result, flags);
                }
                Shift::Shr => {
                    flags.set(Flags::OVERFLOW, count == 1 && original & SIGN_BIT != 0);
                    flags_from_value(result, flags);
                }
                Shift::Sar => {
                    flags.remove(Flags::OVERFLOW);
                    flags_from_value(result, flags);
                }
            }

            result
        }

        /// Unsigned multiply. Carry and overflow report a non-zero upper half.
        pub fn mul(a: Type, b: Type, flags: &mut Flags) -> Wide {
            let result = a as Wide * b as Wide;
            let high = (result >> BITS) as Type;

            flags_from_value(result as Type, flags);
            flags.set(Flags::CARRY | Flags::OVERFLOW, high != 0);

            result
        }

        /// Signed multiply. Carry and overflow report that the upper half is more than a sign
        /// extension of the lower half.
        pub fn imul(a: Type, b: Type, flags: &mut Flags) -> Wide {
            let result = (a as SignedType as SignedWide * b as SignedType as SignedWide) as Wide;
            let low = result as Type;
            let high = (result >> BITS) as Type;

            flags_from_value(low, flags);
            let overflow = if low & SIGN_BIT != 0 {
                high != Type::MAX
            } else {
                high != 0
            };
            flags.set(Flags::CARRY | Flags::OVERFLOW, overflow);

            result
        }

        /// Unsigned divide returning `(quotient, remainder)`, or `None` for a divide fault.
        pub fn div(dividend: Wide, divisor: Type) -> Option<(Type, Type)> {
            if divisor == 0 {
                return None;
            }

            let quotient = dividend / divisor as Wide;
            if quotient > Type::MAX as Wide {
                return None;
            }

            Some((quotient as Type, (dividend % divisor as Wide) as Type))
        }

        /// Signed divide. The quotient truncates towards zero and the remainder takes the sign
        /// of the dividend. `None` for a divide fault.
        pub fn idiv(dividend: Wide, divisor: Type) -> Option<(Type, Type)> {
            if divisor == 0 {
                return None;
            }

            let dividend = dividend as SignedWide as i64;
            let divisor = divisor as SignedType as i64;

            let quotient = dividend / divisor;
            if quotient < SignedType::MIN as i64 || quotient > SignedType::MAX as i64 {
                return None;
            }

            Some((quotient as Type, (dividend % divisor) as Type))
        }
    };
}

pub mod byte {
    use super::*;

    type Type = u8;
    type SignedType = i8;
    type Wide = u16;
    type SignedWide = i16;

    ops!();
}

pub mod word {
    use super::*;

    type Type = u16;
    type SignedType = i16;
    type Wide = u32;
    type SignedWide = i32;

    ops!();
}

/// Decimal adjust AL after addition.
pub fn daa(al: u8, flags: &mut Flags) -> u8 {
    let old_al = al;
    let old_carry = flags.contains(Flags::CARRY);
    let mut al = al;

    if al & 0x0F > 9 || flags.contains(Flags::AUX_CARRY) {
        let value = al as u16 + 6;
        al = value as u8;
        flags.set(Flags::CARRY, old_carry || value & 0xFF00 != 0);
        flags.insert(Flags::AUX_CARRY);
    } else {
        flags.remove(Flags::AUX_CARRY);
    }

    if old_al > 0x99 || old_carry {
        al = al.wrapping_add(0x60);
        flags.insert(Flags::CARRY);
    } else {
        flags.remove(Flags::CARRY);
    }

    byte::flags_from_value(al, flags);
    al
}

/// Decimal adjust AL after subtraction.
pub fn das(al: u8, flags: &mut Flags) -> u8 {
    let old_al = al;
    let old_carry = flags.contains(Flags::CARRY);
    let mut al = al;

    if al & 0x0F > 9 || flags.contains(Flags::AUX_CARRY) {
        let value = (al as u16).wrapping_sub(6);
        al = value as u8;
        flags.set(Flags::CARRY, old_carry || value & 0xFF00 != 0);
        flags.insert(Flags::AUX_CARRY);
    } else {
        flags.remove(Flags::AUX_CARRY);
    }

    if old_al > 0x99 || old_carry {
        al = al.wrapping_sub(0x60);
        flags.insert(Flags::CARRY);
    }

    byte::flags_from_value(al, flags);
    al
}

/// ASCII adjust after addition. Operates on the whole of AX.
pub fn aaa(ax: u16, flags: &mut Flags) -> u16 {
    let [mut al, mut ah] = ax.to_le_bytes();

    if al & 0x0F > 9 || flags.contains(Flags::AUX_CARRY) {
        al = al.wrapping_add(6);
        ah = ah.wrapping_add(1);
        flags.insert(Flags::AUX_CARRY | Flags::CARRY);
    } else {
        flags.remove(Flags::AUX_CARRY | Flags::CARRY);
    }

    al &= 0x0F;
    byte::flags_from_value(al, flags);

    u16::from_le_bytes([al, ah])
}

/// ASCII adjust after subtraction. Operates on the whole of AX.
pub fn aas(ax: u16, flags: &mut Flags) -> u16 {
    let [mut al, mut ah] = ax.to_le_bytes();

    if al & 0x0F > 9 || flags.contains(Flags::AUX_CARRY) {
        al = al.wrapping_sub(6);
        ah = ah.wrapping_sub(1);
        flags.insert(Flags::AUX_CARRY | Flags::CARRY);
    } else {
        flags.remove(Flags::AUX_CARRY | Flags::CARRY);
    }

    al &= 0x0F;
    byte::flags_from_value(al, flags);

    u16::from_le_bytes([al, ah])
}

/// ASCII adjust after multiply. `None` when the base is zero, which is a divide fault.
pub fn aam(al: u8, base: u8, flags: &mut Flags) -> Option<u16> {
    if base == 0 {
        return None;
    }

    let (ah, al) = (al / base, al % base);
    byte::flags_from_value(al, flags);

    Some(u16::from_le_bytes([al, ah]))
}

/// ASCII adjust before division. AH is always cleared.
pub fn aad(ax: u16, base: u8, flags: &mut Flags) -> u16 {
    let [al, ah] = ax.to_le_bytes();
    let al = al.wrapping_add(ah.wrapping_mul(base));

    byte::flags_from_value(al, flags);

    al as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_table_matches_population_count() {
        for value in 0..=u8::MAX {
            assert_eq!(parity(value), value.count_ones() % 2 == 0, "{:02X}", value);
        }
    }

    #[test]
    fn add_byte() {
        let mut flags = Flags::empty();

        assert_eq!(byte::add(0x7F, 0x01, false, &mut flags), 0x80);
        assert!(flags.contains(Flags::OVERFLOW));
        assert!(flags.contains(Flags::SIGN));
        assert!(flags.contains(Flags::AUX_CARRY));
        assert!(!flags.contains(Flags::CARRY));

        assert_eq!(byte::add(0xFF, 0x01, false, &mut flags), 0x00);
        assert!(flags.contains(Flags::CARRY));
        assert!(flags.contains(Flags::ZERO));
        assert!(flags.contains(Flags::PARITY));
        assert!(!flags.contains(Flags::OVERFLOW));

        assert_eq!(byte::add(0xFF, 0x00, true, &mut flags), 0x00);
        assert!(flags.contains(Flags::CARRY));
    }

    #[test]
    fn add_word() {
        let mut flags = Flags::empty();

        assert_eq!(word::add(0xFFFF, 0x0001, false, &mut flags), 0x0000);
        assert!(flags.contains(Flags::CARRY | Flags::ZERO | Flags::AUX_CARRY));

        assert_eq!(word::add(0x7FFF, 0x0001, false, &mut flags), 0x8000);
        assert!(flags.contains(Flags::OVERFLOW | Flags::SIGN));
        assert!(!flags.contains(Flags::CARRY));
    }

    #[test]
    fn sub_byte() {
        let mut flags = Flags::empty();

        assert_eq!(byte::sub(0x00, 0x01, false, &mut flags), 0xFF);
        assert!(flags.contains(Flags::CARRY | Flags::SIGN | Flags::AUX_CARRY));
        assert!(!flags.contains(Flags::OVERFLOW));

        assert_eq!(byte::sub(0x80, 0x01, false, &mut flags), 0x7F);
        assert!(flags.contains(Flags::OVERFLOW));
        assert!(!flags.contains(Flags::CARRY));

        assert_eq!(byte::sub(0x10, 0x0F, true, &mut flags), 0x00);
        assert!(flags.contains(Flags::ZERO));
        assert!(!flags.contains(Flags::CARRY));
    }

    #[test]
    fn cmp_does_not_change_destination() {
        let mut flags = Flags::empty();
        assert_eq!(word::alu(CMP, 0x1234, 0x1234, &mut flags), 0x1234);
        assert!(flags.contains(Flags::ZERO));
        assert_eq!(word::alu(CMP, 0x0001, 0x0002, &mut flags), 0x0001);
        assert!(flags.contains(Flags::CARRY | Flags::SIGN));
    }

    #[test]
    fn logic_clears_carry_and_overflow() {
        let mut flags = Flags::CARRY | Flags::OVERFLOW;
        assert_eq!(byte::or(0xF0, 0x0F, &mut flags), 0xFF);
        assert!(!flags.intersects(Flags::CARRY | Flags::OVERFLOW));
        assert!(flags.contains(Flags::SIGN | Flags::PARITY));

        let mut flags = Flags::CARRY | Flags::OVERFLOW;
        byte::test(0xF0, 0x0F, &mut flags);
        assert!(flags.contains(Flags::ZERO));
        assert!(!flags.intersects(Flags::CARRY | Flags::OVERFLOW));
    }

    #[test]
    fn inc_and_dec_preserve_carry() {
        for carry in [false, true] {
            for value in 0..=u16::MAX {
                let mut flags = Flags::empty();
                flags.set(Flags::CARRY, carry);

                let result = word::dec(word::inc(value, &mut flags), &mut flags);

                assert_eq!(result, value);
                assert_eq!(flags.contains(Flags::CARRY), carry);
            }
        }
    }

    #[test]
    fn inc_word_overflows_on_bit_15() {
        let mut flags = Flags::empty();
        assert_eq!(word::inc(0x007F, &mut flags), 0x0080);
        assert!(!flags.contains(Flags::OVERFLOW));
        assert_eq!(word::inc(0x7FFF, &mut flags), 0x8000);
        assert!(flags.contains(Flags::OVERFLOW));
    }

    #[test]
    fn neg() {
        let mut flags = Flags::empty();
        assert_eq!(byte::neg(0x01, &mut flags), 0xFF);
        assert!(flags.contains(Flags::CARRY));
        assert_eq!(byte::neg(0x00, &mut flags), 0x00);
        assert!(!flags.contains(Flags::CARRY));
        assert_eq!(byte::neg(0x80, &mut flags), 0x80);
        assert!(flags.contains(Flags::OVERFLOW));
    }

    #[test]
    fn shift_by_zero_is_a_no_op() {
        let mut flags = Flags::CARRY | Flags::OVERFLOW;
        assert_eq!(byte::shift(Shift::Shl, 0x81, 0, &mut flags), 0x81);
        assert_eq!(flags, Flags::CARRY | Flags::OVERFLOW);
    }

    #[test]
    fn test_shl() {
        let mut flags = Flags::empty();
        assert_eq!(byte::shift(Shift::Shl, 0x81, 1, &mut flags), 0x02);
        assert!(flags.contains(Flags::CARRY));
        assert!(flags.contains(Flags::OVERFLOW));

        let mut flags = Flags::empty();
        assert_eq!(byte::shift(Shift::Shl, 0x40, 1, &mut flags), 0x80);
        assert!(!flags.contains(Flags::CARRY));
        assert!(flags.contains(Flags::OVERFLOW));
        assert!(flags.contains(Flags::SIGN));

        let mut flags = Flags::empty();
        assert_eq!(word::shift(Shift::Shl, 0x0001, 16, &mut flags), 0x0000);
        assert!(flags.contains(Flags::CARRY));
        assert!(flags.contains(Flags::ZERO));
    }

    #[test]
    fn test_shr_and_sar() {
        let mut flags = Flags::empty();
        assert_eq!(byte::shift(Shift::Shr, 0x81, 1, &mut flags), 0x40);
        assert!(flags.contains(Flags::CARRY));
        assert!(flags.contains(Flags::OVERFLOW));

        let mut flags = Flags::empty();
        assert_eq!(byte::shift(Shift::Shr, 0x81, 2, &mut flags), 0x20);
        assert!(!flags.contains(Flags::CARRY));
        assert!(!flags.contains(Flags::OVERFLOW));

        let mut flags = Flags::OVERFLOW;
        assert_eq!(word::shift(Shift::Sar, 0x8001, 1, &mut flags), 0xC000);
        assert!(flags.contains(Flags::CARRY));
        assert!(!flags.contains(Flags::OVERFLOW));
        assert!(flags.contains(Flags::SIGN));
    }

    #[test]
    fn test_rotates() {
        let mut flags = Flags::empty();
        assert_eq!(byte::shift(Shift::Rol, 0x81, 1, &mut flags), 0x03);
        assert!(flags.contains(Flags::CARRY));
        assert!(flags.contains(Flags::OVERFLOW));

        let mut flags = Flags::empty();
        assert_eq!(byte::shift(Shift::Ror, 0x01, 1, &mut flags), 0x80);
        assert!(flags.contains(Flags::CARRY));
        assert!(flags.contains(Flags::OVERFLOW));

        let mut flags = Flags::CARRY;
        assert_eq!(byte::shift(Shift::Rcl, 0x00, 1, &mut flags), 0x01);
        assert!(!flags.contains(Flags::CARRY));

        let mut flags = Flags::CARRY;
        assert_eq!(word::shift(Shift::Rcr, 0x0001, 1, &mut flags), 0x8000);
        assert!(flags.contains(Flags::CARRY));
        assert!(flags.contains(Flags::OVERFLOW));

        // Nine rotates through carry bring a byte back to where it started.
        let mut flags = Flags::empty();
        assert_eq!(byte::shift(Shift::Rcl, 0xA5, 9, &mut flags), 0xA5);
        assert!(!flags.contains(Flags::CARRY));
    }

    #[test]
    fn rotates_leave_arithmetic_flags_alone() {
        let mut flags = Flags::ZERO | Flags::PARITY;
        byte::shift(Shift::Rol, 0x01, 1, &mut flags);
        assert!(flags.contains(Flags::ZERO | Flags::PARITY));
    }

    #[test]
    fn multiply() {
        let mut flags = Flags::empty();
        assert_eq!(byte::mul(0x10, 0x10, &mut flags), 0x0100);
        assert!(flags.contains(Flags::CARRY | Flags::OVERFLOW));

        assert_eq!(byte::mul(0x0F, 0x0F, &mut flags), 0x00E1);
        assert!(!flags.intersects(Flags::CARRY | Flags::OVERFLOW));

        assert_eq!(byte::imul(0xFF, 0x02, &mut flags), 0xFFFE);
        assert!(!flags.intersects(Flags::CARRY | Flags::OVERFLOW));

        assert_eq!(word::imul(0x4000, 0x0002, &mut flags), 0x0000_8000);
        assert!(flags.contains(Flags::CARRY | Flags::OVERFLOW));
    }

    #[test]
    fn divide() {
        assert_eq!(byte::div(0x0100, 0x02), Some((0x80, 0x00)));
        assert_eq!(byte::div(0x0100, 0x01), None);
        assert_eq!(byte::div(0x0005, 0x00), None);
        assert_eq!(word::div(0x0001_0003, 0x0002), Some((0x8001, 0x0001)));

        // -7 / 2 = -3 remainder -1
        assert_eq!(byte::idiv(0xFFF9, 0x02), Some((0xFD, 0xFF)));
        // 7 / -2 = -3 remainder 1
        assert_eq!(byte::idiv(0x0007, 0xFE), Some((0xFD, 0x01)));
        assert_eq!(byte::idiv(0x0100, 0x01), None);
        assert_eq!(word::idiv(0x8000_0000, 0xFFFF), None);
    }

    /// Decimal adjust written directly from the published pseudo code.
    fn reference_daa(al: u8, aux: bool, carry: bool) -> (u8, bool, bool) {
        let mut result = al;
        let mut new_carry = false;
        let mut new_aux = false;

        if al & 0xF > 9 || aux {
            new_carry = carry || al > 0xF9;
            result = result.wrapping_add(6);
            new_aux = true;
        }
        if al > 0x99 || carry {
            result = result.wrapping_add(0x60);
            new_carry = true;
        }

        (result, new_aux, new_carry)
    }

    fn reference_das(al: u8, aux: bool, carry: bool) -> (u8, bool, bool) {
        let mut result = al;
        let mut new_carry = false;
        let mut new_aux = false;

        if al & 0xF > 9 || aux {
            new_carry = carry || al < 6;
            result = result.wrapping_sub(6);
            new_aux = true;
        }
        if al > 0x99 || carry {
            result = result.wrapping_sub(0x60);
            new_carry = true;
        }

        (result, new_aux, new_carry)
    }

    fn reference_aaa(ax: u16, aux: bool) -> (u16, bool) {
        let (mut al, mut ah) = (ax as u8, (ax >> 8) as u8);
        let adjust = al & 0xF > 9 || aux;
        if adjust {
            al = al.wrapping_add(6);
            ah = ah.wrapping_add(1);
        }
        (((ah as u16) << 8) | (al & 0xF) as u16, adjust)
    }

    fn reference_aas(ax: u16, aux: bool) -> (u16, bool) {
        let (mut al, mut ah) = (ax as u8, (ax >> 8) as u8);
        let adjust = al & 0xF > 9 || aux;
        if adjust {
            al = al.wrapping_sub(6);
            ah = ah.wrapping_sub(1);
        }
        (((ah as u16) << 8) | (al & 0xF) as u16, adjust)
    }

    #[test]
    fn bcd_matches_reference_for_every_input() {
        for adjust_flags in [false, true] {
            for al in 0..=u8::MAX {
                let mut input = Flags::empty();
                input.set(Flags::AUX_CARRY | Flags::CARRY, adjust_flags);

                let mut flags = input;
                let result = daa(al, &mut flags);
                let expected = reference_daa(al, adjust_flags, adjust_flags);
                assert_eq!(
                    (
                        result,
                        flags.contains(Flags::AUX_CARRY),
                        flags.contains(Flags::CARRY)
                    ),
                    expected,
                    "DAA {:02X} {}",
                    al,
                    adjust_flags
                );
                assert_eq!(flags.contains(Flags::ZERO), result == 0);
                assert_eq!(flags.contains(Flags::SIGN), result & 0x80 != 0);

                let mut flags = input;
                let result = das(al, &mut flags);
                let expected = reference_das(al, adjust_flags, adjust_flags);
                assert_eq!(
                    (
                        result,
                        flags.contains(Flags::AUX_CARRY),
                        flags.contains(Flags::CARRY)
                    ),
                    expected,
                    "DAS {:02X} {}",
                    al,
                    adjust_flags
                );

                let ax = 0x0500 | al as u16;

                let mut flags = input;
                let result = aaa(ax, &mut flags);
                let (expected, adjusted) = reference_aaa(ax, adjust_flags);
                assert_eq!(result, expected, "AAA {:04X} {}", ax, adjust_flags);
                assert_eq!(flags.contains(Flags::CARRY), adjusted);
                assert_eq!(flags.contains(Flags::AUX_CARRY), adjusted);

                let mut flags = input;
                let result = aas(ax, &mut flags);
                let (expected, adjusted) = reference_aas(ax, adjust_flags);
                assert_eq!(result, expected, "AAS {:04X} {}", ax, adjust_flags);
                assert_eq!(flags.contains(Flags::CARRY), adjusted);
                assert_eq!(flags.contains(Flags::AUX_CARRY), adjusted);
            }
        }
    }

    fn to_bcd(value: u8) -> u8 {
        ((value / 10) << 4) | (value % 10)
    }

    #[test]
    fn packed_decimal_addition_and_subtraction() {
        for a in 0..100u8 {
            for b in 0..100u8 {
                let mut flags = Flags::empty();
                let sum = byte::add(to_bcd(a), to_bcd(b), false, &mut flags);
                let adjusted = daa(sum, &mut flags);
                assert_eq!(adjusted, to_bcd((a + b) % 100), "{} + {}", a, b);
                assert_eq!(flags.contains(Flags::CARRY), a + b >= 100);

                let mut flags = Flags::empty();
                let difference = byte::sub(to_bcd(a), to_bcd(b), false, &mut flags);
                let adjusted = das(difference, &mut flags);
                let expected = (a as i16 - b as i16).rem_euclid(100) as u8;
                assert_eq!(adjusted, to_bcd(expected), "{} - {}", a, b);
                assert_eq!(flags.contains(Flags::CARRY), a < b);
            }
        }
    }

    #[test]
    fn unpacked_decimal_addition() {
        for a in 0..10u8 {
            for b in 0..10u8 {
                let mut flags = Flags::empty();
                let al = byte::add(a, b, false, &mut flags);
                let ax = aaa(al as u16, &mut flags);
                assert_eq!(ax & 0xFF, ((a + b) % 10) as u16);
                assert_eq!(ax >> 8, ((a + b) / 10) as u16);
            }
        }
    }

    #[test]
    fn ascii_adjust_multiply_and_divide() {
        let mut flags = Flags::empty();
        assert_eq!(aam(63, 10, &mut flags), Some(0x0603));
        assert_eq!(aam(63, 0, &mut flags), None);

        assert_eq!(aad(0x0603, 10, &mut flags), 63);
        assert_eq!(aad(0x0000, 10, &mut flags), 0);
        assert!(flags.contains(Flags::ZERO));
    }
}
