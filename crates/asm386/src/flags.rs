//! Operand capability flags.
//!
//! Every operand slot of a template, and every parsed operand, is described
//! by an [`OperandFlags`] set. Matching is a bitwise intersection between
//! the two, so the vocabulary is shared by the register table, the operand
//! parser and the template table.

use bitflags::bitflags;

bitflags! {
    /// What an operand is, or what an operand slot accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct OperandFlags: u64 {
        // general registers
        const REG8 = 1 << 0;
        const REG16 = 1 << 1;
        const REG32 = 1 << 2;

        // immediates
        const IMM8 = 1 << 3;
        /// Sign-extended 8-bit immediate.
        const IMM8S = 1 << 4;
        const IMM16 = 1 << 5;
        const IMM32 = 1 << 6;
        /// The literal value 1 (shift/rotate by one).
        const IMM1 = 1 << 7;

        // memory
        const BASE_INDEX = 1 << 8;
        const DISP8 = 1 << 9;
        const DISP16 = 1 << 10;
        const DISP32 = 1 << 11;
        const ABS8 = 1 << 12;
        const ABS16 = 1 << 13;
        const ABS32 = 1 << 14;
        const MEM8 = 1 << 15;
        const MEM16 = 1 << 16;
        const MEM32 = 1 << 17;

        // specialised registers
        /// `%dx` used as the port operand of `in`/`out`.
        const INOUT_PORT_REG = 1 << 18;
        /// `%cl` used as a shift count.
        const SHIFT_COUNT = 1 << 19;
        const CONTROL = 1 << 20;
        const DEBUG = 1 << 21;
        const TEST = 1 << 22;
        const FLOAT_REG = 1 << 23;
        const FLOAT_ACC = 1 << 24;
        /// Two-bit segment register (`es cs ss ds`).
        const SREG2 = 1 << 25;
        /// Three-bit segment register (`fs gs`).
        const SREG3 = 1 << 26;
        /// `%al`/`%ax`/`%eax`.
        const ACC = 1 << 27;

        /// Operand written with a leading `*`.
        const JUMP_ABSOLUTE = 1 << 28;

        const REG = Self::REG8.bits() | Self::REG16.bits() | Self::REG32.bits();
        const WORD_REG = Self::REG16.bits() | Self::REG32.bits();
        const IMM = Self::IMM8.bits() | Self::IMM8S.bits() | Self::IMM16.bits() | Self::IMM32.bits();
        const DISP = Self::DISP8.bits() | Self::DISP16.bits() | Self::DISP32.bits();
        const ABS = Self::ABS8.bits() | Self::ABS16.bits() | Self::ABS32.bits();
        const ANY_MEM = Self::MEM8.bits() | Self::MEM16.bits() | Self::MEM32.bits();
        const MEM = Self::DISP.bits() | Self::ABS.bits() | Self::ANY_MEM.bits() | Self::BASE_INDEX.bits();
        const WORD_MEM = Self::MEM16.bits() | Self::MEM32.bits() | Self::DISP.bits() | Self::ABS.bits() | Self::BASE_INDEX.bits();
        const BYTE_MEM = Self::MEM8.bits() | Self::DISP.bits() | Self::ABS.bits() | Self::BASE_INDEX.bits();
        /// Registers an instruction names without encoding them.
        const IMPLICIT_REGISTER = Self::INOUT_PORT_REG.bits() | Self::SHIFT_COUNT.bits() | Self::ACC.bits() | Self::FLOAT_ACC.bits();
        /// Registers that end up in a ModRM field or a short-form opcode.
        const ENCODED_REG = Self::REG.bits() | Self::SREG2.bits() | Self::SREG3.bits() | Self::CONTROL.bits() | Self::DEBUG.bits() | Self::TEST.bits() | Self::FLOAT_REG.bits();
        /// Registers that always take the ModRM `reg` field.
        const SPECIAL_REG = Self::SREG2.bits() | Self::SREG3.bits() | Self::CONTROL.bits() | Self::DEBUG.bits() | Self::TEST.bits();
        /// Target slot of a relative branch.
        const JUMP_TARGET = Self::DISP.bits() | Self::ABS.bits();
    }
}

impl OperandFlags {
    /// Bits that must agree exactly between a given operand and the overlap
    /// with a template slot.
    pub const EXACT: Self = Self::JUMP_ABSOLUTE
        .union(Self::BASE_INDEX)
        .union(Self::MEM8);

    /// Any memory class.
    #[inline]
    pub fn is_memory(self) -> bool {
        self.intersects(Self::MEM)
    }

    /// Whether this operand type fits a slot expecting `expected`.
    ///
    /// The overlap must be non-empty, and the jump-absolute, base-index and
    /// byte-memory markers of the given operand must survive it unchanged.
    #[inline]
    pub fn fits(self, expected: Self) -> bool {
        let overlap = self & expected;
        !overlap.is_empty() && (overlap & Self::EXACT) == (self & Self::EXACT)
    }

    /// Byte width of a finalized immediate (0 when none).
    #[inline]
    pub fn imm_size(self) -> u8 {
        if self.intersects(Self::IMM8 | Self::IMM8S) {
            1
        } else if self.contains(Self::IMM16) {
            2
        } else if self.contains(Self::IMM32) {
            4
        } else {
            0
        }
    }
}

/// Classify a constant immediate by the narrowest widths that hold it.
///
/// Returns an empty set when the value does not fit in 32 bits.
#[must_use]
pub fn smallest_imm_type(n: i64) -> OperandFlags {
    use OperandFlags as F;
    if n == 1 {
        F::IMM1 | F::IMM8 | F::IMM8S | F::IMM16 | F::IMM32
    } else if fits_in_signed_byte(n) {
        F::IMM8S | F::IMM8 | F::IMM16 | F::IMM32
    } else if fits_in_unsigned_byte(n) {
        F::IMM8 | F::IMM16 | F::IMM32
    } else if fits_in_signed_word(n) || fits_in_unsigned_word(n) {
        F::IMM16 | F::IMM32
    } else if fits_in_32_bits(n) {
        F::IMM32
    } else {
        F::empty()
    }
}

/// Classify a constant displacement used with a base or index register.
///
/// Returns an empty set when the value does not fit in 32 bits.
#[must_use]
pub fn smallest_disp_type(n: i64) -> OperandFlags {
    if fits_in_signed_byte(n) {
        OperandFlags::DISP8 | OperandFlags::DISP32
    } else if fits_in_32_bits(n) {
        OperandFlags::DISP32
    } else {
        OperandFlags::empty()
    }
}

/// Whether `n` can be stored in a 32-bit field, read as signed or unsigned.
#[inline]
pub(crate) fn fits_in_32_bits(n: i64) -> bool {
    fits_in_signed_long(n) || fits_in_unsigned_long(n)
}

#[inline]
pub(crate) fn fits_in_signed_byte(n: i64) -> bool {
    (-128..=127).contains(&n)
}

#[inline]
pub(crate) fn fits_in_unsigned_byte(n: i64) -> bool {
    (0..=0xff).contains(&n)
}

#[inline]
pub(crate) fn fits_in_signed_word(n: i64) -> bool {
    (-32768..=32767).contains(&n)
}

#[inline]
pub(crate) fn fits_in_unsigned_word(n: i64) -> bool {
    (0..=0xffff).contains(&n)
}

#[inline]
pub(crate) fn fits_in_signed_long(n: i64) -> bool {
    i32::try_from(n).is_ok()
}

#[inline]
pub(crate) fn fits_in_unsigned_long(n: i64) -> bool {
    u32::try_from(n).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use OperandFlags as F;

    #[test]
    fn literal_one_gets_imm1() {
        assert!(smallest_imm_type(1).contains(F::IMM1 | F::IMM8S));
        assert!(!smallest_imm_type(2).contains(F::IMM1));
    }

    #[test]
    fn imm_classes_by_magnitude() {
        assert_eq!(smallest_imm_type(-1), F::IMM8S | F::IMM8 | F::IMM16 | F::IMM32);
        assert_eq!(smallest_imm_type(200), F::IMM8 | F::IMM16 | F::IMM32);
        assert_eq!(smallest_imm_type(-200), F::IMM16 | F::IMM32);
        assert_eq!(smallest_imm_type(0xffff), F::IMM16 | F::IMM32);
        assert_eq!(smallest_imm_type(0x10000), F::IMM32);
        assert_eq!(smallest_imm_type(0xffff_ffff), F::IMM32);
        assert_eq!(smallest_imm_type(-0x8000_0000), F::IMM32);
        assert!(smallest_imm_type(0x1_0000_0000).is_empty());
    }

    #[test]
    fn disp_classes() {
        assert_eq!(smallest_disp_type(127), F::DISP8 | F::DISP32);
        assert_eq!(smallest_disp_type(-128), F::DISP8 | F::DISP32);
        assert_eq!(smallest_disp_type(128), F::DISP32);
        assert_eq!(smallest_disp_type(0xffff_ffff), F::DISP32);
        assert_eq!(smallest_disp_type(-0x8000_0000), F::DISP32);
        assert!(smallest_disp_type(0x1_0000_0000).is_empty());
        assert!(smallest_disp_type(-0x8000_0001).is_empty());
    }

    #[test]
    fn fits_requires_overlap() {
        assert!(F::REG32.fits(F::REG | F::MEM));
        assert!(!F::REG32.fits(F::REG8));
    }

    #[test]
    fn fits_keeps_base_index_exact() {
        let mem = F::MEM32 | F::BASE_INDEX | F::DISP8 | F::DISP32;
        assert!(mem.fits(F::REG | F::MEM));
        // a jump slot shares the displacement bits but not BaseIndex
        assert!(!mem.fits(F::JUMP_TARGET));
    }

    #[test]
    fn fits_keeps_byte_memory_exact() {
        let byte_mem = F::MEM8 | F::BASE_INDEX;
        assert!(byte_mem.fits(F::BYTE_MEM));
        assert!(!byte_mem.fits(F::WORD_MEM));
    }

    #[test]
    fn fits_keeps_jump_absolute_exact() {
        let star_reg = F::REG32 | F::JUMP_ABSOLUTE;
        assert!(!star_reg.fits(F::REG32));
        assert!(star_reg.fits(F::JUMP_ABSOLUTE | F::REG32 | F::MEM));
    }

    #[test]
    fn imm_size_prefers_narrowest() {
        assert_eq!((F::IMM8 | F::IMM8S).imm_size(), 1);
        assert_eq!(F::IMM16.imm_size(), 2);
        assert_eq!(F::IMM32.imm_size(), 4);
        assert_eq!(F::IMM1.imm_size(), 0);
    }
}
