//! The i386 register table.
//!
//! A static, read-only list of every register name the operand parser
//! accepts, with its capability flags and its 3-bit hardware number.

use crate::flags::OperandFlags;

/// One entry of the register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    /// Name without the `%` marker.
    pub name: &'static str,
    /// Classification of the register.
    pub flags: OperandFlags,
    /// Hardware register number (0..=7).
    pub num: u8,
}

impl Register {
    const fn new(name: &'static str, flags: OperandFlags, num: u8) -> Self {
        Self { name, flags, num }
    }

    /// Whether this is `%esp`.
    #[inline]
    pub fn is_esp(&self) -> bool {
        self.flags.contains(OperandFlags::REG32) && self.num == ESP_NUM
    }

    /// Whether this is `%ebp`.
    #[inline]
    pub fn is_ebp(&self) -> bool {
        self.flags.contains(OperandFlags::REG32) && self.num == EBP_NUM
    }

    /// Width class of a general register (`Reg8`, `Reg16`, `Reg32`), empty
    /// for anything else.
    #[inline]
    pub fn width(&self) -> OperandFlags {
        self.flags & OperandFlags::REG
    }
}

impl core::fmt::Display for Register {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "%{}", self.name)
    }
}

pub(crate) const ESP_NUM: u8 = 4;
pub(crate) const EBP_NUM: u8 = 5;

/// Segment register numbers.
pub(crate) const SEG_ES: u8 = 0;
pub(crate) const SEG_CS: u8 = 1;
pub(crate) const SEG_SS: u8 = 2;
pub(crate) const SEG_DS: u8 = 3;
pub(crate) const SEG_FS: u8 = 4;
pub(crate) const SEG_GS: u8 = 5;

const R8: OperandFlags = OperandFlags::REG8;
const R16: OperandFlags = OperandFlags::REG16;
const R32: OperandFlags = OperandFlags::REG32;
const S2: OperandFlags = OperandFlags::SREG2;
const S3: OperandFlags = OperandFlags::SREG3;
const CR: OperandFlags = OperandFlags::CONTROL;
const DR: OperandFlags = OperandFlags::DEBUG;
const TR: OperandFlags = OperandFlags::TEST;
const FR: OperandFlags = OperandFlags::FLOAT_REG;

static REGISTERS: &[Register] = &[
    Register::new("al", R8.union(OperandFlags::ACC), 0),
    Register::new("cl", R8.union(OperandFlags::SHIFT_COUNT), 1),
    Register::new("dl", R8, 2),
    Register::new("bl", R8, 3),
    Register::new("ah", R8, 4),
    Register::new("ch", R8, 5),
    Register::new("dh", R8, 6),
    Register::new("bh", R8, 7),
    Register::new("ax", R16.union(OperandFlags::ACC), 0),
    Register::new("cx", R16, 1),
    Register::new("dx", R16.union(OperandFlags::INOUT_PORT_REG), 2),
    Register::new("bx", R16, 3),
    Register::new("sp", R16, 4),
    Register::new("bp", R16, 5),
    Register::new("si", R16, 6),
    Register::new("di", R16, 7),
    Register::new("eax", R32.union(OperandFlags::ACC), 0),
    Register::new("ecx", R32, 1),
    Register::new("edx", R32, 2),
    Register::new("ebx", R32, 3),
    Register::new("esp", R32, 4),
    Register::new("ebp", R32, 5),
    Register::new("esi", R32, 6),
    Register::new("edi", R32, 7),
    Register::new("es", S2, SEG_ES),
    Register::new("cs", S2, SEG_CS),
    Register::new("ss", S2, SEG_SS),
    Register::new("ds", S2, SEG_DS),
    Register::new("fs", S3, SEG_FS),
    Register::new("gs", S3, SEG_GS),
    Register::new("cr0", CR, 0),
    Register::new("cr2", CR, 2),
    Register::new("cr3", CR, 3),
    Register::new("db0", DR, 0),
    Register::new("db1", DR, 1),
    Register::new("db2", DR, 2),
    Register::new("db3", DR, 3),
    Register::new("db6", DR, 6),
    Register::new("db7", DR, 7),
    Register::new("dr0", DR, 0),
    Register::new("dr1", DR, 1),
    Register::new("dr2", DR, 2),
    Register::new("dr3", DR, 3),
    Register::new("dr6", DR, 6),
    Register::new("dr7", DR, 7),
    Register::new("tr6", TR, 6),
    Register::new("tr7", TR, 7),
    Register::new("st", FR.union(OperandFlags::FLOAT_ACC), 0),
    Register::new("st(0)", FR.union(OperandFlags::FLOAT_ACC), 0),
    Register::new("st(1)", FR, 1),
    Register::new("st(2)", FR, 2),
    Register::new("st(3)", FR, 3),
    Register::new("st(4)", FR, 4),
    Register::new("st(5)", FR, 5),
    Register::new("st(6)", FR, 6),
    Register::new("st(7)", FR, 7),
];

/// All registers, in table order.
#[must_use]
pub fn all() -> &'static [Register] {
    REGISTERS
}

/// Look up a register by name (without `%`).
///
/// Names are matched exactly; callers fold case first.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static Register> {
    REGISTERS.iter().find(|r| r.name == name)
}
