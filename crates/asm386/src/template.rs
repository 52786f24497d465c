//! The i386 instruction template table.
//!
//! Each mnemonic maps to an ordered run of [`Template`]s; the matcher walks
//! the run and takes the first one whose operand slots accept the parsed
//! operands. The table is static and sorted by mnemonic so lookup is a
//! binary search.

use bitflags::bitflags;

use crate::flags::OperandFlags;

bitflags! {
    /// Encoding modifiers of a template.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        /// Low opcode bit selects byte (clear) or word/dword (set) operation.
        const W = 1 << 0;
        /// Operands may be given in either order; reversed sets bit 1.
        const D = 1 << 1;
        /// A ModRM byte follows the opcode.
        const MODRM = 1 << 2;
        /// Register number goes in the low three opcode bits.
        const SHORT_FORM = 1 << 3;
        /// Short form whose bit 3 is the width bit.
        const SHORT_FORM_W = 1 << 4;
        /// Two-bit segment register in opcode bits 3..5.
        const SEG2_SHORT_FORM = 1 << 5;
        /// `%fs`/`%gs` push and pop.
        const SEG3_SHORT_FORM = 1 << 6;
        /// Relaxable relative branch.
        const JUMP = 1 << 7;
        /// Relative branch with a fixed 32-bit displacement.
        const JUMP_DWORD = 1 << 8;
        /// Relative branch with a fixed 8-bit displacement.
        const JUMP_BYTE = 1 << 9;
        /// Far branch with an immediate selector and offset.
        const JUMP_INTER_SEGMENT = 1 << 10;
        /// x87 register form whose direction is bit 10 of the opcode.
        const FLOAT_D = 1 << 11;
        /// String instruction (accepts `rep` prefixes).
        const IS_STRING = 1 << 12;
        /// Always carries the operand-size prefix.
        const DATA16 = 1 << 13;
        /// Two-operand `imul $imm,%reg` encoded as the three-operand form.
        const IMUL_KLUDGE = 1 << 14;
        /// `clr %reg` encoded as `xor %reg,%reg`.
        const ICLR_KLUDGE = 1 << 15;
        /// Destination register goes in the ModRM `reg` field.
        const REVERSE_REG_REGMEM = 1 << 16;
        /// Register operands do not set the operand size.
        const IGNORE_SIZE = 1 << 17;
    }
}

/// Operand-size suffix of a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Suffix {
    /// `b`: 8-bit.
    Byte,
    /// `w`: 16-bit.
    Word,
    /// `l`: 32-bit.
    Long,
}

impl Suffix {
    /// Parse a suffix letter.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'b' => Some(Suffix::Byte),
            'w' => Some(Suffix::Word),
            'l' => Some(Suffix::Long),
            _ => None,
        }
    }

    /// The suffix letter.
    pub fn as_char(self) -> char {
        match self {
            Suffix::Byte => 'b',
            Suffix::Word => 'w',
            Suffix::Long => 'l',
        }
    }

    /// Suffix implied by a general register width class.
    pub fn from_reg_width(width: OperandFlags) -> Option<Self> {
        if width.contains(OperandFlags::REG8) {
            Some(Suffix::Byte)
        } else if width.contains(OperandFlags::REG16) {
            Some(Suffix::Word)
        } else if width.contains(OperandFlags::REG32) {
            Some(Suffix::Long)
        } else {
            None
        }
    }

    /// General register class of this width.
    pub fn reg_flags(self) -> OperandFlags {
        match self {
            Suffix::Byte => OperandFlags::REG8,
            Suffix::Word => OperandFlags::REG16,
            Suffix::Long => OperandFlags::REG32,
        }
    }

    /// Memory class of this width.
    pub fn mem_flags(self) -> OperandFlags {
        match self {
            Suffix::Byte => OperandFlags::MEM8,
            Suffix::Word => OperandFlags::MEM16,
            Suffix::Long => OperandFlags::MEM32,
        }
    }

    /// Immediate classes a constant may keep when this suffix is written:
    /// everything no wider than the suffix.
    pub fn imm_mask(self) -> OperandFlags {
        let narrow = OperandFlags::IMM8 | OperandFlags::IMM8S | OperandFlags::IMM1;
        match self {
            Suffix::Byte => narrow,
            Suffix::Word => narrow | OperandFlags::IMM16,
            Suffix::Long => narrow | OperandFlags::IMM16 | OperandFlags::IMM32,
        }
    }

    /// Immediate classes encoded at exactly this width.
    pub fn imm_flags(self) -> OperandFlags {
        match self {
            Suffix::Byte => OperandFlags::IMM8 | OperandFlags::IMM8S,
            Suffix::Word => OperandFlags::IMM16,
            Suffix::Long => OperandFlags::IMM32,
        }
    }
}

impl core::fmt::Display for Suffix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One legal encoding of a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    /// Mnemonic as written, without a size suffix.
    pub name: &'static str,
    /// Number of operands (0..=3).
    pub operands: u8,
    /// Base opcode, most significant byte emitted first.
    pub opcode: u32,
    /// Opcode extension placed in the ModRM `reg` field.
    pub extension: Option<u8>,
    /// Encoding modifiers.
    pub modifiers: Modifiers,
    /// Accepted classes per operand slot.
    pub types: [OperandFlags; 3],
}

impl Template {
    const fn new(
        name: &'static str,
        opcode: u32,
        extension: Option<u8>,
        modifiers: Modifiers,
        slots: &[OperandFlags],
    ) -> Self {
        let mut types = [OperandFlags::empty(); 3];
        let mut i = 0;
        while i < slots.len() {
            types[i] = slots[i];
            i += 1;
        }
        Self {
            name,
            operands: slots.len() as u8,
            opcode,
            extension,
            modifiers,
            types,
        }
    }

    /// Whether the template has the given modifier(s).
    #[inline]
    pub fn has(&self, m: Modifiers) -> bool {
        self.modifiers.intersects(m)
    }

    /// Whether matching may retry with the first two operands swapped.
    #[inline]
    pub fn is_reversible(&self) -> bool {
        self.has(Modifiers::D | Modifiers::FLOAT_D) && self.operands >= 2
    }
}

macro_rules! flags {
    ($($f:ident)|+) => {
        OperandFlags::from_bits_retain(0 $(| OperandFlags::$f.bits())+)
    };
}

macro_rules! ext {
    (_) => {
        None
    };
    ($e:literal) => {
        Some($e)
    };
}

macro_rules! insn {
    ($name:literal, $opcode:literal, $ext:tt, [$($m:ident)|*] $(, [$($f:ident)|+])*) => {
        Template::new(
            $name,
            $opcode,
            ext!($ext),
            Modifiers::from_bits_retain(0 $(| Modifiers::$m.bits())*),
            &[$(flags!($($f)|+)),*],
        )
    };
}

/// All templates, sorted by mnemonic; templates of one mnemonic keep
/// their matching priority order.
#[rustfmt::skip]
static TEMPLATES: &[Template] = &[
    insn!("adc", 0x10, _, [D | W | MODRM], [REG], [REG | MEM]),
    insn!("adc", 0x83, 2, [MODRM], [IMM8S], [WORD_REG | WORD_MEM]),
    insn!("adc", 0x14, _, [W], [IMM], [ACC]),
    insn!("adc", 0x80, 2, [W | MODRM], [IMM], [REG | MEM]),
    insn!("add", 0x00, _, [D | W | MODRM], [REG], [REG | MEM]),
    insn!("add", 0x83, 0, [MODRM], [IMM8S], [WORD_REG | WORD_MEM]),
    insn!("add", 0x04, _, [W], [IMM], [ACC]),
    insn!("add", 0x80, 0, [W | MODRM], [IMM], [REG | MEM]),
    insn!("and", 0x20, _, [D | W | MODRM], [REG], [REG | MEM]),
    insn!("and", 0x83, 4, [MODRM], [IMM8S], [WORD_REG | WORD_MEM]),
    insn!("and", 0x24, _, [W], [IMM], [ACC]),
    insn!("and", 0x80, 4, [W | MODRM], [IMM], [REG | MEM]),
    insn!("bsf", 0x0fbc, _, [MODRM | REVERSE_REG_REGMEM], [WORD_REG | WORD_MEM], [WORD_REG]),
    insn!("bsr", 0x0fbd, _, [MODRM | REVERSE_REG_REGMEM], [WORD_REG | WORD_MEM], [WORD_REG]),
    insn!("bt", 0x0fa3, _, [MODRM], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("bt", 0x0fba, 4, [MODRM], [IMM8], [WORD_REG | WORD_MEM]),
    insn!("btc", 0x0fbb, _, [MODRM], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("btc", 0x0fba, 7, [MODRM], [IMM8], [WORD_REG | WORD_MEM]),
    insn!("btr", 0x0fb3, _, [MODRM], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("btr", 0x0fba, 6, [MODRM], [IMM8], [WORD_REG | WORD_MEM]),
    insn!("bts", 0x0fab, _, [MODRM], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("bts", 0x0fba, 5, [MODRM], [IMM8], [WORD_REG | WORD_MEM]),
    insn!("call", 0xe8, _, [JUMP_DWORD], [JUMP_TARGET]),
    insn!("call", 0xff, 2, [MODRM], [JUMP_ABSOLUTE | REG32 | MEM]),
    insn!("call", 0x9a, _, [JUMP_INTER_SEGMENT], [IMM16], [IMM32]),
    insn!("cbtw", 0x98, _, [DATA16]),
    insn!("clc", 0xf8, _, []),
    insn!("cld", 0xfc, _, []),
    insn!("cli", 0xfa, _, []),
    insn!("clr", 0x30, _, [W | MODRM | ICLR_KLUDGE], [REG]),
    insn!("cltd", 0x99, _, []),
    insn!("clts", 0x0f06, _, []),
    insn!("cmc", 0xf5, _, []),
    insn!("cmp", 0x38, _, [D | W | MODRM], [REG], [REG | MEM]),
    insn!("cmp", 0x83, 7, [MODRM], [IMM8S], [WORD_REG | WORD_MEM]),
    insn!("cmp", 0x3c, _, [W], [IMM], [ACC]),
    insn!("cmp", 0x80, 7, [W | MODRM], [IMM], [REG | MEM]),
    insn!("cmps", 0xa6, _, [W | IS_STRING]),
    insn!("cmps", 0xa6, _, [W | IS_STRING], [MEM], [MEM]),
    insn!("cwtd", 0x99, _, [DATA16]),
    insn!("cwtl", 0x98, _, []),
    insn!("dec", 0x48, _, [SHORT_FORM], [WORD_REG]),
    insn!("dec", 0xfe, 1, [W | MODRM], [REG | MEM]),
    insn!("div", 0xf6, 6, [W | MODRM], [REG | MEM]),
    insn!("div", 0xf6, 6, [W | MODRM], [REG | MEM], [ACC]),
    insn!("enter", 0xc8, _, [], [IMM16], [IMM8]),
    insn!("fabs", 0xd9e1, _, []),
    insn!("fadd", 0xd8c0, _, [SHORT_FORM | FLOAT_D], [FLOAT_REG], [FLOAT_ACC]),
    insn!("fadd", 0xd8c0, _, [SHORT_FORM], [FLOAT_REG]),
    insn!("faddl", 0xdc, 0, [MODRM], [MEM]),
    insn!("fadds", 0xd8, 0, [MODRM], [MEM]),
    insn!("fchs", 0xd9e0, _, []),
    insn!("fcom", 0xd8d0, _, [SHORT_FORM], [FLOAT_REG]),
    insn!("fcom", 0xd8d1, _, []),
    insn!("fcoml", 0xdc, 2, [MODRM], [MEM]),
    insn!("fcomp", 0xd8d8, _, [SHORT_FORM], [FLOAT_REG]),
    insn!("fcomp", 0xd8d9, _, []),
    insn!("fcompl", 0xdc, 3, [MODRM], [MEM]),
    insn!("fcomps", 0xd8, 3, [MODRM], [MEM]),
    insn!("fcoms", 0xd8, 2, [MODRM], [MEM]),
    insn!("fdivl", 0xdc, 6, [MODRM], [MEM]),
    insn!("fdivs", 0xd8, 6, [MODRM], [MEM]),
    insn!("fildl", 0xdb, 0, [MODRM], [MEM]),
    insn!("fildll", 0xdf, 5, [MODRM], [MEM]),
    insn!("filds", 0xdf, 0, [MODRM], [MEM]),
    insn!("fistpl", 0xdb, 3, [MODRM], [MEM]),
    insn!("fistpll", 0xdf, 7, [MODRM], [MEM]),
    insn!("fistps", 0xdf, 3, [MODRM], [MEM]),
    insn!("fld", 0xd9c0, _, [SHORT_FORM], [FLOAT_REG]),
    insn!("fld1", 0xd9e8, _, []),
    insn!("fldl", 0xdd, 0, [MODRM], [MEM]),
    insn!("flds", 0xd9, 0, [MODRM], [MEM]),
    insn!("fldt", 0xdb, 5, [MODRM], [MEM]),
    insn!("fldz", 0xd9ee, _, []),
    insn!("fmul", 0xd8c8, _, [SHORT_FORM | FLOAT_D], [FLOAT_REG], [FLOAT_ACC]),
    insn!("fmul", 0xd8c8, _, [SHORT_FORM], [FLOAT_REG]),
    insn!("fmull", 0xdc, 1, [MODRM], [MEM]),
    insn!("fmuls", 0xd8, 1, [MODRM], [MEM]),
    insn!("fninit", 0xdbe3, _, []),
    insn!("fnstsw", 0xdfe0, _, [IGNORE_SIZE], [ACC]),
    insn!("fnstsw", 0xdd, 7, [MODRM], [MEM]),
    insn!("fsqrt", 0xd9fa, _, []),
    insn!("fst", 0xddd0, _, [SHORT_FORM], [FLOAT_REG]),
    insn!("fstl", 0xdd, 2, [MODRM], [MEM]),
    insn!("fstp", 0xddd8, _, [SHORT_FORM], [FLOAT_REG]),
    insn!("fstpl", 0xdd, 3, [MODRM], [MEM]),
    insn!("fstps", 0xd9, 3, [MODRM], [MEM]),
    insn!("fstpt", 0xdb, 7, [MODRM], [MEM]),
    insn!("fsts", 0xd9, 2, [MODRM], [MEM]),
    insn!("fsubl", 0xdc, 4, [MODRM], [MEM]),
    insn!("fsubs", 0xd8, 4, [MODRM], [MEM]),
    insn!("fucompp", 0xdae9, _, []),
    insn!("fwait", 0x9b, _, []),
    insn!("fxch", 0xd9c8, _, [SHORT_FORM], [FLOAT_REG]),
    insn!("fxch", 0xd9c9, _, []),
    insn!("hlt", 0xf4, _, []),
    insn!("idiv", 0xf6, 7, [W | MODRM], [REG | MEM]),
    insn!("idiv", 0xf6, 7, [W | MODRM], [REG | MEM], [ACC]),
    insn!("imul", 0xf6, 5, [W | MODRM], [REG | MEM]),
    insn!("imul", 0x0faf, _, [MODRM | REVERSE_REG_REGMEM], [WORD_REG | MEM], [WORD_REG]),
    insn!("imul", 0x6b, _, [MODRM | REVERSE_REG_REGMEM], [IMM8S], [WORD_REG | MEM], [WORD_REG]),
    insn!("imul", 0x69, _, [MODRM | REVERSE_REG_REGMEM], [IMM16 | IMM32], [WORD_REG | MEM], [WORD_REG]),
    insn!("imul", 0x6b, _, [MODRM | IMUL_KLUDGE], [IMM8S], [WORD_REG]),
    insn!("imul", 0x69, _, [MODRM | IMUL_KLUDGE], [IMM16 | IMM32], [WORD_REG]),
    insn!("in", 0xe4, _, [W], [IMM8], [ACC]),
    insn!("in", 0xec, _, [W], [INOUT_PORT_REG], [ACC]),
    insn!("in", 0xe4, _, [W], [IMM8]),
    insn!("in", 0xec, _, [W], [INOUT_PORT_REG]),
    insn!("inc", 0x40, _, [SHORT_FORM], [WORD_REG]),
    insn!("inc", 0xfe, 0, [W | MODRM], [REG | MEM]),
    insn!("ins", 0x6c, _, [W | IS_STRING]),
    insn!("int", 0xcd, _, [], [IMM8]),
    insn!("int3", 0xcc, _, []),
    insn!("into", 0xce, _, []),
    insn!("iret", 0xcf, _, []),
    insn!("ja", 0x77, _, [JUMP], [JUMP_TARGET]),
    insn!("jae", 0x73, _, [JUMP], [JUMP_TARGET]),
    insn!("jb", 0x72, _, [JUMP], [JUMP_TARGET]),
    insn!("jbe", 0x76, _, [JUMP], [JUMP_TARGET]),
    insn!("jc", 0x72, _, [JUMP], [JUMP_TARGET]),
    insn!("jcxz", 0x67e3, _, [JUMP_BYTE], [JUMP_TARGET]),
    insn!("je", 0x74, _, [JUMP], [JUMP_TARGET]),
    insn!("jecxz", 0xe3, _, [JUMP_BYTE], [JUMP_TARGET]),
    insn!("jg", 0x7f, _, [JUMP], [JUMP_TARGET]),
    insn!("jge", 0x7d, _, [JUMP], [JUMP_TARGET]),
    insn!("jl", 0x7c, _, [JUMP], [JUMP_TARGET]),
    insn!("jle", 0x7e, _, [JUMP], [JUMP_TARGET]),
    insn!("jmp", 0xeb, _, [JUMP], [JUMP_TARGET]),
    insn!("jmp", 0xff, 4, [MODRM], [JUMP_ABSOLUTE | REG32 | MEM]),
    insn!("jmp", 0xea, _, [JUMP_INTER_SEGMENT], [IMM16], [IMM32]),
    insn!("jna", 0x76, _, [JUMP], [JUMP_TARGET]),
    insn!("jnae", 0x72, _, [JUMP], [JUMP_TARGET]),
    insn!("jnb", 0x73, _, [JUMP], [JUMP_TARGET]),
    insn!("jnbe", 0x77, _, [JUMP], [JUMP_TARGET]),
    insn!("jnc", 0x73, _, [JUMP], [JUMP_TARGET]),
    insn!("jne", 0x75, _, [JUMP], [JUMP_TARGET]),
    insn!("jng", 0x7e, _, [JUMP], [JUMP_TARGET]),
    insn!("jnge", 0x7c, _, [JUMP], [JUMP_TARGET]),
    insn!("jnl", 0x7d, _, [JUMP], [JUMP_TARGET]),
    insn!("jnle", 0x7f, _, [JUMP], [JUMP_TARGET]),
    insn!("jno", 0x71, _, [JUMP], [JUMP_TARGET]),
    insn!("jnp", 0x7b, _, [JUMP], [JUMP_TARGET]),
    insn!("jns", 0x79, _, [JUMP], [JUMP_TARGET]),
    insn!("jnz", 0x75, _, [JUMP], [JUMP_TARGET]),
    insn!("jo", 0x70, _, [JUMP], [JUMP_TARGET]),
    insn!("jp", 0x7a, _, [JUMP], [JUMP_TARGET]),
    insn!("jpe", 0x7a, _, [JUMP], [JUMP_TARGET]),
    insn!("jpo", 0x7b, _, [JUMP], [JUMP_TARGET]),
    insn!("js", 0x78, _, [JUMP], [JUMP_TARGET]),
    insn!("jz", 0x74, _, [JUMP], [JUMP_TARGET]),
    insn!("lahf", 0x9f, _, []),
    insn!("lcall", 0x9a, _, [JUMP_INTER_SEGMENT], [IMM16], [IMM32]),
    insn!("lcall", 0xff, 3, [MODRM], [JUMP_ABSOLUTE | MEM]),
    insn!("lds", 0xc5, _, [MODRM], [WORD_MEM], [REG32]),
    insn!("lea", 0x8d, _, [MODRM], [WORD_MEM], [WORD_REG]),
    insn!("leave", 0xc9, _, []),
    insn!("les", 0xc4, _, [MODRM], [WORD_MEM], [REG32]),
    insn!("lfs", 0x0fb4, _, [MODRM], [WORD_MEM], [REG32]),
    insn!("lgs", 0x0fb5, _, [MODRM], [WORD_MEM], [REG32]),
    insn!("ljmp", 0xea, _, [JUMP_INTER_SEGMENT], [IMM16], [IMM32]),
    insn!("ljmp", 0xff, 5, [MODRM], [JUMP_ABSOLUTE | MEM]),
    insn!("lods", 0xac, _, [W | IS_STRING]),
    insn!("lods", 0xac, _, [W | IS_STRING], [MEM]),
    insn!("loop", 0xe2, _, [JUMP_BYTE], [JUMP_TARGET]),
    insn!("loope", 0xe1, _, [JUMP_BYTE], [JUMP_TARGET]),
    insn!("loopne", 0xe0, _, [JUMP_BYTE], [JUMP_TARGET]),
    insn!("loopnz", 0xe0, _, [JUMP_BYTE], [JUMP_TARGET]),
    insn!("loopz", 0xe1, _, [JUMP_BYTE], [JUMP_TARGET]),
    insn!("lret", 0xcb, _, []),
    insn!("lret", 0xca, _, [], [IMM16]),
    insn!("lss", 0x0fb2, _, [MODRM], [WORD_MEM], [REG32]),
    insn!("mov", 0xa0, _, [D | W], [ABS32 | ANY_MEM], [ACC]),
    insn!("mov", 0x88, _, [D | W | MODRM], [REG], [REG | MEM]),
    insn!("mov", 0xb0, _, [SHORT_FORM_W], [IMM], [REG]),
    insn!("mov", 0xc6, 0, [W | MODRM], [IMM], [REG | MEM]),
    insn!("mov", 0x8c, _, [D | MODRM | IGNORE_SIZE], [SREG3 | SREG2], [WORD_REG | WORD_MEM]),
    insn!("mov", 0x0f20, _, [D | MODRM | IGNORE_SIZE], [CONTROL], [REG32]),
    insn!("mov", 0x0f21, _, [D | MODRM | IGNORE_SIZE], [DEBUG], [REG32]),
    insn!("mov", 0x0f24, _, [D | MODRM | IGNORE_SIZE], [TEST], [REG32]),
    insn!("movs", 0xa4, _, [W | IS_STRING]),
    insn!("movs", 0xa4, _, [W | IS_STRING], [MEM], [MEM]),
    insn!("movsbl", 0x0fbe, _, [MODRM | REVERSE_REG_REGMEM], [REG8 | MEM], [REG32]),
    insn!("movsbw", 0x0fbe, _, [MODRM | REVERSE_REG_REGMEM | DATA16], [REG8 | MEM], [REG16]),
    insn!("movswl", 0x0fbf, _, [MODRM | REVERSE_REG_REGMEM], [REG16 | MEM], [REG32]),
    insn!("movzbl", 0x0fb6, _, [MODRM | REVERSE_REG_REGMEM], [REG8 | MEM], [REG32]),
    insn!("movzbw", 0x0fb6, _, [MODRM | REVERSE_REG_REGMEM | DATA16], [REG8 | MEM], [REG16]),
    insn!("movzwl", 0x0fb7, _, [MODRM | REVERSE_REG_REGMEM], [REG16 | MEM], [REG32]),
    insn!("mul", 0xf6, 4, [W | MODRM], [REG | MEM]),
    insn!("mul", 0xf6, 4, [W | MODRM], [REG | MEM], [ACC]),
    insn!("neg", 0xf6, 3, [W | MODRM], [REG | MEM]),
    insn!("nop", 0x90, _, []),
    insn!("not", 0xf6, 2, [W | MODRM], [REG | MEM]),
    insn!("or", 0x08, _, [D | W | MODRM], [REG], [REG | MEM]),
    insn!("or", 0x83, 1, [MODRM], [IMM8S], [WORD_REG | WORD_MEM]),
    insn!("or", 0x0c, _, [W], [IMM], [ACC]),
    insn!("or", 0x80, 1, [W | MODRM], [IMM], [REG | MEM]),
    insn!("out", 0xe6, _, [W], [ACC], [IMM8]),
    insn!("out", 0xee, _, [W], [ACC], [INOUT_PORT_REG]),
    insn!("out", 0xe6, _, [W], [IMM8]),
    insn!("out", 0xee, _, [W], [INOUT_PORT_REG]),
    insn!("outs", 0x6e, _, [W | IS_STRING]),
    insn!("pop", 0x58, _, [SHORT_FORM], [WORD_REG]),
    insn!("pop", 0x8f, 0, [MODRM], [WORD_REG | WORD_MEM]),
    insn!("pop", 0x07, _, [SEG2_SHORT_FORM], [SREG2]),
    insn!("pop", 0x0fa1, _, [SEG3_SHORT_FORM], [SREG3]),
    insn!("popa", 0x61, _, []),
    insn!("popf", 0x9d, _, []),
    insn!("push", 0x50, _, [SHORT_FORM], [WORD_REG]),
    insn!("push", 0xff, 6, [MODRM], [WORD_REG | WORD_MEM]),
    insn!("push", 0x6a, _, [], [IMM8S]),
    insn!("push", 0x68, _, [], [IMM16 | IMM32]),
    insn!("push", 0x06, _, [SEG2_SHORT_FORM], [SREG2]),
    insn!("push", 0x0fa0, _, [SEG3_SHORT_FORM], [SREG3]),
    insn!("pusha", 0x60, _, []),
    insn!("pushf", 0x9c, _, []),
    insn!("rcl", 0xd0, 2, [W | MODRM], [IMM1], [REG | MEM]),
    insn!("rcl", 0xc0, 2, [W | MODRM], [IMM8], [REG | MEM]),
    insn!("rcl", 0xd2, 2, [W | MODRM], [SHIFT_COUNT], [REG | MEM]),
    insn!("rcl", 0xd0, 2, [W | MODRM], [REG | MEM]),
    insn!("rcr", 0xd0, 3, [W | MODRM], [IMM1], [REG | MEM]),
    insn!("rcr", 0xc0, 3, [W | MODRM], [IMM8], [REG | MEM]),
    insn!("rcr", 0xd2, 3, [W | MODRM], [SHIFT_COUNT], [REG | MEM]),
    insn!("rcr", 0xd0, 3, [W | MODRM], [REG | MEM]),
    insn!("ret", 0xc3, _, []),
    insn!("ret", 0xc2, _, [], [IMM16]),
    insn!("rol", 0xd0, 0, [W | MODRM], [IMM1], [REG | MEM]),
    insn!("rol", 0xc0, 0, [W | MODRM], [IMM8], [REG | MEM]),
    insn!("rol", 0xd2, 0, [W | MODRM], [SHIFT_COUNT], [REG | MEM]),
    insn!("rol", 0xd0, 0, [W | MODRM], [REG | MEM]),
    insn!("ror", 0xd0, 1, [W | MODRM], [IMM1], [REG | MEM]),
    insn!("ror", 0xc0, 1, [W | MODRM], [IMM8], [REG | MEM]),
    insn!("ror", 0xd2, 1, [W | MODRM], [SHIFT_COUNT], [REG | MEM]),
    insn!("ror", 0xd0, 1, [W | MODRM], [REG | MEM]),
    insn!("sahf", 0x9e, _, []),
    insn!("sal", 0xd0, 4, [W | MODRM], [IMM1], [REG | MEM]),
    insn!("sal", 0xc0, 4, [W | MODRM], [IMM8], [REG | MEM]),
    insn!("sal", 0xd2, 4, [W | MODRM], [SHIFT_COUNT], [REG | MEM]),
    insn!("sal", 0xd0, 4, [W | MODRM], [REG | MEM]),
    insn!("sar", 0xd0, 7, [W | MODRM], [IMM1], [REG | MEM]),
    insn!("sar", 0xc0, 7, [W | MODRM], [IMM8], [REG | MEM]),
    insn!("sar", 0xd2, 7, [W | MODRM], [SHIFT_COUNT], [REG | MEM]),
    insn!("sar", 0xd0, 7, [W | MODRM], [REG | MEM]),
    insn!("sbb", 0x18, _, [D | W | MODRM], [REG], [REG | MEM]),
    insn!("sbb", 0x83, 3, [MODRM], [IMM8S], [WORD_REG | WORD_MEM]),
    insn!("sbb", 0x1c, _, [W], [IMM], [ACC]),
    insn!("sbb", 0x80, 3, [W | MODRM], [IMM], [REG | MEM]),
    insn!("scas", 0xae, _, [W | IS_STRING]),
    insn!("seta", 0x0f97, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setae", 0x0f93, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setb", 0x0f92, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setbe", 0x0f96, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setc", 0x0f92, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("sete", 0x0f94, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setg", 0x0f9f, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setge", 0x0f9d, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setl", 0x0f9c, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setle", 0x0f9e, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setna", 0x0f96, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setnae", 0x0f92, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setnb", 0x0f93, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setnbe", 0x0f97, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setnc", 0x0f93, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setne", 0x0f95, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setng", 0x0f9e, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setnge", 0x0f9c, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setnl", 0x0f9d, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setnle", 0x0f9f, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setno", 0x0f91, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setnp", 0x0f9b, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setns", 0x0f99, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setnz", 0x0f95, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("seto", 0x0f90, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setp", 0x0f9a, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setpe", 0x0f9a, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setpo", 0x0f9b, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("sets", 0x0f98, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("setz", 0x0f94, 0, [MODRM], [REG8 | BYTE_MEM]),
    insn!("shl", 0xd0, 4, [W | MODRM], [IMM1], [REG | MEM]),
    insn!("shl", 0xc0, 4, [W | MODRM], [IMM8], [REG | MEM]),
    insn!("shl", 0xd2, 4, [W | MODRM], [SHIFT_COUNT], [REG | MEM]),
    insn!("shl", 0xd0, 4, [W | MODRM], [REG | MEM]),
    insn!("shld", 0x0fa4, _, [MODRM], [IMM8], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("shld", 0x0fa5, _, [MODRM], [SHIFT_COUNT], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("shld", 0x0fa5, _, [MODRM], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("shr", 0xd0, 5, [W | MODRM], [IMM1], [REG | MEM]),
    insn!("shr", 0xc0, 5, [W | MODRM], [IMM8], [REG | MEM]),
    insn!("shr", 0xd2, 5, [W | MODRM], [SHIFT_COUNT], [REG | MEM]),
    insn!("shr", 0xd0, 5, [W | MODRM], [REG | MEM]),
    insn!("shrd", 0x0fac, _, [MODRM], [IMM8], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("shrd", 0x0fad, _, [MODRM], [SHIFT_COUNT], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("shrd", 0x0fad, _, [MODRM], [WORD_REG], [WORD_REG | WORD_MEM]),
    insn!("stc", 0xf9, _, []),
    insn!("std", 0xfd, _, []),
    insn!("sti", 0xfb, _, []),
    insn!("stos", 0xaa, _, [W | IS_STRING]),
    insn!("sub", 0x28, _, [D | W | MODRM], [REG], [REG | MEM]),
    insn!("sub", 0x83, 5, [MODRM], [IMM8S], [WORD_REG | WORD_MEM]),
    insn!("sub", 0x2c, _, [W], [IMM], [ACC]),
    insn!("sub", 0x80, 5, [W | MODRM], [IMM], [REG | MEM]),
    insn!("test", 0x84, _, [W | MODRM], [REG | MEM], [REG]),
    insn!("test", 0x84, _, [W | MODRM], [REG], [REG | MEM]),
    insn!("test", 0xa8, _, [W], [IMM], [ACC]),
    insn!("test", 0xf6, 0, [W | MODRM], [IMM], [REG | MEM]),
    insn!("wait", 0x9b, _, []),
    insn!("xchg", 0x90, _, [SHORT_FORM], [WORD_REG], [ACC]),
    insn!("xchg", 0x90, _, [SHORT_FORM], [ACC], [WORD_REG]),
    insn!("xchg", 0x86, _, [W | MODRM], [REG], [REG | MEM]),
    insn!("xchg", 0x86, _, [W | MODRM], [REG | MEM], [REG]),
    insn!("xlat", 0xd7, _, [IS_STRING]),
    insn!("xor", 0x30, _, [D | W | MODRM], [REG], [REG | MEM]),
    insn!("xor", 0x83, 6, [MODRM], [IMM8S], [WORD_REG | WORD_MEM]),
    insn!("xor", 0x34, _, [W], [IMM], [ACC]),
    insn!("xor", 0x80, 6, [W | MODRM], [IMM], [REG | MEM]),
];

/// The full template table.
#[must_use]
pub fn all() -> &'static [Template] {
    TEMPLATES
}

/// Templates of exactly this mnemonic.
fn find(name: &str) -> Option<&'static [Template]> {
    let start = TEMPLATES.partition_point(|t| t.name < name);
    let len = TEMPLATES[start..]
        .iter()
        .take_while(|t| t.name == name)
        .count();
    if len == 0 {
        None
    } else {
        Some(&TEMPLATES[start..start + len])
    }
}

/// Look up a (case-folded) mnemonic.
///
/// The name is tried as written first; failing that, a trailing `b`, `w`
/// or `l` is taken as a size suffix and the stem is tried.
#[must_use]
pub fn lookup(mnemonic: &str) -> Option<(&'static [Template], Option<Suffix>)> {
    if let Some(templates) = find(mnemonic) {
        return Some((templates, None));
    }
    let last = mnemonic.chars().last()?;
    let suffix = Suffix::from_char(last)?;
    let stem = &mnemonic[..mnemonic.len() - 1];
    find(stem).map(|templates| (templates, Some(suffix)))
}
