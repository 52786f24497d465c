//! i386 instruction encoder.
//!
//! Turns a finalized [`Insn`] into bytes: prefixes, opcode, ModRM, SIB,
//! displacement and immediates, in that order. Operands that are not
//! resolved constants leave zero-filled fields and a [`Relocation`].
//! Relaxable branches to a symbol produce no bytes at all, only a
//! [`RelaxRequest`] for the linker.

use alloc::rc::Rc;
#[allow(unused_imports)]
use alloc::string::ToString;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{AsmError, Span};
use crate::expr::{SymbolLookup, Value};
use crate::flags::{fits_in_32_bits, fits_in_signed_byte, OperandFlags};
use crate::insn::Insn;
use crate::matcher;
use crate::operand::{OperandParser, ParsedOperand};
use crate::register::{Register, SEG_DS, SEG_SS};
use crate::relax::{JumpKind, RelaxState};
use crate::template::{self, Modifiers};

// ─── InstrBytes: stack-allocated instruction buffer ────────────────────

/// Inline byte buffer for one instruction.
///
/// An i386 instruction is at most 15 bytes, so encoding never touches the
/// heap for the bytes themselves.
#[derive(Clone)]
pub struct InstrBytes {
    data: [u8; 16],
    len: u8,
}

impl InstrBytes {
    /// Create an empty buffer.
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: [0; 16],
            len: 0,
        }
    }

    /// Create a buffer pre-filled from a byte slice (max 16 bytes).
    #[inline]
    pub fn from_slice(src: &[u8]) -> Self {
        let mut buf = Self::new();
        buf.extend_from_slice(src);
        buf
    }

    /// Append a single byte.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is already full.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        assert!(
            (self.len as usize) < 16,
            "InstrBytes overflow: cannot push beyond 16 bytes"
        );
        self.data[self.len as usize] = byte;
        self.len += 1;
    }

    /// Append a slice of bytes.
    ///
    /// # Panics
    ///
    /// Panics if appending would exceed the capacity.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let start = self.len as usize;
        let end = start + bytes.len();
        assert!(
            end <= 16,
            "InstrBytes overflow: {} + {} exceeds 16-byte capacity",
            start,
            bytes.len()
        );
        self.data[start..end].copy_from_slice(bytes);
        self.len = end as u8;
    }

    /// Number of bytes in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert to a heap-allocated `Vec<u8>`.
    #[inline]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_ref().to_vec()
    }
}

impl Default for InstrBytes {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl core::ops::Deref for InstrBytes {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

impl core::ops::DerefMut for InstrBytes {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.len as usize]
    }
}

impl AsRef<[u8]> for InstrBytes {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl core::fmt::Debug for InstrBytes {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq for InstrBytes {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl Eq for InstrBytes {}

impl PartialEq<[u8]> for InstrBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

impl PartialEq<Vec<u8>> for InstrBytes {
    fn eq(&self, other: &Vec<u8>) -> bool {
        **self == **other
    }
}

// ─── EncodedInstr ──────────────────────────────────────────

/// Result of encoding a single instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInstr {
    /// The machine code bytes. Empty for a relaxable branch to a symbol.
    pub bytes: InstrBytes,
    /// Fields left for the linker or the object writer, offsets relative
    /// to the start of `bytes`.
    pub relocations: Vec<Relocation>,
    /// Set for a relaxable branch whose target is a symbol.
    pub relax: Option<RelaxRequest>,
}

/// ELF i386 relocation type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelocKind {
    /// `R_386_8`
    Abs8,
    /// `R_386_16`
    Abs16,
    /// `R_386_32`
    Abs32,
    /// `R_386_PC8`
    Pc8,
    /// `R_386_PC16`
    Pc16,
    /// `R_386_PC32`
    Pc32,
}

impl RelocKind {
    /// Kind of a field of `size` bytes.
    pub fn for_field(size: u8, pc_relative: bool) -> Self {
        match (size, pc_relative) {
            (1, false) => RelocKind::Abs8,
            (2, false) => RelocKind::Abs16,
            (_, false) => RelocKind::Abs32,
            (1, true) => RelocKind::Pc8,
            (2, true) => RelocKind::Pc16,
            (_, true) => RelocKind::Pc32,
        }
    }

    /// Numeric ELF relocation type.
    pub fn elf_type(self) -> u32 {
        match self {
            RelocKind::Abs32 => 1,
            RelocKind::Pc32 => 2,
            RelocKind::Abs16 => 20,
            RelocKind::Pc16 => 21,
            RelocKind::Abs8 => 22,
            RelocKind::Pc8 => 23,
        }
    }
}

impl core::fmt::Display for RelocKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            RelocKind::Abs8 => "R_386_8",
            RelocKind::Abs16 => "R_386_16",
            RelocKind::Abs32 => "R_386_32",
            RelocKind::Pc8 => "R_386_PC8",
            RelocKind::Pc16 => "R_386_PC16",
            RelocKind::Pc32 => "R_386_PC32",
        };
        f.pad(name)
    }
}

/// A field whose value depends on a symbol.
///
/// The field itself holds zeros; the value is `S + addend` for an absolute
/// field and `S + addend - (address of the byte after the field)` for a
/// pc-relative one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relocation {
    /// Offset of the field.
    pub offset: usize,
    /// Field size in bytes (1, 2 or 4).
    pub size: u8,
    /// Symbol the field refers to. `Rc<str>` so that moving relocations
    /// between fragments is a refcount bump.
    pub symbol: Rc<str>,
    /// Constant added to the symbol.
    pub addend: i64,
    /// Whether the value is relative to the end of the field.
    pub pc_relative: bool,
    /// ELF relocation type.
    pub kind: RelocKind,
}

impl Relocation {
    /// Build a relocation, deriving its kind from size and pc-relativity.
    pub fn new(offset: usize, size: u8, symbol: Rc<str>, addend: i64, pc_relative: bool) -> Self {
        Self {
            offset,
            size,
            symbol,
            addend,
            pc_relative,
            kind: RelocKind::for_field(size, pc_relative),
        }
    }
}

/// A relaxable branch to a symbol, to be sized by the linker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaxRequest {
    /// The one-byte short-form opcode (`0xeb` or `0x70..=0x7f`).
    pub opcode: u8,
    /// Conditional or unconditional.
    pub kind: JumpKind,
    /// Branch target.
    pub symbol: Rc<str>,
    /// Constant added to the target.
    pub addend: i64,
}

// ─── ModRM / SIB ───────────────────────────────────────────

/// `rm` value announcing a SIB byte.
pub const ESCAPE_TO_SIB: u8 = 4;
/// SIB `index` value meaning "no index".
pub const NO_INDEX: u8 = 4;
/// SIB `base` (with mode 0) or `rm` (with mode 0) meaning "disp32, no base".
pub const NO_BASE: u8 = 5;

/// ModRM fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRm {
    /// Addressing mode (0..=3; 3 is register-direct).
    pub mode: u8,
    /// Register or opcode extension.
    pub reg: u8,
    /// Register or memory form.
    pub rm: u8,
}

impl ModRm {
    /// The encoded byte.
    #[inline]
    pub fn byte(self) -> u8 {
        (self.mode << 6) | ((self.reg & 7) << 3) | (self.rm & 7)
    }
}

/// SIB fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sib {
    /// log2 of the scale.
    pub scale: u8,
    /// Index register number, or [`NO_INDEX`].
    pub index: u8,
    /// Base register number, or [`NO_BASE`].
    pub base: u8,
}

impl Sib {
    /// The encoded byte.
    #[inline]
    pub fn byte(self) -> u8 {
        (self.scale << 6) | ((self.index & 7) << 3) | (self.base & 7)
    }
}

/// Resolved addressing of a ModRM instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    /// The ModRM fields.
    pub modrm: ModRm,
    /// The SIB fields, when `rm` escapes to a SIB byte.
    pub sib: Option<Sib>,
    /// Displacement bytes to emit (0, 1 or 4).
    pub disp_size: u8,
    /// Segment the addressing form uses without an override.
    pub default_segment: u8,
}

/// Lay out ModRM, SIB and displacement.
///
/// `regs` are the registers that go into the ModRM byte, in operand order;
/// `mem` is the memory operand, if any.
pub(crate) fn addressing(
    regs: &[&'static Register],
    mem: Option<&ParsedOperand>,
    extension: Option<u8>,
    reverse_reg_regmem: bool,
) -> Addressing {
    let Some(mem) = mem else {
        return register_direct(regs, extension, reverse_reg_regmem);
    };

    let mut a = memory_form(mem);
    a.modrm.reg = match (extension, regs.first()) {
        (Some(ext), _) => ext,
        (None, Some(r)) => r.num,
        (None, None) => 0,
    };
    a
}

fn register_direct(
    regs: &[&'static Register],
    extension: Option<u8>,
    reverse_reg_regmem: bool,
) -> Addressing {
    let (reg, rm) = match regs {
        [a, b, ..] => {
            let (a, b) = if reverse_reg_regmem { (b, a) } else { (a, b) };
            if b.flags.intersects(OperandFlags::SPECIAL_REG) {
                (b.num, a.num)
            } else {
                (a.num, b.num)
            }
        }
        [r] => match extension {
            Some(ext) => (ext, r.num),
            None => (r.num, 0),
        },
        [] => (extension.unwrap_or(0), 0),
    };
    Addressing {
        modrm: ModRm { mode: 3, reg, rm },
        sib: None,
        disp_size: 0,
        default_segment: SEG_DS,
    }
}

fn memory_form(mem: &ParsedOperand) -> Addressing {
    let scale = mem.log2_scale;
    match (mem.base, mem.index) {
        (None, index) if index.is_some() || mem.flags.contains(OperandFlags::BASE_INDEX) => {
            // no base: SIB with disp32
            Addressing {
                modrm: ModRm {
                    mode: 0,
                    reg: 0,
                    rm: ESCAPE_TO_SIB,
                },
                sib: Some(Sib {
                    scale,
                    index: index.map_or(NO_INDEX, |r| r.num),
                    base: NO_BASE,
                }),
                disp_size: 4,
                default_segment: SEG_DS,
            }
        }
        (None, _) => Addressing {
            modrm: ModRm {
                mode: 0,
                reg: 0,
                rm: NO_BASE,
            },
            sib: None,
            disp_size: 4,
            default_segment: SEG_DS,
        },
        (Some(base), index) => {
            let mut mode = match &mem.disp {
                None => 0,
                Some(Value::Absolute(n)) if fits_in_signed_byte(*n) => 1,
                Some(_) => 2,
            };
            // (%ebp) has no mode-0 form: use a zero disp8
            if mode == 0 && base.is_ebp() {
                mode = 1;
            }
            let (rm, sib) = if index.is_some() || base.is_esp() {
                let sib = Sib {
                    scale,
                    index: index.map_or(NO_INDEX, |r| r.num),
                    base: base.num,
                };
                (ESCAPE_TO_SIB, Some(sib))
            } else {
                (base.num, None)
            };
            let default_segment = if base.is_esp() || base.is_ebp() {
                SEG_SS
            } else {
                SEG_DS
            };
            Addressing {
                modrm: ModRm { mode, reg: 0, rm },
                sib,
                disp_size: match mode {
                    1 => 1,
                    2 => 4,
                    _ => 0,
                },
                default_segment,
            }
        }
    }
}

// ─── emission ──────────────────────────────────────────────

/// Append the opcode, most significant non-zero byte first.
fn push_opcode(buf: &mut InstrBytes, opcode: u32) {
    let bytes = opcode.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(3);
    buf.extend_from_slice(&bytes[first..]);
}

/// Append a `size`-byte field holding `value`, or zeros and a relocation.
fn push_field(
    buf: &mut InstrBytes,
    relocations: &mut Vec<Relocation>,
    value: Option<&Value>,
    size: u8,
    pc_relative: bool,
) {
    let n = match value {
        Some(Value::Absolute(n)) => *n,
        Some(v) => {
            if let Some((symbol, addend)) = v.symbol() {
                relocations.push(Relocation::new(buf.len(), size, symbol.clone(), addend, pc_relative));
            }
            0
        }
        None => 0,
    };
    // operand parsing rejects constants wider than 32 bits
    debug_assert!(fits_in_32_bits(n), "field value {n:#x} wider than 32 bits");
    buf.extend_from_slice(&n.to_le_bytes()[..usize::from(size)]);
}

/// Parse, match and encode one instruction.
///
/// `mnemonic` must already be case-folded; `prefixes` are the bytes of the
/// prefix mnemonics written before it.
pub fn encode_instruction<S: AsRef<str>>(
    mnemonic: &str,
    operands: &[S],
    prefixes: &[u8],
    symbols: &dyn SymbolLookup,
    span: Span,
) -> Result<EncodedInstr, AsmError> {
    let (templates, suffix) = template::lookup(mnemonic).ok_or_else(|| AsmError::UnknownMnemonic {
        mnemonic: mnemonic.to_string(),
        span,
    })?;
    let mut parser = OperandParser::new(suffix, symbols, span);
    let parsed = operands
        .iter()
        .map(|op| parser.parse(op.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let m = matcher::select(templates, suffix, &parsed, mnemonic, span)?;
    let insn = Insn::build(m, parsed, prefixes, parser.segment(), mnemonic, span)?;
    Ok(encode(&insn))
}

/// Encode a finalized instruction.
pub fn encode(insn: &Insn) -> EncodedInstr {
    let t = insn.template;
    let mut buf = InstrBytes::new();
    let mut relocations = Vec::new();
    buf.extend_from_slice(&insn.prefixes);

    if t.has(Modifiers::JUMP) {
        return encode_relaxable(insn, buf);
    }

    push_opcode(&mut buf, insn.opcode);

    if t.has(Modifiers::JUMP_BYTE | Modifiers::JUMP_DWORD) {
        let size = if t.has(Modifiers::JUMP_BYTE) { 1 } else { 4 };
        let target = insn.operands.first().and_then(|op| op.disp.as_ref());
        push_field(&mut buf, &mut relocations, target, size, true);
        return EncodedInstr {
            bytes: buf,
            relocations,
            relax: None,
        };
    }

    if t.has(Modifiers::JUMP_INTER_SEGMENT) {
        // operands are `$selector, $offset`; the offset is emitted first
        let imm = |k: usize| insn.operands.get(k).and_then(|op| op.imm.as_ref());
        push_field(&mut buf, &mut relocations, imm(1), 4, false);
        push_field(&mut buf, &mut relocations, imm(0), 2, false);
        return EncodedInstr {
            bytes: buf,
            relocations,
            relax: None,
        };
    }

    if let Some(a) = &insn.addressing {
        buf.push(a.modrm.byte());
        if let Some(sib) = a.sib {
            buf.push(sib.byte());
        }
        if a.disp_size > 0 {
            let disp = insn.operands.iter().find(|op| op.flags.is_memory()).and_then(|op| op.disp.as_ref());
            push_field(&mut buf, &mut relocations, disp, a.disp_size, false);
        }
    } else if !t.has(Modifiers::IS_STRING) {
        // moffs forms
        if let Some(op) = insn.operands.iter().find(|op| op.flags.contains(OperandFlags::ABS32)) {
            push_field(&mut buf, &mut relocations, op.disp.as_ref(), 4, false);
        }
    }

    for op in &insn.operands {
        let size = op.flags.imm_size();
        if size > 0 && op.imm.is_some() {
            push_field(&mut buf, &mut relocations, op.imm.as_ref(), size, false);
        }
    }

    EncodedInstr {
        bytes: buf,
        relocations,
        relax: None,
    }
}

/// `jmp`/`jcc`: a constant target is encoded at its final size right away;
/// a symbol becomes a relax request.
fn encode_relaxable(insn: &Insn, mut buf: InstrBytes) -> EncodedInstr {
    let opcode = insn.opcode as u8;
    let kind = JumpKind::of_opcode(opcode);
    let target = insn.operands.first().and_then(|op| op.disp.as_ref());

    if let Some((symbol, addend)) = target.and_then(Value::symbol) {
        return EncodedInstr {
            bytes: buf,
            relocations: Vec::new(),
            relax: Some(RelaxRequest {
                opcode,
                kind,
                symbol: symbol.clone(),
                addend,
            }),
        };
    }

    let disp = target.and_then(Value::as_constant).unwrap_or(0);
    let state = if fits_in_signed_byte(disp) {
        RelaxState::initial(kind)
    } else {
        RelaxState::terminal(kind)
    };
    buf.extend_from_slice(&state.emit(opcode, disp));
    EncodedInstr {
        bytes: buf,
        relocations: Vec::new(),
        relax: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::NoSymbols;
    use crate::register;

    fn enc(mnemonic: &str, operands: &[&str]) -> Result<EncodedInstr, AsmError> {
        encode_instruction(mnemonic, operands, &[], &NoSymbols, Span::new(1, 1))
    }

    fn bytes(mnemonic: &str, operands: &[&str]) -> Vec<u8> {
        enc(mnemonic, operands).unwrap().bytes.to_vec()
    }

    #[test]
    fn instr_bytes_basics() {
        let mut b = InstrBytes::from_slice(&[0x0f, 0x05]);
        b.push(0x90);
        assert_eq!(b.len(), 3);
        assert_eq!(b, vec![0x0f, 0x05, 0x90]);
        assert!(InstrBytes::new().is_empty());
    }

    #[test]
    fn modrm_and_sib_bytes() {
        assert_eq!(ModRm { mode: 1, reg: 0, rm: 4 }.byte(), 0x44);
        assert_eq!(Sib { scale: 1, index: 1, base: 3 }.byte(), 0x4b);
    }

    #[test]
    fn opcode_bytes_msb_first() {
        let mut b = InstrBytes::new();
        push_opcode(&mut b, 0x0faf);
        assert_eq!(b, vec![0x0f, 0xaf]);
        let mut b = InstrBytes::new();
        push_opcode(&mut b, 0x00);
        assert_eq!(b, vec![0x00]);
    }

    #[test]
    fn reloc_kind_types() {
        assert_eq!(RelocKind::for_field(4, true), RelocKind::Pc32);
        assert_eq!(RelocKind::Pc32.elf_type(), 2);
        assert_eq!(RelocKind::for_field(2, false).to_string(), "R_386_16");
    }

    #[test]
    fn register_direct_roles() {
        let eax = register::lookup("eax").unwrap();
        let ds = register::lookup("ds").unwrap();
        let a = addressing(&[eax, ds], None, None, false);
        assert_eq!(a.modrm, ModRm { mode: 3, reg: 3, rm: 0 });
        let ebx = register::lookup("ebx").unwrap();
        let a = addressing(&[ebx, eax], None, None, true);
        assert_eq!(a.modrm, ModRm { mode: 3, reg: 0, rm: 3 });
    }

    #[test]
    fn immediate_to_register() {
        assert_eq!(bytes("movl", &["$0x10", "%eax"]), [0xb8, 0x10, 0, 0, 0]);
        assert_eq!(bytes("addl", &["$1", "%ebx"]), [0x83, 0xc3, 0x01]);
        assert_eq!(bytes("addw", &["$0x1234", "%ax"]), [0x66, 0x05, 0x34, 0x12]);
    }

    #[test]
    fn base_index_scale() {
        assert_eq!(
            bytes("movl", &["%eax", "4(%ebx,%ecx,2)"]),
            [0x89, 0x44, 0x4b, 0x04]
        );
    }

    #[test]
    fn frame_pointer_gets_zero_disp8() {
        assert_eq!(bytes("movl", &["(%ebp)", "%eax"]), [0x8b, 0x45, 0x00]);
    }

    #[test]
    fn stack_pointer_needs_sib() {
        assert_eq!(bytes("movl", &["(%esp)", "%eax"]), [0x8b, 0x04, 0x24]);
        assert_eq!(bytes("movl", &["8(%esp)", "%eax"]), [0x8b, 0x44, 0x24, 0x08]);
    }

    #[test]
    fn index_without_base() {
        assert_eq!(
            bytes("movl", &["(,%esi,4)", "%eax"]),
            [0x8b, 0x04, 0xb5, 0, 0, 0, 0]
        );
    }

    #[test]
    fn absolute_address() {
        assert_eq!(bytes("movl", &["0x1000", "%ebx"]), [0x8b, 0x1d, 0x00, 0x10, 0, 0]);
        assert_eq!(bytes("movl", &["0x1000", "%eax"]), [0xa1, 0x00, 0x10, 0, 0]);
    }

    #[test]
    fn int3() {
        assert_eq!(bytes("int", &["$3"]), [0xcc]);
        assert_eq!(bytes("int", &["$0x80"]), [0xcd, 0x80]);
    }

    #[test]
    fn symbolic_displacement_relocates() {
        let e = enc("movl", &["foo+8(%ebx)", "%eax"]).unwrap();
        assert_eq!(e.bytes, vec![0x8b, 0x83, 0, 0, 0, 0]);
        assert_eq!(e.relocations.len(), 1);
        let r = &e.relocations[0];
        assert_eq!((r.offset, r.size, r.addend), (2, 4, 8));
        assert_eq!(&*r.symbol, "foo");
        assert_eq!(r.kind, RelocKind::Abs32);
    }

    #[test]
    fn symbolic_immediate_relocates() {
        let e = enc("pushl", &["$msg"]).unwrap();
        assert_eq!(e.bytes, vec![0x68, 0, 0, 0, 0]);
        assert_eq!(e.relocations[0].offset, 1);
    }

    #[test]
    fn call_is_pc_relative() {
        let e = enc("call", &["printf"]).unwrap();
        assert_eq!(e.bytes, vec![0xe8, 0, 0, 0, 0]);
        assert!(e.relocations[0].pc_relative);
        assert_eq!(e.relocations[0].kind, RelocKind::Pc32);
    }

    #[test]
    fn jump_to_symbol_requests_relaxation() {
        let e = enc("jne", &["done"]).unwrap();
        assert!(e.bytes.is_empty());
        let r = e.relax.unwrap();
        assert_eq!(r.opcode, 0x75);
        assert_eq!(r.kind, JumpKind::Conditional);
    }

    #[test]
    fn jump_to_constant() {
        assert_eq!(bytes("jmp", &["0x10"]), [0xeb, 0x10]);
        assert_eq!(bytes("jmp", &["0x1000"]), [0xe9, 0x00, 0x10, 0, 0]);
        assert_eq!(bytes("je", &["0x1000"]), [0x0f, 0x84, 0x00, 0x10, 0, 0]);
    }

    #[test]
    fn far_jump() {
        assert_eq!(
            bytes("ljmp", &["$0x10", "$0x1000"]),
            [0xea, 0x00, 0x10, 0, 0, 0x10, 0x00]
        );
    }

    #[test]
    fn jcxz_has_address_size_prefix() {
        assert_eq!(bytes("jcxz", &["0x4"]), [0x67, 0xe3, 0x04]);
    }

    #[test]
    fn unknown_mnemonic() {
        assert!(matches!(
            enc("movq", &["%eax", "%ebx"]),
            Err(AsmError::UnknownMnemonic { .. })
        ));
    }

    #[test]
    fn string_instruction_has_no_displacement() {
        assert_eq!(bytes("movsb", &["(%esi)", "(%edi)"]), [0xa4]);
        assert_eq!(bytes("lodsl", &[]), [0xad]);
    }
}
