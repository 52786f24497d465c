//! The in-progress instruction.
//!
//! An [`Insn`] is built from a [`Match`] and the parsed operands, and holds
//! everything the encoder needs: the final opcode, the prefix bytes and the
//! resolved ModRM/SIB fields. Every remaining error is raised here, so
//! encoding an `Insn` cannot fail.

#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::string::ToString;
use alloc::vec::Vec;

use crate::encoder::{self, Addressing};
use crate::error::{AsmError, Span};
use crate::expr::Value;
use crate::flags::{fits_in_signed_byte, OperandFlags};
use crate::matcher::Match;
use crate::operand::ParsedOperand;
use crate::register::{Register, SEG_CS, SEG_DS, SEG_ES, SEG_FS, SEG_GS, SEG_SS};
use crate::template::{Modifiers, Suffix, Template};

/// Most prefix bytes one instruction may carry.
pub const MAX_PREFIXES: usize = 4;

pub(crate) const LOCK_PREFIX: u8 = 0xf0;
pub(crate) const REPNE_PREFIX: u8 = 0xf2;
pub(crate) const REPE_PREFIX: u8 = 0xf3;
pub(crate) const DATA_PREFIX: u8 = 0x66;
pub(crate) const ADDR_PREFIX: u8 = 0x67;

const INT_OPCODE: u32 = 0xcd;
const INT3_OPCODE: u32 = 0xcc;
const POP_SEG2_OPCODE: u32 = 0x07;

/// Segment override prefix byte for a segment register number.
pub(crate) fn segment_prefix(num: u8) -> u8 {
    match num {
        SEG_ES => 0x26,
        SEG_CS => 0x2e,
        SEG_SS => 0x36,
        SEG_FS => 0x64,
        SEG_GS => 0x65,
        _ => 0x3e,
    }
}

/// A matched instruction with its encoding fields resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insn {
    /// The template it was matched against.
    pub template: &'static Template,
    /// Operands were matched in reverse order.
    pub reversed: bool,
    /// Operand size.
    pub suffix: Option<Suffix>,
    /// Final opcode (direction, width and short-form bits applied).
    pub opcode: u32,
    /// Operands, with flags narrowed to the matched classes.
    pub operands: Vec<ParsedOperand>,
    /// Prefix bytes in emission order.
    pub prefixes: Vec<u8>,
    /// ModRM, SIB and displacement layout, when the template uses ModRM.
    pub addressing: Option<Addressing>,
}

impl Insn {
    /// Finalize a match.
    ///
    /// `prefixes` are the prefix bytes written before the mnemonic and
    /// `segment` the override collected from the operands.
    pub fn build(
        m: Match,
        mut operands: Vec<ParsedOperand>,
        prefixes: &[u8],
        segment: Option<&'static Register>,
        mnemonic: &str,
        span: Span,
    ) -> Result<Self, AsmError> {
        let t = m.template;
        for (k, op) in operands.iter_mut().enumerate() {
            op.flags = m.types[k];
        }

        let mut insn = Insn {
            template: t,
            reversed: m.reversed,
            suffix: m.suffix,
            opcode: t.opcode,
            operands,
            prefixes: Vec::with_capacity(MAX_PREFIXES),
            addressing: None,
        };

        insn.apply_direction_and_width();
        insn.add_prefixes(prefixes, segment.is_some(), span)?;

        let regs = insn.encoded_registers();
        insn.apply_short_forms(&regs, mnemonic, span)?;
        insn.collapse_int3();
        insn.check_short_branch(span)?;

        if t.has(Modifiers::MODRM) {
            let mem = insn.operands.iter().find(|op| op.flags.is_memory());
            insn.addressing = Some(encoder::addressing(
                &regs,
                mem,
                t.extension,
                t.has(Modifiers::REVERSE_REG_REGMEM),
            ));
        }
        if let Some(seg) = segment {
            insn.add_segment_override(seg, span)?;
        }
        Ok(insn)
    }

    fn apply_direction_and_width(&mut self) {
        let t = self.template;
        if self.reversed {
            if t.has(Modifiers::FLOAT_D) {
                self.opcode ^= 0x400;
            } else {
                self.opcode |= 2;
            }
        }
        if t.has(Modifiers::W) && self.suffix != Some(Suffix::Byte) {
            self.opcode |= 1;
        }
    }

    fn add_prefixes(&mut self, written: &[u8], has_segment: bool, span: Span) -> Result<(), AsmError> {
        let t = self.template;
        if (!written.is_empty() || has_segment) && t.has(Modifiers::JUMP | Modifiers::JUMP_INTER_SEGMENT) {
            return Err(malformed_prefix("prefixes are not allowed on this jump", span));
        }
        for &p in written {
            if matches!(p, REPE_PREFIX | REPNE_PREFIX) && !t.has(Modifiers::IS_STRING) {
                return Err(malformed_prefix(
                    format!("`rep' prefix used with non-string instruction `{}'", t.name),
                    span,
                ));
            }
            self.push_prefix(p, span)?;
        }

        let word = self.suffix == Some(Suffix::Word) && !t.has(Modifiers::IGNORE_SIZE);
        if (word || t.has(Modifiers::DATA16)) && !self.prefixes.contains(&DATA_PREFIX) {
            self.push_prefix(DATA_PREFIX, span)?;
        }
        Ok(())
    }

    fn push_prefix(&mut self, p: u8, span: Span) -> Result<(), AsmError> {
        if self.prefixes.contains(&p) {
            return Err(malformed_prefix("same prefix used twice", span));
        }
        if self.prefixes.len() >= MAX_PREFIXES {
            return Err(malformed_prefix("too many prefixes", span));
        }
        self.prefixes.push(p);
        Ok(())
    }

    /// Registers that end up in the encoding, in operand order.
    fn encoded_registers(&self) -> Vec<&'static Register> {
        let mut regs: Vec<&'static Register> = self
            .operands
            .iter()
            .filter(|op| op.flags.intersects(OperandFlags::ENCODED_REG))
            .filter_map(|op| op.reg)
            .collect();
        if self.template.has(Modifiers::IMUL_KLUDGE | Modifiers::ICLR_KLUDGE) {
            if let Some(&r) = regs.first() {
                regs.push(r);
            }
        }
        regs
    }

    fn apply_short_forms(
        &mut self,
        regs: &[&'static Register],
        mnemonic: &str,
        span: Span,
    ) -> Result<(), AsmError> {
        let t = self.template;
        let Some(reg) = regs.first() else {
            return Ok(());
        };
        let num = u32::from(reg.num);
        if t.has(Modifiers::SHORT_FORM) {
            self.opcode |= num;
        } else if t.has(Modifiers::SHORT_FORM_W) {
            self.opcode |= num;
            if self.suffix != Some(Suffix::Byte) {
                self.opcode |= 8;
            }
        } else if t.has(Modifiers::SEG2_SHORT_FORM) {
            if t.opcode == POP_SEG2_OPCODE && reg.num == SEG_CS {
                return Err(AsmError::NoMatchingInstruction {
                    mnemonic: mnemonic.to_string(),
                    detail: String::from("you can't `pop %cs' on the 386"),
                    span,
                });
            }
            self.opcode |= num << 3;
        } else if t.has(Modifiers::SEG3_SHORT_FORM) && reg.num == SEG_GS {
            self.opcode |= 8;
        }
        Ok(())
    }

    /// `int $3` has a one-byte opcode of its own.
    fn collapse_int3(&mut self) {
        if self.opcode != INT_OPCODE {
            return;
        }
        if let Some(op) = self.operands.first_mut() {
            if op.imm.as_ref().and_then(Value::as_constant) == Some(3) {
                self.opcode = INT3_OPCODE;
                op.imm = None;
                op.flags -= OperandFlags::IMM;
            }
        }
    }

    fn check_short_branch(&self, span: Span) -> Result<(), AsmError> {
        if !self.template.has(Modifiers::JUMP_BYTE) {
            return Ok(());
        }
        let target = self
            .operands
            .first()
            .and_then(|op| op.disp.as_ref())
            .and_then(Value::as_constant);
        match target {
            Some(n) if !fits_in_signed_byte(n) => Err(AsmError::BranchOutOfRange {
                symbol: n.to_string(),
                disp: n,
                max: 127,
                span,
            }),
            _ => Ok(()),
        }
    }

    fn add_segment_override(&mut self, seg: &'static Register, span: Span) -> Result<(), AsmError> {
        let default = self.addressing.map_or(SEG_DS, |a| a.default_segment);
        if seg.num != default {
            let p = segment_prefix(seg.num);
            if !self.prefixes.contains(&p) {
                self.push_prefix(p, span)?;
            }
        }
        Ok(())
    }
}

fn malformed_prefix(msg: impl Into<String>, span: Span) -> AsmError {
    AsmError::MalformedPrefix {
        msg: msg.into(),
        span,
    }
}
