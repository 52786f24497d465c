//! Template selection.
//!
//! Walks a mnemonic's templates in priority order and picks the first whose
//! operand slots accept the parsed operands, trying direction-reversible
//! templates with the first two operands swapped. Once a template is chosen
//! the operand size is settled: a missing suffix is inferred from the
//! register operands, and immediates are narrowed to one width.

#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::string::ToString;

use crate::error::{AsmError, Span};
use crate::flags::OperandFlags;
use crate::operand::ParsedOperand;
use crate::template::{Modifiers, Suffix, Template};

/// The chosen template and the operand classes it was matched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// The winning template.
    pub template: &'static Template,
    /// Operands 0 and 1 were matched against slots 1 and 0.
    pub reversed: bool,
    /// Per operand: the overlap between the operand and its slot.
    pub types: [OperandFlags; 3],
    /// Operand size, written or inferred. `None` when nothing sizes the
    /// instruction and the template does not need it.
    pub suffix: Option<Suffix>,
}

impl Match {
    /// Template slot that operand `k` was matched against.
    #[inline]
    pub fn slot(&self, k: usize) -> OperandFlags {
        self.template.types[slot_index(k, self.reversed)]
    }
}

#[inline]
fn slot_index(k: usize, reversed: bool) -> usize {
    match (reversed, k) {
        (true, 0) => 1,
        (true, 1) => 0,
        _ => k,
    }
}

/// Pick the template for `operands` and settle operand and immediate
/// sizes.
///
/// `suffix` is the size suffix written on the mnemonic, if any.
pub fn select(
    templates: &'static [Template],
    suffix: Option<Suffix>,
    operands: &[ParsedOperand],
    mnemonic: &str,
    span: Span,
) -> Result<Match, AsmError> {
    let mut m = find_template(templates, operands, mnemonic, span)?;
    m.suffix = settle_suffix(&m, suffix, operands, mnemonic, span)?;
    narrow_immediates(&mut m, operands.len(), span)?;
    Ok(m)
}

fn find_template(
    templates: &'static [Template],
    operands: &[ParsedOperand],
    mnemonic: &str,
    span: Span,
) -> Result<Match, AsmError> {
    let count = operands.len();
    let mut count_seen = false;
    for template in templates {
        if usize::from(template.operands) != count {
            continue;
        }
        count_seen = true;
        if let Some(types) = try_template(template, operands, false) {
            return Ok(Match {
                template,
                reversed: false,
                types,
                suffix: None,
            });
        }
        if template.is_reversible() {
            if let Some(types) = try_template(template, operands, true) {
                return Ok(Match {
                    template,
                    reversed: true,
                    types,
                    suffix: None,
                });
            }
        }
    }
    if count_seen {
        Err(AsmError::NoMatchingInstruction {
            mnemonic: mnemonic.to_string(),
            detail: String::new(),
            span,
        })
    } else {
        Err(AsmError::OperandCount {
            mnemonic: mnemonic.to_string(),
            given: count,
            span,
        })
    }
}

/// Match the operands against one template, returning the per-operand
/// overlaps on success.
fn try_template(
    template: &Template,
    operands: &[ParsedOperand],
    reversed: bool,
) -> Option<[OperandFlags; 3]> {
    let mut types = [OperandFlags::empty(); 3];
    let mut slots = [OperandFlags::empty(); 3];
    for (k, op) in operands.iter().enumerate() {
        let slot = template.types[slot_index(k, reversed)];
        if !op.flags.fits(slot) {
            return None;
        }
        types[k] = op.flags & slot;
        slots[k] = slot;
    }

    let pairs: &[(usize, usize)] = match operands.len() {
        2 => &[(0, 1)],
        3 => &[(0, 1), (1, 2)],
        _ => &[],
    };
    for &(a, b) in pairs {
        if !consistent_registers(
            (operands[a].flags, types[a], slots[a]),
            (operands[b].flags, types[b], slots[b]),
        ) {
            return None;
        }
    }
    Some(types)
}

/// Two register operands of different widths may only share an
/// instruction when their slots cannot both hold a general register.
///
/// Each side is `(given, overlap, slot)`; a slot matched as the
/// accumulator counts as a general register slot.
fn consistent_registers(
    a: (OperandFlags, OperandFlags, OperandFlags),
    b: (OperandFlags, OperandFlags, OperandFlags),
) -> bool {
    let (ra, rb) = (a.0 & OperandFlags::REG, b.0 & OperandFlags::REG);
    if ra.is_empty() || rb.is_empty() || ra == rb {
        return true;
    }
    let sa = if a.1.contains(OperandFlags::ACC) { OperandFlags::REG } else { a.2 };
    let sb = if b.1.contains(OperandFlags::ACC) { OperandFlags::REG } else { b.2 };
    (sa & sb & OperandFlags::REG).is_empty()
}

/// Direct branches whose displacement or far pointer width follows the
/// operand size.
const BRANCH: Modifiers = Modifiers::JUMP
    .union(Modifiers::JUMP_DWORD)
    .union(Modifiers::JUMP_BYTE)
    .union(Modifiers::JUMP_INTER_SEGMENT);

/// Whether operand `k` is a register that speaks for the operand size,
/// i.e. one not matched only as the port or the shift count.
fn sizing_register(m: &Match, op: &ParsedOperand, k: usize) -> bool {
    let overlap = m.types[k];
    op.reg.is_some_and(|r| !r.width().is_empty())
        && overlap.intersects(OperandFlags::REG | OperandFlags::ACC)
}

fn settle_suffix(
    m: &Match,
    written: Option<Suffix>,
    operands: &[ParsedOperand],
    mnemonic: &str,
    span: Span,
) -> Result<Option<Suffix>, AsmError> {
    let t = m.template;
    // 16-bit branch forms would need a rel16 or ptr16:16 field
    if written == Some(Suffix::Word) && t.has(BRANCH) {
        return Err(AsmError::NoMatchingInstruction {
            mnemonic: mnemonic.to_string(),
            detail: String::from("16-bit jumps are not supported"),
            span,
        });
    }
    if t.has(Modifiers::IGNORE_SIZE) {
        return Ok(written);
    }

    if let Some(suffix) = written {
        for (k, op) in operands.iter().enumerate() {
            if !sizing_register(m, op, k) {
                continue;
            }
            let Some(reg) = op.reg else { continue };
            let accepts = m.slot(k).intersects(suffix.reg_flags() | OperandFlags::ACC);
            if accepts && reg.width() != suffix.reg_flags() {
                return Err(AsmError::NoMatchingInstruction {
                    mnemonic: mnemonic.to_string(),
                    detail: format!("incorrect register `{}' used with `{}' suffix", reg, suffix),
                    span,
                });
            }
        }
        return Ok(Some(suffix));
    }

    let inferred = operands
        .iter()
        .enumerate()
        .rev()
        .find(|&(k, op)| sizing_register(m, op, k))
        .and_then(|(_, op)| op.reg)
        .and_then(|reg| Suffix::from_reg_width(reg.width()));

    if inferred.is_none() && t.has(Modifiers::W | Modifiers::SHORT_FORM_W) {
        return Err(AsmError::AmbiguousSize {
            msg: "no instruction mnemonic suffix given and no register operands; can't size instruction"
                .to_string(),
            span,
        });
    }
    Ok(inferred)
}

/// Reduce each immediate to a single width.
///
/// A slot that names one immediate class fixes the width itself; a slot
/// that follows the operand size takes the suffix's width, or 32 bits when
/// the instruction is unsized.
fn narrow_immediates(m: &mut Match, count: usize, span: Span) -> Result<(), AsmError> {
    for k in 0..count {
        let imm = m.types[k] & OperandFlags::IMM;
        if imm.is_empty() {
            continue;
        }
        let slot_imm = m.slot(k) & OperandFlags::IMM;
        if slot_imm.bits().count_ones() == 1 {
            continue;
        }
        let narrowed = match m.suffix {
            Some(suffix) => imm & suffix.imm_flags(),
            None if imm.contains(OperandFlags::IMM32) => OperandFlags::IMM32,
            None => OperandFlags::empty(),
        };
        if narrowed.is_empty() {
            let msg = match m.suffix {
                Some(s) => format!("immediate out of range for `{}' suffix", s),
                None => "can't determine immediate size".to_string(),
            };
            return Err(AsmError::AmbiguousSize { msg, span });
        }
        m.types[k] = (m.types[k] - OperandFlags::IMM) | narrowed;
    }
    Ok(())
}
