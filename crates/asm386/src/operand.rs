//! AT&T operand parsing.
//!
//! One operand string becomes a [`ParsedOperand`]: a register, an
//! immediate, or a memory reference. The parser is split into named
//! sub-parsers (segment override, base/index, displacement) that each
//! return a tagged result; [`OperandParser::parse`] dispatches between them.

#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::string::ToString;

use crate::error::{AsmError, Span};
use crate::expr::{self, SymbolLookup, Value};
use crate::flags::{fits_in_32_bits, smallest_disp_type, smallest_imm_type, OperandFlags};
use crate::register::{self, Register};
use crate::template::Suffix;

const REGISTER_PREFIX: char = '%';
const IMMEDIATE_PREFIX: char = '$';
const ABSOLUTE_PREFIX: char = '*';

/// A classified operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOperand {
    /// Current classification. Narrowed by the matcher.
    pub flags: OperandFlags,
    /// Register operand.
    pub reg: Option<&'static Register>,
    /// Immediate value.
    pub imm: Option<Value>,
    /// Displacement (or absolute address) of a memory operand.
    pub disp: Option<Value>,
    /// Base register of a memory operand.
    pub base: Option<&'static Register>,
    /// Index register of a memory operand.
    pub index: Option<&'static Register>,
    /// log2 of the index scale (0..=3).
    pub log2_scale: u8,
}

impl ParsedOperand {
    fn empty() -> Self {
        Self {
            flags: OperandFlags::empty(),
            reg: None,
            imm: None,
            disp: None,
            base: None,
            index: None,
            log2_scale: 0,
        }
    }

    fn register(reg: &'static Register) -> Self {
        Self {
            flags: reg.flags,
            reg: Some(reg),
            ..Self::empty()
        }
    }

    /// Whether this is a memory reference.
    #[inline]
    pub fn is_memory(&self) -> bool {
        self.flags.is_memory()
    }
}

/// What the leading characters of an operand say it is.
#[derive(Debug)]
enum Form<'t> {
    Register(&'static Register),
    SegmentOverride(&'static Register, &'t str),
    Immediate(&'t str),
    Memory(&'t str),
}

/// The parts of a parenthesised `(base,index,scale)` group.
#[derive(Debug, Default)]
struct BaseIndex {
    base: Option<&'static Register>,
    index: Option<&'static Register>,
    log2_scale: u8,
}

/// Parses the operands of one instruction.
///
/// Holds the state that spans operands: the mnemonic's size suffix and the
/// segment override, which belongs to the instruction rather than to the
/// operand it was written on.
pub struct OperandParser<'a> {
    suffix: Option<Suffix>,
    symbols: &'a dyn SymbolLookup,
    span: Span,
    segment: Option<&'static Register>,
}

impl<'a> OperandParser<'a> {
    /// Create a parser for one instruction.
    pub fn new(suffix: Option<Suffix>, symbols: &'a dyn SymbolLookup, span: Span) -> Self {
        Self {
            suffix,
            symbols,
            span,
            segment: None,
        }
    }

    /// Segment override collected so far.
    pub fn segment(&self) -> Option<&'static Register> {
        self.segment
    }

    /// Parse one trimmed operand.
    pub fn parse(&mut self, text: &str) -> Result<ParsedOperand, AsmError> {
        let (jump_absolute, text) = match text.strip_prefix(ABSOLUTE_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if text.is_empty() {
            return Err(self.lexical("missing operand"));
        }

        let mut op = match self.classify(text)? {
            Form::Register(reg) => ParsedOperand::register(reg),
            Form::SegmentOverride(seg, rest) => self.parse_segment_override(seg, rest)?,
            Form::Immediate(rest) => self.parse_immediate(rest)?,
            Form::Memory(rest) => self.parse_memory(rest)?,
        };
        if jump_absolute {
            op.flags |= OperandFlags::JUMP_ABSOLUTE;
        }
        Ok(op)
    }

    fn classify<'t>(&self, text: &'t str) -> Result<Form<'t>, AsmError> {
        if let Some(rest) = text.strip_prefix(REGISTER_PREFIX) {
            let (reg, rest) = self.read_register(rest)?;
            if rest.is_empty() {
                return Ok(Form::Register(reg));
            }
            if let Some(after) = rest.strip_prefix(':') {
                if reg.flags.intersects(OperandFlags::SREG2 | OperandFlags::SREG3) {
                    return Ok(Form::SegmentOverride(reg, after));
                }
                return Err(self.lexical(format!("`{}' is not a segment register", reg)));
            }
            return Err(self.lexical(format!("junk `{}' after register", rest)));
        }
        if let Some(rest) = text.strip_prefix(IMMEDIATE_PREFIX) {
            return Ok(Form::Immediate(rest));
        }
        Ok(Form::Memory(text))
    }

    /// Read a register name, returning the register and the unread rest.
    fn read_register<'t>(&self, text: &'t str) -> Result<(&'static Register, &'t str), AsmError> {
        let mut end = text
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(text.len());
        // %st(N)
        if text[..end].eq_ignore_ascii_case("st") && text[end..].starts_with('(') {
            if let Some(close) = text[end..].find(')') {
                end += close + 1;
            }
        }
        let name = text[..end].to_ascii_lowercase();
        match register::lookup(&name) {
            Some(reg) => Ok((reg, &text[end..])),
            None => Err(AsmError::UnknownRegister {
                name,
                span: self.span,
            }),
        }
    }

    fn parse_segment_override(
        &mut self,
        seg: &'static Register,
        rest: &str,
    ) -> Result<ParsedOperand, AsmError> {
        let (jump_absolute, rest) = match rest.strip_prefix(ABSOLUTE_PREFIX) {
            Some(r) => (true, r),
            None => (false, rest),
        };
        let legal_start = rest
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '(' || c == '-' || expr::is_symbol_start(c));
        if !legal_start {
            return Err(self.lexical(format!(
                "bad memory operand `{}' after segment override",
                rest
            )));
        }
        if let Some(prev) = self.segment {
            if prev != seg {
                return Err(AsmError::MalformedPrefix {
                    msg: format!("conflicting segment overrides `{}' and `{}'", prev, seg),
                    span: self.span,
                });
            }
        }
        self.segment = Some(seg);
        let mut op = self.parse_memory(rest)?;
        if jump_absolute {
            op.flags |= OperandFlags::JUMP_ABSOLUTE;
        }
        Ok(op)
    }

    fn parse_immediate(&self, text: &str) -> Result<ParsedOperand, AsmError> {
        let value = expr::evaluate(text, self.symbols);
        let flags = match &value {
            Value::Absolute(n) => {
                let mut flags = smallest_imm_type(*n);
                if let Some(suffix) = self.suffix {
                    flags &= suffix.imm_mask();
                }
                if flags.is_empty() {
                    let msg = match self.suffix {
                        Some(s) => format!("immediate `{}' out of range for `{}' suffix", n, s),
                        None => format!("immediate `{}' out of range", n),
                    };
                    return Err(AsmError::AmbiguousSize {
                        msg,
                        span: self.span,
                    });
                }
                flags
            }
            Value::Relative { .. } | Value::External { .. } => match self.suffix {
                Some(Suffix::Byte) => OperandFlags::IMM8,
                Some(Suffix::Word) => OperandFlags::IMM16,
                _ => OperandFlags::IMM32,
            },
            Value::Unparseable => {
                return Err(self.lexical(format!("bad immediate expression `{}'", text)))
            }
        };
        Ok(ParsedOperand {
            flags,
            imm: Some(value),
            ..ParsedOperand::empty()
        })
    }

    fn parse_memory(&self, text: &str) -> Result<ParsedOperand, AsmError> {
        let width = self.suffix.map_or(OperandFlags::MEM32, Suffix::mem_flags);

        let Some((disp_text, inner)) = self.split_base_index(text)? else {
            // pure displacement
            let disp = self.parse_displacement(text)?;
            return Ok(ParsedOperand {
                flags: width | OperandFlags::ABS32,
                disp: Some(disp),
                ..ParsedOperand::empty()
            });
        };

        let parts = self.parse_base_index(inner)?;
        let disp = if disp_text.is_empty() {
            None
        } else {
            Some(self.parse_displacement(disp_text)?)
        };

        // (%dx) names the I/O port register
        if let Some(base) = parts.base {
            if base.flags == (OperandFlags::REG16 | OperandFlags::INOUT_PORT_REG)
                && parts.index.is_none()
                && parts.log2_scale == 0
                && disp.is_none()
                && self.segment.is_none()
            {
                return Ok(ParsedOperand {
                    flags: OperandFlags::INOUT_PORT_REG,
                    reg: Some(base),
                    ..ParsedOperand::empty()
                });
            }
        }
        self.check_base_index(&parts)?;

        let mut flags = width | OperandFlags::BASE_INDEX;
        let disp = match disp {
            Some(Value::Absolute(0)) if parts.base.is_some() => None,
            Some(Value::Absolute(n)) => {
                flags |= smallest_disp_type(n);
                Some(Value::Absolute(n))
            }
            Some(symbolic) => {
                flags |= OperandFlags::DISP32;
                Some(symbolic)
            }
            None => None,
        };
        Ok(ParsedOperand {
            flags,
            disp,
            base: parts.base,
            index: parts.index,
            log2_scale: parts.log2_scale,
            ..ParsedOperand::empty()
        })
    }

    /// Split `disp(inner)` when the trailing parenthesised group is a
    /// base/index group, i.e. starts with a register or a comma.
    fn split_base_index<'t>(&self, text: &'t str) -> Result<Option<(&'t str, &'t str)>, AsmError> {
        if !text.ends_with(')') {
            if text.contains(['(', ')']) {
                return Err(self.malformed("unbalanced parenthesis"));
            }
            return Ok(None);
        }
        let mut depth = 0usize;
        let mut open = None;
        for (i, c) in text.char_indices().rev() {
            match c {
                ')' => depth += 1,
                '(' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        open = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(open) = open else {
            return Err(self.malformed("unbalanced parenthesis"));
        };
        let inner = &text[open + 1..text.len() - 1];
        if inner.starts_with(REGISTER_PREFIX) || inner.starts_with(',') {
            Ok(Some((&text[..open], inner)))
        } else {
            Ok(None)
        }
    }

    fn parse_base_index(&self, inner: &str) -> Result<BaseIndex, AsmError> {
        let mut fields = inner.split(',');
        let base_text = fields.next().unwrap_or("");
        let index_text = fields.next();
        let scale_text = fields.next();
        if fields.next().is_some() {
            return Err(self.malformed(format!("too many fields in `({})'", inner)));
        }

        let mut parts = BaseIndex::default();
        if !base_text.is_empty() {
            parts.base = Some(self.base_index_register(base_text, "base")?);
        }

        // `(,N)` is a scale with no index register
        let (index_text, scale_text) = match (index_text, scale_text) {
            (Some(idx), None) if !idx.is_empty() && !idx.starts_with(REGISTER_PREFIX) => {
                (None, Some(idx))
            }
            other => other,
        };
        if let Some(idx) = index_text.filter(|s| !s.is_empty()) {
            parts.index = Some(self.base_index_register(idx, "index")?);
        }
        if let Some(scale) = scale_text {
            parts.log2_scale = match scale {
                "1" => 0,
                "2" => 1,
                "4" => 2,
                "8" => 3,
                "" => return Err(self.malformed("missing scale factor")),
                _ => {
                    return Err(self.malformed(format!(
                        "expecting scale factor of 1, 2, 4, or 8: got `{}'",
                        scale
                    )))
                }
            };
            if parts.index.is_none() && parts.log2_scale != 0 {
                return Err(self.malformed("scale factor given without an index register"));
            }
        }
        if parts.base.is_none() && parts.index.is_none() && scale_text.is_none() {
            return Err(self.malformed(format!("bad memory operand `({})'", inner)));
        }
        Ok(parts)
    }

    fn base_index_register(&self, text: &str, role: &str) -> Result<&'static Register, AsmError> {
        let Some(name) = text.strip_prefix(REGISTER_PREFIX) else {
            return Err(self.malformed(format!("bad {} register `{}'", role, text)));
        };
        let (reg, rest) = self.read_register(name)?;
        if !rest.is_empty() || !reg.flags.intersects(OperandFlags::REG) {
            return Err(self.malformed(format!("bad {} register `{}'", role, text)));
        }
        Ok(reg)
    }

    fn check_base_index(&self, parts: &BaseIndex) -> Result<(), AsmError> {
        if let (Some(base), Some(index)) = (parts.base, parts.index) {
            if base.width() != index.width() {
                return Err(self.malformed(format!(
                    "`{}' and `{}' are not the same width",
                    base, index
                )));
            }
        }
        if let Some(index) = parts.index {
            if index.is_esp() {
                return Err(self.malformed(format!("`{}' cannot be used as an index register", index)));
            }
        }
        for reg in [parts.base, parts.index].into_iter().flatten() {
            if reg.width() != OperandFlags::REG32 {
                return Err(self.malformed(format!(
                    "`{}' is not a valid 32-bit base/index register",
                    reg
                )));
            }
        }
        Ok(())
    }

    /// Evaluate a displacement, absolute address or branch target. The
    /// constant part must fit a 32-bit field.
    fn parse_displacement(&self, text: &str) -> Result<Value, AsmError> {
        let value = match expr::evaluate(text, self.symbols) {
            Value::Unparseable => {
                return Err(self.lexical(format!("bad displacement `{}'", text)))
            }
            v => v,
        };
        let constant = match &value {
            Value::Absolute(n) => *n,
            Value::Relative { addend, .. } | Value::External { addend, .. } => *addend,
            Value::Unparseable => 0,
        };
        if !fits_in_32_bits(constant) {
            return Err(AsmError::AmbiguousSize {
                msg: format!("displacement `{}' out of range", text),
                span: self.span,
            });
        }
        Ok(value)
    }

    fn lexical(&self, msg: impl Into<String>) -> AsmError {
        AsmError::Lexical {
            msg: msg.into(),
            span: self.span,
        }
    }

    fn malformed(&self, msg: impl Into<String>) -> AsmError {
        AsmError::MalformedMemory {
            msg: msg.into(),
            span: self.span,
        }
    }
}
