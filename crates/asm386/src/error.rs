//! Error types and source positions for diagnostics.

#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

/// Source location of a statement.
///
/// The front end works line by line, so a span is the 1-based line and
/// the 1-based column where the offending statement (or operand) starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub col: u32,
}

impl Span {
    /// Create a new span.
    #[must_use]
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// Span for generated or builder-API constructs.
    #[must_use]
    pub fn dummy() -> Self {
        Self { line: 0, col: 0 }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Assembly error.
///
/// The per-line variants follow the assembler's diagnostic taxonomy; any of
/// them aborts only the statement that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsmError {
    /// Invalid character or unbalanced punctuation in the statement text.
    Lexical {
        /// What was wrong.
        msg: String,
        /// Source location.
        span: Span,
    },

    /// No template list exists for the mnemonic, with or without a
    /// stripped size suffix.
    UnknownMnemonic {
        /// The mnemonic as written.
        mnemonic: String,
        /// Source location.
        span: Span,
    },

    /// `%name` does not name a register.
    UnknownRegister {
        /// The register name without the `%` marker.
        name: String,
        /// Source location.
        span: Span,
    },

    /// No template of the mnemonic takes this many operands.
    OperandCount {
        /// The mnemonic.
        mnemonic: String,
        /// Number of operands given.
        given: usize,
        /// Source location.
        span: Span,
    },

    /// Operand types do not fit any template of the mnemonic.
    NoMatchingInstruction {
        /// The mnemonic.
        mnemonic: String,
        /// Extra detail (empty when the plain message suffices).
        detail: String,
        /// Source location.
        span: Span,
    },

    /// Operand or immediate size cannot be determined (or the immediate
    /// does not fit the requested size).
    AmbiguousSize {
        /// What could not be sized.
        msg: String,
        /// Source location.
        span: Span,
    },

    /// Bad base/index/scale operand.
    MalformedMemory {
        /// What was wrong.
        msg: String,
        /// Source location.
        span: Span,
    },

    /// Duplicate prefix, prefix limit exceeded, or prefix used where it
    /// has no meaning.
    MalformedPrefix {
        /// What was wrong.
        msg: String,
        /// Source location.
        span: Span,
    },

    /// Label defined more than once.
    DuplicateLabel {
        /// The label name.
        label: String,
        /// Location of the second definition.
        span: Span,
        /// Location of the first definition.
        first_span: Span,
    },

    /// A locally resolved pc-relative field is too small for its target.
    BranchOutOfRange {
        /// Target symbol.
        symbol: String,
        /// Displacement that had to be encoded.
        disp: i64,
        /// Largest positive displacement the field can hold.
        max: i64,
        /// Location of the branch.
        span: Span,
    },

    /// Relaxation did not reach a fixed point within the pass limit.
    RelaxationLimit {
        /// Configured maximum number of passes.
        max: usize,
    },

    /// A configured resource limit was exceeded.
    ResourceLimitExceeded {
        /// Name of the resource (e.g. "lines", "errors").
        resource: String,
        /// The configured limit.
        limit: usize,
    },

    /// Several per-line errors collected over one unit.
    Multiple {
        /// The collected errors, in source order.
        errors: Vec<AsmError>,
    },
}

impl AsmError {
    /// Source location of a per-line error, if it has one.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            AsmError::Lexical { span, .. }
            | AsmError::UnknownMnemonic { span, .. }
            | AsmError::UnknownRegister { span, .. }
            | AsmError::OperandCount { span, .. }
            | AsmError::NoMatchingInstruction { span, .. }
            | AsmError::AmbiguousSize { span, .. }
            | AsmError::MalformedMemory { span, .. }
            | AsmError::MalformedPrefix { span, .. }
            | AsmError::DuplicateLabel { span, .. }
            | AsmError::BranchOutOfRange { span, .. } => Some(*span),
            AsmError::RelaxationLimit { .. }
            | AsmError::ResourceLimitExceeded { .. }
            | AsmError::Multiple { .. } => None,
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmError::Lexical { msg, span } => write!(f, "{}: {}", span, msg),
            AsmError::UnknownMnemonic { mnemonic, span } => {
                write!(f, "{}: no such 386 instruction: `{}'", span, mnemonic)
            }
            AsmError::UnknownRegister { name, span } => {
                write!(f, "{}: bad register name `%{}'", span, name)
            }
            AsmError::OperandCount {
                mnemonic,
                given,
                span,
            } => write!(
                f,
                "{}: `{}' does not take {} operand{}",
                span,
                mnemonic,
                given,
                if *given == 1 { "" } else { "s" }
            ),
            AsmError::NoMatchingInstruction {
                mnemonic,
                detail,
                span,
            } => {
                if detail.is_empty() {
                    write!(f, "{}: operands given don't match any known 386 instruction `{}'", span, mnemonic)
                } else {
                    write!(f, "{}: {} in `{}'", span, detail, mnemonic)
                }
            }
            AsmError::AmbiguousSize { msg, span } => write!(f, "{}: {}", span, msg),
            AsmError::MalformedMemory { msg, span } => write!(f, "{}: {}", span, msg),
            AsmError::MalformedPrefix { msg, span } => write!(f, "{}: {}", span, msg),
            AsmError::DuplicateLabel {
                label,
                span,
                first_span,
            } => write!(
                f,
                "{}: symbol `{}' is already defined (first defined at {})",
                span, label, first_span
            ),
            AsmError::BranchOutOfRange {
                symbol,
                disp,
                max,
                span,
            } => write!(
                f,
                "{}: branch to `{}' out of range (displacement={}, max=±{})",
                span, symbol, disp, max
            ),
            AsmError::RelaxationLimit { max } => write!(
                f,
                "branch relaxation did not converge within {} passes",
                max
            ),
            AsmError::ResourceLimitExceeded { resource, limit } => {
                write!(f, "resource limit exceeded: {} (limit: {})", resource, limit)
            }
            AsmError::Multiple { errors } => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", e)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AsmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_display() {
        assert_eq!(format!("{}", Span::new(3, 12)), "3:12");
    }

    #[test]
    fn unknown_register_display() {
        let err = AsmError::UnknownRegister {
            name: "eqx".into(),
            span: Span::new(2, 6),
        };
        assert_eq!(format!("{}", err), "2:6: bad register name `%eqx'");
    }

    #[test]
    fn no_match_display_with_and_without_detail() {
        let plain = AsmError::NoMatchingInstruction {
            mnemonic: "mov".into(),
            detail: String::new(),
            span: Span::new(1, 1),
        };
        assert_eq!(
            format!("{}", plain),
            "1:1: operands given don't match any known 386 instruction `mov'"
        );
        let detailed = AsmError::NoMatchingInstruction {
            mnemonic: "movl".into(),
            detail: "incorrect register `%ax' used with `l' suffix".into(),
            span: Span::new(4, 2),
        };
        assert_eq!(
            format!("{}", detailed),
            "4:2: incorrect register `%ax' used with `l' suffix in `movl'"
        );
    }

    #[test]
    fn operand_count_pluralises() {
        let one = AsmError::OperandCount {
            mnemonic: "ret".into(),
            given: 1,
            span: Span::new(1, 1),
        };
        assert!(format!("{}", one).ends_with("1 operand"));
        let three = AsmError::OperandCount {
            mnemonic: "mov".into(),
            given: 3,
            span: Span::new(1, 1),
        };
        assert!(format!("{}", three).ends_with("3 operands"));
    }

    #[test]
    fn span_accessor() {
        let err = AsmError::AmbiguousSize {
            msg: "can't determine operand size".into(),
            span: Span::new(7, 3),
        };
        assert_eq!(err.span(), Some(Span::new(7, 3)));
        assert_eq!(AsmError::RelaxationLimit { max: 4 }.span(), None);
    }

    #[test]
    fn multiple_joins_lines() {
        let err = AsmError::Multiple {
            errors: vec![
                AsmError::Lexical {
                    msg: "unbalanced parenthesis".into(),
                    span: Span::new(1, 5),
                },
                AsmError::UnknownMnemonic {
                    mnemonic: "frob".into(),
                    span: Span::new(2, 1),
                },
            ],
        };
        let s = format!("{}", err);
        assert_eq!(s.lines().count(), 2);
        assert!(s.contains("frob"));
    }
}
