//! Relaxation states of `jmp` and `jcc`.
//!
//! A branch to a symbol starts in its byte state (opcode + rel8). When a
//! layout pass finds the target out of reach the branch is promoted to its
//! dword state (`e9 rel32` or `0f 8x rel32`). Promotion only ever goes
//! byte → dword, so the linker's fixed-point loop converges after at most
//! one promotion per branch.
//!
//! Word states exist in the table for completeness. 16-bit jumps are never
//! generated, so they have no reach and no growth and nothing selects them.

use crate::encoder::InstrBytes;
use crate::flags::{fits_in_32_bits, fits_in_signed_byte};

const JMP_SHORT: u8 = 0xeb;
const JMP_NEAR: u8 = 0xe9;
const TWO_BYTE_ESCAPE: u8 = 0x0f;
/// Added to a `jcc` rel8 opcode to get its rel32 second byte.
const JCC_NEAR_DELTA: u8 = 0x10;

/// Whether a branch has a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpKind {
    /// `jcc`.
    Conditional,
    /// `jmp`.
    Unconditional,
}

impl JumpKind {
    /// Kind of a one-byte short-form opcode.
    #[inline]
    pub fn of_opcode(opcode: u8) -> Self {
        if opcode == JMP_SHORT {
            JumpKind::Unconditional
        } else {
            JumpKind::Conditional
        }
    }
}

/// Width of the displacement field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JumpSize {
    /// rel8.
    Byte,
    /// rel16 (declared, never selected).
    Word,
    /// rel32.
    Dword,
}

struct Entry {
    /// Largest forward displacement the state can encode.
    forward: i64,
    /// Largest backward displacement (negative).
    backward: i64,
    /// Bytes beyond the one-byte opcode.
    growth: u8,
    /// State to move to when the target is out of reach.
    next: Option<JumpSize>,
}

const fn entry(forward: i64, backward: i64, growth: u8, next: Option<JumpSize>) -> Entry {
    Entry {
        forward,
        backward,
        growth,
        next,
    }
}

// indexed by [kind][size]
static TABLE: [[Entry; 3]; 2] = [
    // conditional
    [
        entry(127, -128, 1, Some(JumpSize::Dword)),
        entry(0, 0, 0, Some(JumpSize::Dword)),
        entry(i32::MAX as i64, i32::MIN as i64, 5, None),
    ],
    // unconditional
    [
        entry(127, -128, 1, Some(JumpSize::Dword)),
        entry(0, 0, 0, Some(JumpSize::Dword)),
        entry(i32::MAX as i64, i32::MIN as i64, 4, None),
    ],
];

/// State of one relaxable branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelaxState {
    /// Conditional or not.
    pub kind: JumpKind,
    /// Current displacement width.
    pub size: JumpSize,
}

impl RelaxState {
    /// The state every branch to a symbol starts in.
    #[inline]
    pub fn initial(kind: JumpKind) -> Self {
        Self {
            kind,
            size: JumpSize::Byte,
        }
    }

    /// The widest state, reachable from anywhere.
    #[inline]
    pub fn terminal(kind: JumpKind) -> Self {
        Self {
            kind,
            size: JumpSize::Dword,
        }
    }

    fn entry(self) -> &'static Entry {
        let k = match self.kind {
            JumpKind::Conditional => 0,
            JumpKind::Unconditional => 1,
        };
        let s = match self.size {
            JumpSize::Byte => 0,
            JumpSize::Word => 1,
            JumpSize::Dword => 2,
        };
        &TABLE[k][s]
    }

    /// Bytes this state adds over a bare one-byte opcode.
    #[inline]
    pub fn growth(self) -> usize {
        usize::from(self.entry().growth)
    }

    /// Encoded length of the branch in this state.
    ///
    /// The word states emit the dword form.
    #[inline]
    pub fn size(self) -> usize {
        match self.size {
            JumpSize::Word => Self::terminal(self.kind).size(),
            _ => 1 + self.growth(),
        }
    }

    /// Whether this state has no successor.
    #[inline]
    pub fn is_terminal(self) -> bool {
        self.entry().next.is_none()
    }

    /// Whether `disp` (measured from the end of the branch) is encodable.
    #[inline]
    pub fn reaches(self, disp: i64) -> bool {
        let e = self.entry();
        (e.backward..=e.forward).contains(&disp)
    }

    /// The next state, or `self` when terminal.
    #[inline]
    pub fn promote(self) -> Self {
        match self.entry().next {
            Some(size) => Self {
                kind: self.kind,
                size,
            },
            None => self,
        }
    }

    /// One relaxation step for a branch starting at `start` aimed at
    /// `target`: stay if the target is in reach, otherwise promote.
    pub fn relax(self, start: i64, target: i64) -> Self {
        let disp = target - (start + self.size() as i64);
        if self.reaches(disp) {
            self
        } else {
            self.promote()
        }
    }

    /// Offset of the displacement field within the emitted bytes.
    #[inline]
    pub fn patch_offset(self) -> usize {
        match (self.size, self.kind) {
            (JumpSize::Byte, _) => 1,
            (_, JumpKind::Conditional) => 2,
            (_, JumpKind::Unconditional) => 1,
        }
    }

    /// Emit the branch for the short-form `opcode` with displacement `disp`.
    pub fn emit(self, opcode: u8, disp: i64) -> InstrBytes {
        let mut buf = InstrBytes::new();
        if self.size == JumpSize::Byte {
            debug_assert!(fits_in_signed_byte(disp));
            buf.push(opcode);
            buf.push(disp as u8);
            return buf;
        }
        match self.kind {
            JumpKind::Conditional => {
                buf.push(TWO_BYTE_ESCAPE);
                buf.push(opcode.wrapping_add(JCC_NEAR_DELTA));
            }
            JumpKind::Unconditional => buf.push(JMP_NEAR),
        }
        debug_assert!(fits_in_32_bits(disp));
        buf.extend_from_slice(&(disp as i32).to_le_bytes());
        buf
    }
}
