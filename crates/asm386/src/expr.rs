//! Minimal expression evaluation for immediates and displacements.
//!
//! Only the forms an instruction operand needs are accepted: a number, a
//! character literal, a symbol, or a symbol plus or minus a number. The
//! classification of symbols is delegated to a [`SymbolLookup`].

use alloc::rc::Rc;

/// Result of evaluating an operand expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A resolved constant.
    Absolute(i64),
    /// A symbol in a known section, plus a constant.
    Relative {
        /// Section the symbol lives in.
        section: Rc<str>,
        /// The symbol.
        symbol: Rc<str>,
        /// Constant added to the symbol's address.
        addend: i64,
    },
    /// A symbol not (yet) defined in this unit, plus a constant.
    External {
        /// The symbol.
        symbol: Rc<str>,
        /// Constant added to the symbol's address.
        addend: i64,
    },
    /// Text that is not an expression.
    Unparseable,
}

impl Value {
    /// The constant, if the value is resolved.
    #[inline]
    pub fn as_constant(&self) -> Option<i64> {
        match self {
            Value::Absolute(n) => Some(*n),
            _ => None,
        }
    }

    /// The referenced symbol and addend, if any.
    pub fn symbol(&self) -> Option<(&Rc<str>, i64)> {
        match self {
            Value::Relative { symbol, addend, .. } | Value::External { symbol, addend } => {
                Some((symbol, *addend))
            }
            _ => None,
        }
    }

    fn offset_by(self, delta: i64) -> Value {
        match self {
            Value::Absolute(n) => Value::Absolute(n.wrapping_add(delta)),
            Value::Relative {
                section,
                symbol,
                addend,
            } => Value::Relative {
                section,
                symbol,
                addend: addend.wrapping_add(delta),
            },
            Value::External { symbol, addend } => Value::External {
                symbol,
                addend: addend.wrapping_add(delta),
            },
            Value::Unparseable => Value::Unparseable,
        }
    }
}

/// Symbol classification supplied by the driver.
pub trait SymbolLookup {
    /// Classify `name`. Unknown names should come back as
    /// [`Value::External`].
    fn lookup(&self, name: &str) -> Value;
}

/// A lookup that knows no symbols: every name is external.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolLookup for NoSymbols {
    fn lookup(&self, name: &str) -> Value {
        Value::External {
            symbol: Rc::from(name),
            addend: 0,
        }
    }
}

/// Whether `c` may start a symbol name.
#[inline]
pub(crate) fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.' || c == '$'
}

#[inline]
fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

/// Evaluate operand expression text.
pub fn evaluate(text: &str, symbols: &dyn SymbolLookup) -> Value {
    let text = text.trim();
    if text.is_empty() {
        return Value::Unparseable;
    }

    if let Some(rest) = text.strip_prefix('-') {
        return match parse_number(rest) {
            Some(n) => Value::Absolute(n.wrapping_neg()),
            None => Value::Unparseable,
        };
    }
    if let Some(n) = parse_number(text) {
        return Value::Absolute(n);
    }

    let name_len = text
        .char_indices()
        .find(|&(i, c)| if i == 0 { !is_symbol_start(c) } else { !is_symbol_char(c) })
        .map_or(text.len(), |(i, _)| i);
    if name_len == 0 {
        return Value::Unparseable;
    }
    let (name, rest) = text.split_at(name_len);
    let base = symbols.lookup(name);

    let rest = rest.trim_start();
    if rest.is_empty() {
        return base;
    }
    let (negate, tail) = match rest.as_bytes()[0] {
        b'+' => (false, &rest[1..]),
        b'-' => (true, &rest[1..]),
        _ => return Value::Unparseable,
    };
    match parse_number(tail.trim()) {
        Some(n) if negate => base.offset_by(n.wrapping_neg()),
        Some(n) => base.offset_by(n),
        None => Value::Unparseable,
    }
}

/// Parse an unsigned number: decimal, `0x` hex, `0b` binary, leading-zero
/// octal, or a `'c` character constant.
///
/// Literals above `i64::MAX` are rejected rather than wrapped.
fn parse_number(text: &str) -> Option<i64> {
    let bytes = text.as_bytes();
    let (digits, radix) = match bytes {
        [] => return None,
        [b'\'', c] | [b'\'', c, b'\''] => return Some(i64::from(*c)),
        [b'0', b'x' | b'X', rest @ ..] if !rest.is_empty() => (&text[2..], 16),
        [b'0', b'b' | b'B', rest @ ..] if !rest.is_empty() => (&text[2..], 2),
        [b'0', rest @ ..] if !rest.is_empty() => (&text[1..], 8),
        [b'0'..=b'9', ..] => (text, 10),
        _ => return None,
    };
    let n = u64::from_str_radix(digits, radix).ok()?;
    i64::try_from(n).ok()
}
