//! Line splitting for AT&T source text.
//!
//! A source line becomes zero or more [`Statement`]s: labels, prefix
//! mnemonics, the instruction mnemonic, and the raw operand strings. The
//! operands are only split and cleaned up here; classifying them is the
//! operand parser's job.

#[allow(unused_imports)]
use alloc::format;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{AsmError, Span};
use crate::expr::is_symbol_start;
use crate::insn::{ADDR_PREFIX, DATA_PREFIX, LOCK_PREFIX, REPE_PREFIX, REPNE_PREFIX};
use crate::insn::segment_prefix;
use crate::register::{SEG_CS, SEG_DS, SEG_ES, SEG_FS, SEG_GS, SEG_SS};

const COMMENT_CHAR: char = '#';
const STATEMENT_SEPARATOR: char = ';';

/// A prefix written as its own mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    /// `lock`
    Lock,
    /// `rep`, `repe`, `repz`
    Rep,
    /// `repne`, `repnz`
    Repne,
    /// `data16`
    Data16,
    /// `addr16`
    Addr16,
    /// `cs`, `ds`, `es`, `fs`, `gs`, `ss`: segment register number.
    Segment(u8),
}

impl Prefix {
    /// Recognise a (case-folded) prefix mnemonic.
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Some(match name {
            "lock" => Prefix::Lock,
            "rep" | "repe" | "repz" => Prefix::Rep,
            "repne" | "repnz" => Prefix::Repne,
            "data16" => Prefix::Data16,
            "addr16" => Prefix::Addr16,
            "es" => Prefix::Segment(SEG_ES),
            "cs" => Prefix::Segment(SEG_CS),
            "ss" => Prefix::Segment(SEG_SS),
            "ds" => Prefix::Segment(SEG_DS),
            "fs" => Prefix::Segment(SEG_FS),
            "gs" => Prefix::Segment(SEG_GS),
            _ => return None,
        })
    }

    /// The prefix byte.
    pub fn byte(self) -> u8 {
        match self {
            Prefix::Lock => LOCK_PREFIX,
            Prefix::Rep => REPE_PREFIX,
            Prefix::Repne => REPNE_PREFIX,
            Prefix::Data16 => DATA_PREFIX,
            Prefix::Addr16 => ADDR_PREFIX,
            Prefix::Segment(num) => segment_prefix(num),
        }
    }
}

/// One statement of a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement<'src> {
    /// Labels defined before the instruction.
    pub labels: Vec<(&'src str, Span)>,
    /// Prefix mnemonics, in source order.
    pub prefixes: Vec<Prefix>,
    /// Case-folded mnemonic. `None` for a statement of labels and/or
    /// prefixes only.
    pub mnemonic: Option<String>,
    /// Operand strings with whitespace removed.
    pub operands: Vec<String>,
    /// Position of the mnemonic (or of the statement when there is none).
    pub span: Span,
    /// The statement text after its labels, trimmed.
    pub text: &'src str,
}

/// Text before the comment character, ignoring one inside a character
/// literal.
fn strip_comment(line: &str) -> &str {
    let mut chars = line.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => {
                chars.next();
            }
            COMMENT_CHAR => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split on `;`, returning each piece with its byte offset in the line.
fn split_statements(line: &str) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => {
                chars.next();
            }
            STATEMENT_SEPARATOR => {
                pieces.push((start, &line[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push((start, &line[start..]));
    pieces
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

/// Split one source line into statements.
///
/// `line_no` is 1-based. A lexical error rejects the whole line.
pub fn split_line(line: &str, line_no: u32) -> Result<Vec<Statement<'_>>, AsmError> {
    let code = strip_comment(line);
    let mut statements = Vec::new();
    for (offset, piece) in split_statements(code) {
        if let Some(stmt) = parse_statement(piece, offset, line_no)? {
            statements.push(stmt);
        }
    }
    Ok(statements)
}

fn parse_statement(piece: &str, offset: usize, line_no: u32) -> Result<Option<Statement<'_>>, AsmError> {
    let span_at = |pos: usize| Span::new(line_no, (offset + pos + 1) as u32);

    let lead = piece.len() - piece.trim_start().len();
    let text = piece.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let mut stmt = Statement {
        labels: Vec::new(),
        prefixes: Vec::new(),
        mnemonic: None,
        operands: Vec::new(),
        span: span_at(lead),
        text,
    };

    // labels
    let mut pos = lead;
    loop {
        let rest = &piece[pos..];
        let name_len = rest
            .char_indices()
            .find(|&(i, c)| if i == 0 { !is_symbol_start(c) } else { !is_label_char(c) })
            .map_or(rest.len(), |(i, _)| i);
        if name_len == 0 || !rest[name_len..].starts_with(':') {
            break;
        }
        stmt.labels.push((&rest[..name_len], span_at(pos)));
        pos += name_len + 1;
        pos += piece[pos..].len() - piece[pos..].trim_start().len();
    }

    stmt.text = piece[pos..].trim_end();

    // prefixes, then the mnemonic
    loop {
        let rest = &piece[pos..];
        if rest.trim().is_empty() {
            return Ok(Some(stmt));
        }
        let word_len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..word_len];
        if let Some(bad) = word.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(AsmError::Lexical {
                msg: format!("invalid character '{}' in mnemonic", bad),
                span: span_at(pos),
            });
        }
        let folded = word.to_ascii_lowercase();
        let after = word_len + (rest[word_len..].len() - rest[word_len..].trim_start().len());
        match Prefix::from_mnemonic(&folded) {
            Some(prefix) => {
                stmt.prefixes.push(prefix);
                pos += after;
            }
            None => {
                stmt.span = span_at(pos);
                stmt.mnemonic = Some(folded);
                pos += after;
                break;
            }
        }
    }

    stmt.operands = split_operands(&piece[pos..], span_at(pos))?;
    Ok(Some(stmt))
}

/// Split the operand field on commas outside parentheses and drop
/// whitespace.
fn split_operands(field: &str, span: Span) -> Result<Vec<String>, AsmError> {
    let unbalanced = || AsmError::Lexical {
        msg: String::from("unbalanced parenthesis"),
        span,
    };
    if field.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut operands = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or_else(unbalanced)?,
            ',' if depth == 0 => {
                operands.push(core::mem::take(&mut current));
                continue;
            }
            '\'' => {
                current.push(c);
                if let Some(lit) = chars.next() {
                    current.push(lit);
                }
                continue;
            }
            c if c.is_whitespace() => continue,
            _ => {}
        }
        current.push(c);
    }
    if depth != 0 {
        return Err(unbalanced());
    }
    operands.push(current);
    Ok(operands)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(line: &str) -> Statement<'_> {
        let mut stmts = split_line(line, 1).unwrap();
        assert_eq!(stmts.len(), 1, "{:?}", stmts);
        stmts.remove(0)
    }

    #[test]
    fn empty_and_comment_lines() {
        assert!(split_line("", 1).unwrap().is_empty());
        assert!(split_line("   ", 1).unwrap().is_empty());
        assert!(split_line("# just a comment", 1).unwrap().is_empty());
    }

    #[test]
    fn simple_instruction() {
        let s = one("  movl $0x10, %eax  # load");
        assert_eq!(s.mnemonic.as_deref(), Some("movl"));
        assert_eq!(s.operands, vec!["$0x10", "%eax"]);
        assert_eq!(s.span, Span::new(1, 3));
        assert_eq!(s.text, "movl $0x10, %eax");
    }

    #[test]
    fn mnemonic_is_case_folded() {
        assert_eq!(one("MOVL %EAX,%EBX").mnemonic.as_deref(), Some("movl"));
    }

    #[test]
    fn commas_inside_parens_do_not_split() {
        let s = one("movl %eax, 4 ( %ebx , %ecx , 2 )");
        assert_eq!(s.operands, vec!["%eax", "4(%ebx,%ecx,2)"]);
    }

    #[test]
    fn labels() {
        let s = one("start: loop1: nop");
        let names: Vec<&str> = s.labels.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["start", "loop1"]);
        assert_eq!(s.labels[1].1, Span::new(1, 8));
        assert_eq!(s.mnemonic.as_deref(), Some("nop"));
        assert_eq!(s.text, "nop");
        let s = one(".L2:");
        assert_eq!(s.labels[0].0, ".L2");
        assert!(s.mnemonic.is_none());
    }

    #[test]
    fn segment_override_is_not_a_label() {
        let s = one("movl %es:(%edi), %eax");
        assert!(s.labels.is_empty());
        assert_eq!(s.operands[0], "%es:(%edi)");
    }

    #[test]
    fn prefixes() {
        let s = one("rep movsb");
        assert_eq!(s.prefixes, vec![Prefix::Rep]);
        assert_eq!(s.mnemonic.as_deref(), Some("movsb"));
        let s = one("lock");
        assert_eq!(s.prefixes, vec![Prefix::Lock]);
        assert!(s.mnemonic.is_none());
        assert_eq!(Prefix::from_mnemonic("gs").map(Prefix::byte), Some(0x65));
        assert_eq!(Prefix::Repne.byte(), 0xf2);
    }

    #[test]
    fn statements_split_on_semicolon() {
        let stmts = split_line("pushl %ebp; movl %esp,%ebp", 4).unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1].mnemonic.as_deref(), Some("movl"));
        assert_eq!(stmts[1].span, Span::new(4, 13));
    }

    #[test]
    fn char_literal_is_not_a_comment() {
        let s = one("movb $'#, %al");
        assert_eq!(s.operands, vec!["$'#", "%al"]);
    }

    #[test]
    fn unbalanced_parens() {
        assert!(matches!(
            split_line("movl (%eax, %ebx", 1),
            Err(AsmError::Lexical { .. })
        ));
        assert!(matches!(
            split_line("movl %eax), %ebx", 1),
            Err(AsmError::Lexical { .. })
        ));
    }

    #[test]
    fn bad_mnemonic_character() {
        let err = split_line("mo@v %eax,%ebx", 2).unwrap_err();
        assert_eq!(err.span(), Some(Span::new(2, 1)));
    }

    #[test]
    fn empty_operand_is_kept() {
        let s = one("movl %eax,,%ebx");
        assert_eq!(s.operands, vec!["%eax", "", "%ebx"]);
    }
}
