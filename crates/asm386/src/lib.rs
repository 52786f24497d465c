//! # asm386: i386 AT&T instruction encoder
//!
//! `asm386` turns AT&T-syntax i386 assembly into machine code the way a
//! two-pass assembler's per-instruction back end does: operands are
//! classified into capability flags, matched against a static template
//! table, and encoded into prefixes, opcode, ModRM/SIB, displacement and
//! immediate bytes. `jmp`/`jcc` to a label are sized by a relaxation pass
//! that only ever grows a branch from its 2-byte to its 5/6-byte form.
//!
//! ## Quick Start
//!
//! ```rust
//! use asm386::assemble;
//!
//! let code = assemble("movl $0x10, %eax").unwrap();
//! assert_eq!(code, vec![0xb8, 0x10, 0x00, 0x00, 0x00]);
//! ```
//!
//! ## Features
//!
//! - **Table driven**: one template per legal encoding; the first template
//!   whose operand classes fit wins, with a second, reversed attempt for
//!   direction-bit templates.
//! - **Relocations**: anything not resolved in the unit comes back as an
//!   ELF i386 relocation record.
//! - **`no_std` + `alloc`**: the `std` feature only adds `std::error::Error`.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]
// ── Pedantic lint policy ─────────────────────────────────────────────────
// An encoder narrows and sign-converts integers constantly (i64 → u8 fields,
// u8 register numbers → u32 opcodes) and writes opcodes as dense hex.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap,
    clippy::unreadable_literal,
    clippy::match_same_arms,
    clippy::redundant_closure_for_method_calls,
    clippy::bool_to_int_with_if,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::needless_raw_string_hashes,
    clippy::semicolon_if_nothing_returned,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args,
    clippy::doc_markdown,
    clippy::similar_names,
    clippy::fn_params_excessive_bools,
    clippy::too_many_lines,
    clippy::single_match_else,
    clippy::manual_let_else,
    clippy::unnecessary_wraps,
    clippy::unused_self,
    clippy::map_unwrap_or,
    clippy::many_single_char_names,
    clippy::redundant_else,
    clippy::return_self_not_must_use,
    clippy::missing_errors_doc,
    clippy::needless_continue
)]

extern crate alloc;

/// Public assembler API: builder pattern, one-shot assembly, and `AssemblyResult`.
pub mod assembler;
/// Instruction encoder: prefixes, opcode, ModRM/SIB, displacement, immediates.
pub mod encoder;
/// Error types and source-span diagnostics.
pub mod error;
/// Operand expression evaluation and symbol classification.
pub mod expr;
/// Operand capability flags.
pub mod flags;
/// The in-progress instruction between matching and encoding.
pub mod insn;
/// Line splitting: labels, prefixes, mnemonic and operand strings.
pub mod lexer;
/// Fragment-based linker: label resolution, branch relaxation, patching.
pub mod linker;
/// Template selection and operand-size resolution.
pub mod matcher;
/// AT&T operand parser.
pub mod operand;
/// The i386 register table.
pub mod register;
/// Relaxation states of `jmp`/`jcc`.
pub mod relax;
/// The instruction template table.
pub mod template;

// Re-exports
pub use assembler::{Assembler, AssemblyResult, ResourceLimits};
pub use encoder::{encode_instruction, EncodedInstr, RelaxRequest, RelocKind, Relocation};
pub use error::{AsmError, Span};
pub use expr::{NoSymbols, SymbolLookup, Value};
pub use flags::OperandFlags;
pub use linker::{FragmentId, Linker, ObjectWriter, SectionWriter};
pub use register::Register;
pub use template::{Modifiers, Suffix, Template};

use alloc::vec::Vec;

/// Assemble a string of AT&T assembly into machine code bytes.
///
/// Newlines or semicolons separate statements; labels end with a colon.
/// Fields that refer to symbols outside the source are left zero; use
/// [`Assembler`] to get their relocations.
///
/// # Errors
///
/// Returns [`AsmError`] for any line that fails to assemble.
///
/// # Examples
///
/// ```rust
/// use asm386::assemble;
///
/// let code = assemble("top: decl %ecx\njnz top").unwrap();
/// assert_eq!(code, vec![0x49, 0x75, 0xfd]);
/// ```
pub fn assemble(source: &str) -> Result<Vec<u8>, AsmError> {
    assemble_at(source, 0)
}

/// Assemble with an explicit base address.
///
/// # Errors
///
/// Returns [`AsmError`] on assembly failure (see [`assemble`] for details).
///
/// # Examples
///
/// ```rust
/// use asm386::assemble_at;
///
/// let code = assemble_at("here: movl $here, %eax", 0x1000).unwrap();
/// assert_eq!(code, vec![0xb8, 0x00, 0x10, 0x00, 0x00]);
/// ```
pub fn assemble_at(source: &str, base_addr: u64) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new();
    asm.base_address(base_addr);
    asm.emit(source)?;
    let result = asm.finish()?;
    Ok(result.into_bytes())
}
