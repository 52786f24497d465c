//! Public assembler API: builder pattern and one-shot assembly.
//!
//! This module ties together the line splitter, the per-instruction
//! encoder, and the linker. Each source line is encoded on its own; a line
//! that fails is recorded and skipped, and assembly carries on with the
//! next one.

use alloc::collections::{BTreeMap, BTreeSet};
#[allow(unused_imports)]
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::string::ToString;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::encoder::{self, EncodedInstr, InstrBytes, Relocation};
use crate::error::{AsmError, Span};
use crate::expr::{SymbolLookup, Value};
use crate::insn::MAX_PREFIXES;
use crate::lexer::{self, Statement};
use crate::linker::{Linker, SectionWriter, DEFAULT_MAX_RELAX_PASSES};
use crate::relax::RelaxState;

/// Name of the section this assembler emits into.
pub const TEXT_SECTION: &str = ".text";

/// Bytes shown per listing row.
const LISTING_ROW_BYTES: usize = 8;

/// The result of a successful assembly.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[must_use]
pub struct AssemblyResult {
    bytes: Vec<u8>,
    /// Label addresses, sorted by name.
    labels: Vec<(String, u64)>,
    /// Relocations against symbols outside this unit, offsets relative to
    /// the first byte.
    relocations: Vec<Relocation>,
    base_address: u64,
    /// `(address, statement text)` for the listing.
    source_annotations: Vec<(u64, String)>,
}

impl AssemblyResult {
    /// The assembled machine code.
    ///
    /// # Examples
    ///
    /// ```
    /// use asm386::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.emit("nop")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.bytes(), &[0x90]);
    /// # Ok::<(), asm386::AsmError>(())
    /// ```
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the result and return the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Label addresses (name, absolute address), sorted by name.
    #[must_use]
    pub fn labels(&self) -> &[(String, u64)] {
        &self.labels
    }

    /// Address of a label.
    ///
    /// # Examples
    ///
    /// ```
    /// use asm386::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.base_address(0x8048000);
    /// asm.emit("start: nop\nnop\nend: ret")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.label_address("start"), Some(0x8048000));
    /// assert_eq!(result.label_address("end"), Some(0x8048002));
    /// assert_eq!(result.label_address("missing"), None);
    /// # Ok::<(), asm386::AsmError>(())
    /// ```
    #[must_use]
    pub fn label_address(&self, name: &str) -> Option<u64> {
        self.labels
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.labels[i].1)
    }

    /// Relocations left for a later link step: references to external
    /// symbols and to symbols of other sections.
    ///
    /// # Examples
    ///
    /// ```
    /// use asm386::{Assembler, RelocKind};
    ///
    /// let mut asm = Assembler::new();
    /// asm.emit("call printf")?;
    /// let result = asm.finish()?;
    /// assert_eq!(result.bytes(), &[0xe8, 0, 0, 0, 0]);
    /// let r = &result.relocations()[0];
    /// assert_eq!((r.offset, r.kind, r.addend), (1, RelocKind::Pc32, 0));
    /// assert_eq!(&*r.symbol, "printf");
    /// # Ok::<(), asm386::AsmError>(())
    /// ```
    #[must_use]
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    /// Address of the first byte.
    #[must_use]
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// A gas-style listing: address, hex bytes and statement text.
    ///
    /// Statement text is only recorded when the assembler had
    /// [`Assembler::enable_listing`] set; otherwise the rows carry the
    /// bytes alone. Long instructions continue on extra rows of up to 8
    /// bytes.
    ///
    /// ```text
    /// 00000000                  entry:
    /// 00000000  55                pushl %ebp
    /// 00000001  89E5              movl %esp,%ebp
    /// ```
    #[must_use]
    pub fn listing(&self) -> String {
        use core::fmt::Write;

        let base = self.base_address;
        let end = base + self.bytes.len() as u64;

        let mut labels_at: BTreeMap<u64, Vec<&str>> = BTreeMap::new();
        for (name, addr) in &self.labels {
            labels_at.entry(*addr).or_default().push(name);
        }
        let text_at: BTreeMap<u64, &str> = self
            .source_annotations
            .iter()
            .map(|(addr, text)| (*addr, text.as_str()))
            .collect();
        // rows never straddle a label or the start of a statement
        let breaks: BTreeSet<u64> = labels_at.keys().chain(text_at.keys()).copied().collect();

        let mut out = String::new();
        let print_labels = |out: &mut String, addr: u64| {
            for name in labels_at.get(&addr).into_iter().flatten() {
                let _ = writeln!(out, "{:08X}                  {}:", addr, name);
            }
        };

        let mut addr = base;
        while addr < end {
            print_labels(&mut out, addr);
            let next_break = breaks.range(addr + 1..).next().copied().unwrap_or(end);
            let stop = next_break.min(end).min(addr + LISTING_ROW_BYTES as u64);
            let row = &self.bytes[(addr - base) as usize..(stop - base) as usize];
            let hex = row.iter().fold(String::new(), |mut acc, b| {
                let _ = write!(acc, "{:02X}", b);
                acc
            });
            match text_at.get(&addr) {
                Some(text) => {
                    let _ = writeln!(out, "{:08X}  {:<16}  {}", addr, hex, text);
                }
                None => {
                    let _ = writeln!(out, "{:08X}  {}", addr, hex);
                }
            }
            addr = stop;
        }
        print_labels(&mut out, end);
        out
    }
}

/// Limits that keep pathological input from consuming unbounded memory
/// or time. The defaults are far beyond any hand-written program.
///
/// # Examples
///
/// ```rust
/// use asm386::{Assembler, ResourceLimits};
///
/// let mut asm = Assembler::new();
/// asm.limits(ResourceLimits {
///     max_lines: 10_000,
///     max_errors: 8,
///     max_output_bytes: 4096,
///     ..ResourceLimits::default()
/// });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceLimits {
    /// Source lines accepted over all `emit()` calls. Default: 1,000,000.
    pub max_lines: usize,
    /// Per-line errors collected before giving up. Default: 64.
    pub max_errors: usize,
    /// Output size in bytes. Default: 16 MiB.
    pub max_output_bytes: usize,
    /// Branch relaxation passes. Default: 100.
    pub max_relax_passes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_lines: 1_000_000,
            max_errors: 64,
            max_output_bytes: 16 * 1024 * 1024,
            max_relax_passes: DEFAULT_MAX_RELAX_PASSES,
        }
    }
}

/// Symbols the driver knows about besides labels.
#[derive(Debug, Default)]
struct SymbolTable {
    constants: BTreeMap<String, i64>,
    /// name → (section, offset in section)
    foreign: BTreeMap<String, (Rc<str>, i64)>,
}

/// What operand expressions see while a line is encoded.
struct Scope<'a> {
    table: &'a SymbolTable,
    linker: &'a Linker,
    text: &'a Rc<str>,
}

impl SymbolLookup for Scope<'_> {
    fn lookup(&self, name: &str) -> Value {
        if let Some(&n) = self.table.constants.get(name) {
            return Value::Absolute(n);
        }
        if self.linker.has_label(name) {
            return Value::Relative {
                section: self.text.clone(),
                symbol: Rc::from(name),
                addend: 0,
            };
        }
        if let Some((section, offset)) = self.table.foreign.get(name) {
            // referenced through the section symbol, as gas does for
            // symbols it can resolve to a section
            return Value::Relative {
                section: section.clone(),
                symbol: section.clone(),
                addend: *offset,
            };
        }
        Value::External {
            symbol: Rc::from(name),
            addend: 0,
        }
    }
}

/// Builder-pattern assembler for one `.text` section.
///
/// # Examples
///
/// ```rust
/// use asm386::Assembler;
///
/// let mut asm = Assembler::new();
/// asm.emit("pushl %ebp\nmovl %esp,%ebp")?;
/// asm.emit("popl %ebp; ret")?;
/// let result = asm.finish()?;
/// assert_eq!(result.bytes(), &[0x55, 0x89, 0xe5, 0x5d, 0xc3]);
/// # Ok::<(), asm386::AsmError>(())
/// ```
#[derive(Debug)]
pub struct Assembler {
    linker: Linker,
    symbols: SymbolTable,
    text_section: Rc<str>,
    /// Per-line errors collected so far.
    errors: Vec<AsmError>,
    /// Linker fragment index → statement text, for the listing.
    fragment_annotations: Vec<(usize, String)>,
    listing_enabled: bool,
    resource_limits: ResourceLimits,
    /// Lines seen over all `emit()` calls; also the line number of the
    /// last one.
    line_count: usize,
    /// Upper bound of the output size, branches counted at full length.
    estimated_output_bytes: usize,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    /// Create an assembler with base address 0 and default limits.
    pub fn new() -> Self {
        Self {
            linker: Linker::new(),
            symbols: SymbolTable::default(),
            text_section: Rc::from(TEXT_SECTION),
            errors: Vec::new(),
            fragment_annotations: Vec::new(),
            listing_enabled: false,
            resource_limits: ResourceLimits::default(),
            line_count: 0,
            estimated_output_bytes: 0,
        }
    }

    /// Set resource limits. See [`ResourceLimits`].
    pub fn limits(&mut self, limits: ResourceLimits) -> &mut Self {
        self.resource_limits = limits;
        self.linker.set_max_passes(limits.max_relax_passes);
        self
    }

    /// Record statement text for [`AssemblyResult::listing`].
    ///
    /// # Examples
    ///
    /// ```
    /// use asm386::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.enable_listing();
    /// asm.emit("int $0x80")?;
    /// let listing = asm.finish()?.listing();
    /// assert!(listing.contains("CD80"));
    /// assert!(listing.contains("int $0x80"));
    /// # Ok::<(), asm386::AsmError>(())
    /// ```
    pub fn enable_listing(&mut self) -> &mut Self {
        self.listing_enabled = true;
        self
    }

    /// Set the address of the first byte.
    pub fn base_address(&mut self, addr: u64) -> &mut Self {
        self.linker.set_base_address(addr);
        self
    }

    /// Define a named constant. Operands that use it see an absolute value.
    ///
    /// # Examples
    ///
    /// ```
    /// use asm386::Assembler;
    ///
    /// let mut asm = Assembler::new();
    /// asm.define_constant("SYS_EXIT", 1);
    /// asm.emit("movl $SYS_EXIT, %eax")?;
    /// assert_eq!(asm.finish()?.bytes(), &[0xb8, 1, 0, 0, 0]);
    /// # Ok::<(), asm386::AsmError>(())
    /// ```
    pub fn define_constant(&mut self, name: &str, value: i64) -> &mut Self {
        self.symbols.constants.insert(String::from(name), value);
        self
    }

    /// Declare a symbol that lives at `offset` in another section.
    ///
    /// References to it are left as relocations against `section`, with
    /// `offset` folded into the addend.
    pub fn define_symbol(&mut self, name: &str, section: &str, offset: i64) -> &mut Self {
        self.symbols
            .foreign
            .insert(String::from(name), (Rc::from(section), offset));
        self
    }

    /// Add a label at the current position.
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::DuplicateLabel`] if the label already exists.
    pub fn label(&mut self, name: &str) -> Result<&mut Self, AsmError> {
        self.linker.add_label(name, Span::dummy())?;
        Ok(self)
    }

    /// Assemble source text. Can be called multiple times; line numbers
    /// continue across calls.
    ///
    /// A line that fails to assemble is recorded and contributes no bytes;
    /// the recorded errors are returned by [`finish`](Self::finish).
    ///
    /// # Errors
    ///
    /// Returns [`AsmError::ResourceLimitExceeded`] when a limit is hit.
    pub fn emit(&mut self, source: &str) -> Result<&mut Self, AsmError> {
        for line in source.lines() {
            self.line_count += 1;
            if self.line_count > self.resource_limits.max_lines {
                return Err(AsmError::ResourceLimitExceeded {
                    resource: String::from("lines"),
                    limit: self.resource_limits.max_lines,
                });
            }
            let line_no = u32::try_from(self.line_count).unwrap_or(u32::MAX);

            let statements = match lexer::split_line(line, line_no) {
                Ok(statements) => statements,
                Err(e) => {
                    self.record_error(e)?;
                    continue;
                }
            };
            for stmt in &statements {
                match self.encode_statement(stmt) {
                    Ok(Some(encoded)) => self.commit(encoded, stmt)?,
                    Ok(None) => {}
                    Err(e) => self.record_error(e)?,
                }
            }
        }
        Ok(self)
    }

    /// Encode a single instruction without adding it to the assembler.
    ///
    /// Constants and already defined symbols are visible. A `jmp`/`jcc`
    /// to a symbol comes back in its long form with a zero displacement.
    ///
    /// # Examples
    ///
    /// ```
    /// use asm386::Assembler;
    ///
    /// let asm = Assembler::new();
    /// assert_eq!(asm.encode_one("xorl %eax,%eax")?, [0x31, 0xc0]);
    /// assert_eq!(asm.encode_one("jne done")?, [0x0f, 0x85, 0, 0, 0, 0]);
    /// # Ok::<(), asm386::AsmError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the error of the first statement that fails.
    pub fn encode_one(&self, source: &str) -> Result<Vec<u8>, AsmError> {
        let mut out = Vec::new();
        for stmt in lexer::split_line(source, 1)? {
            let Some(encoded) = self.encode_statement_bytes(&stmt)? else {
                continue;
            };
            match encoded.relax {
                Some(request) => {
                    out.extend_from_slice(&encoded.bytes);
                    out.extend_from_slice(&RelaxState::terminal(request.kind).emit(request.opcode, 0));
                }
                None => out.extend_from_slice(&encoded.bytes),
            }
        }
        Ok(out)
    }

    /// Lay out the section, resolve local references and return the result.
    ///
    /// # Errors
    ///
    /// Returns the recorded per-line error (or [`AsmError::Multiple`] when
    /// there are several), or a layout error from the linker.
    pub fn finish(mut self) -> Result<AssemblyResult, AsmError> {
        if !self.errors.is_empty() {
            if self.errors.len() == 1 {
                return Err(self.errors.remove(0));
            }
            return Err(AsmError::Multiple {
                errors: self.errors,
            });
        }

        let mut writer = SectionWriter::default();
        let out = self.linker.finish(&mut writer)?;
        if writer.bytes.len() > self.resource_limits.max_output_bytes {
            return Err(AsmError::ResourceLimitExceeded {
                resource: String::from("output bytes"),
                limit: self.resource_limits.max_output_bytes,
            });
        }

        let source_annotations = self
            .fragment_annotations
            .into_iter()
            .filter_map(|(idx, text)| out.offsets.get(idx).map(|&addr| (addr, text)))
            .collect();

        Ok(AssemblyResult {
            bytes: writer.bytes,
            labels: out.labels,
            relocations: writer.relocations,
            base_address: self.linker.base_address(),
            source_annotations,
        })
    }

    // ── per-statement work ─────────────────────────────────

    /// Define the statement's labels and encode what follows them.
    fn encode_statement(&mut self, stmt: &Statement<'_>) -> Result<Option<EncodedInstr>, AsmError> {
        for &(name, span) in &stmt.labels {
            self.linker.add_label(name, span)?;
        }
        self.encode_statement_bytes(stmt)
    }

    fn encode_statement_bytes(&self, stmt: &Statement<'_>) -> Result<Option<EncodedInstr>, AsmError> {
        let prefixes: Vec<u8> = stmt.prefixes.iter().map(|p| p.byte()).collect();
        let Some(mnemonic) = &stmt.mnemonic else {
            if prefixes.is_empty() {
                return Ok(None);
            }
            check_lone_prefixes(&prefixes, stmt.span)?;
            return Ok(Some(EncodedInstr {
                bytes: InstrBytes::from_slice(&prefixes),
                relocations: Vec::new(),
                relax: None,
            }));
        };

        let scope = Scope {
            table: &self.symbols,
            linker: &self.linker,
            text: &self.text_section,
        };
        encoder::encode_instruction(mnemonic, &stmt.operands, &prefixes, &scope, stmt.span).map(Some)
    }

    fn commit(&mut self, encoded: EncodedInstr, stmt: &Statement<'_>) -> Result<(), AsmError> {
        let size = match &encoded.relax {
            Some(request) => encoded.bytes.len() + RelaxState::terminal(request.kind).size(),
            None => encoded.bytes.len(),
        };
        self.check_output_limit(size)?;
        let frag_idx = self.linker.fragment_count();
        self.linker.add_encoded(encoded, stmt.span);
        if self.listing_enabled {
            self.fragment_annotations.push((frag_idx, stmt.text.to_string()));
        }
        Ok(())
    }

    fn record_error(&mut self, e: AsmError) -> Result<(), AsmError> {
        self.errors.push(e);
        if self.errors.len() >= self.resource_limits.max_errors {
            return Err(AsmError::ResourceLimitExceeded {
                resource: String::from("errors"),
                limit: self.resource_limits.max_errors,
            });
        }
        Ok(())
    }

    /// Fail as soon as the output could exceed the limit.
    fn check_output_limit(&mut self, additional: usize) -> Result<(), AsmError> {
        self.estimated_output_bytes += additional;
        if self.estimated_output_bytes > self.resource_limits.max_output_bytes {
            return Err(AsmError::ResourceLimitExceeded {
                resource: String::from("output bytes"),
                limit: self.resource_limits.max_output_bytes,
            });
        }
        Ok(())
    }
}

/// Prefixes written without an instruction obey the same rules as
/// prefixes on one.
fn check_lone_prefixes(prefixes: &[u8], span: Span) -> Result<(), AsmError> {
    for (i, p) in prefixes.iter().enumerate() {
        if prefixes[..i].contains(p) {
            return Err(AsmError::MalformedPrefix {
                msg: String::from("same prefix used twice"),
                span,
            });
        }
    }
    if prefixes.len() > MAX_PREFIXES {
        return Err(AsmError::MalformedPrefix {
            msg: String::from("too many prefixes"),
            span,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::RelocKind;

    fn asm(source: &str) -> AssemblyResult {
        let mut a = Assembler::new();
        a.emit(source).unwrap();
        a.finish().unwrap()
    }

    fn asm_err(source: &str) -> AsmError {
        let mut a = Assembler::new();
        a.emit(source).unwrap();
        a.finish().unwrap_err()
    }

    #[test]
    fn assemble_prologue_epilogue() {
        let r = asm("pushl %ebp\nmovl %esp, %ebp\nsubl $8, %esp\nleave\nret");
        assert_eq!(
            r.bytes(),
            &[0x55, 0x89, 0xe5, 0x83, 0xec, 0x08, 0xc9, 0xc3]
        );
    }

    #[test]
    fn backward_loop() {
        let r = asm("movl $10, %ecx\ntop: decl %ecx\njnz top\nret");
        assert_eq!(
            r.bytes(),
            &[0xb9, 0x0a, 0, 0, 0, 0x49, 0x75, 0xfd, 0xc3]
        );
        assert_eq!(r.label_address("top"), Some(5));
    }

    #[test]
    fn forward_reference_is_patched() {
        let r = asm("movl $msg, %eax\nmsg: nop");
        assert_eq!(r.bytes(), &[0xb8, 5, 0, 0, 0, 0x90]);
        assert!(r.relocations().is_empty());
    }

    #[test]
    fn base_address_applies_to_absolute_references() {
        let mut a = Assembler::new();
        a.base_address(0x1000);
        a.emit("here: movl $here, %eax").unwrap();
        let r = a.finish().unwrap();
        assert_eq!(r.bytes(), &[0xb8, 0x00, 0x10, 0, 0]);
        assert_eq!(r.base_address(), 0x1000);
    }

    #[test]
    fn external_call_left_as_relocation() {
        let r = asm("nop\ncall exit");
        assert_eq!(r.relocations().len(), 1);
        let reloc = &r.relocations()[0];
        assert_eq!(reloc.offset, 2);
        assert_eq!(reloc.kind, RelocKind::Pc32);
    }

    #[test]
    fn external_jump_is_long() {
        let r = asm("jmp elsewhere");
        assert_eq!(r.bytes(), &[0xe9, 0, 0, 0, 0]);
        assert_eq!(r.relocations()[0].offset, 1);
    }

    #[test]
    fn foreign_section_symbol() {
        let mut a = Assembler::new();
        a.define_symbol("counter", ".data", 0x20);
        a.emit("incl counter+4").unwrap();
        let r = a.finish().unwrap();
        assert_eq!(r.bytes(), &[0xff, 0x05, 0, 0, 0, 0]);
        let reloc = &r.relocations()[0];
        assert_eq!(&*reloc.symbol, ".data");
        assert_eq!(reloc.addend, 0x24);
        assert_eq!(reloc.kind, RelocKind::Abs32);
    }

    #[test]
    fn constants() {
        let mut a = Assembler::new();
        a.define_constant("N", -1);
        a.emit("addl $N, %eax").unwrap();
        assert_eq!(a.finish().unwrap().bytes(), &[0x83, 0xc0, 0xff]);
    }

    #[test]
    fn builder_label() {
        let mut a = Assembler::new();
        a.emit("nop").unwrap();
        a.label("after").unwrap();
        a.emit("jmp after").unwrap();
        assert!(matches!(a.label("after"), Err(AsmError::DuplicateLabel { .. })));
        let r = a.finish().unwrap();
        assert_eq!(r.bytes(), &[0x90, 0xeb, 0xfe]);
    }

    #[test]
    fn prefix_only_statement() {
        let r = asm("rep\nmovsb\nlock");
        assert_eq!(r.bytes(), &[0xf3, 0xa4, 0xf0]);
        assert!(matches!(asm_err("lock lock"), AsmError::MalformedPrefix { .. }));
    }

    #[test]
    fn prefixes_on_instruction() {
        assert_eq!(asm("rep stosl").bytes(), &[0xf3, 0xab]);
        assert_eq!(asm("lock incl (%eax)").bytes(), &[0xf0, 0xff, 0x00]);
    }

    #[test]
    fn failed_line_commits_nothing() {
        let mut a = Assembler::new();
        a.emit("nop\nmovl %eax\nret").unwrap();
        let err = a.finish().unwrap_err();
        assert!(matches!(err, AsmError::OperandCount { span, .. } if span.line == 2));
    }

    #[test]
    fn errors_are_collected() {
        let err = asm_err("bogus\nnop\nmovl %eqx, %eax\nret");
        let AsmError::Multiple { errors } = err else {
            panic!("expected several errors, got {:?}", err);
        };
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], AsmError::UnknownMnemonic { .. }));
        assert!(matches!(errors[1], AsmError::UnknownRegister { .. }));
        assert_eq!(errors[1].span().map(|s| s.line), Some(3));
    }

    #[test]
    fn lexical_error_recorded() {
        assert!(matches!(asm_err("movl (%eax, %ebx"), AsmError::Lexical { .. }));
    }

    #[test]
    fn duplicate_label_in_source() {
        assert!(matches!(
            asm_err("a: nop\na: nop"),
            AsmError::DuplicateLabel { first_span, .. } if first_span.line == 1
        ));
    }

    #[test]
    fn line_numbers_continue_across_emits() {
        let mut a = Assembler::new();
        a.emit("nop\nnop").unwrap();
        a.emit("frob").unwrap();
        let err = a.finish().unwrap_err();
        assert_eq!(err.span(), Some(Span::new(3, 1)));
    }

    #[test]
    fn max_errors_limit() {
        let mut a = Assembler::new();
        a.limits(ResourceLimits {
            max_errors: 2,
            ..ResourceLimits::default()
        });
        let err = a.emit("bad1\nbad2\nbad3").unwrap_err();
        assert!(matches!(err, AsmError::ResourceLimitExceeded { ref resource, limit: 2 } if resource == "errors"));
    }

    #[test]
    fn max_lines_limit() {
        let mut a = Assembler::new();
        a.limits(ResourceLimits {
            max_lines: 2,
            ..ResourceLimits::default()
        });
        assert!(a.emit("nop\nnop").is_ok());
        assert!(matches!(
            a.emit("nop"),
            Err(AsmError::ResourceLimitExceeded { .. })
        ));
    }

    #[test]
    fn max_output_limit_counts_long_branches() {
        let mut a = Assembler::new();
        a.limits(ResourceLimits {
            max_output_bytes: 4,
            ..ResourceLimits::default()
        });
        assert!(matches!(
            a.emit("jmp far_away"),
            Err(AsmError::ResourceLimitExceeded { .. })
        ));
    }

    #[test]
    fn relax_pass_limit_is_configurable() {
        let mut a = Assembler::new();
        a.limits(ResourceLimits {
            max_relax_passes: 1,
            ..ResourceLimits::default()
        });
        a.emit("jmp end").unwrap();
        for _ in 0..200 {
            a.emit("nop").unwrap();
        }
        a.emit("end: ret").unwrap();
        assert_eq!(a.finish().unwrap_err(), AsmError::RelaxationLimit { max: 1 });
    }

    #[test]
    fn encode_one_is_stateless() {
        let mut a = Assembler::new();
        a.define_constant("K", 7);
        assert_eq!(a.encode_one("pushl $K").unwrap(), [0x6a, 0x07]);
        assert_eq!(a.encode_one("jmp somewhere").unwrap(), [0xe9, 0, 0, 0, 0]);
        assert_eq!(a.encode_one("").unwrap(), Vec::<u8>::new());
        assert!(a.encode_one("movl %eax").is_err());
        let r = a.finish().unwrap();
        assert!(r.is_empty());
    }

    fn row(addr: u64, hex: &str, text: &str) -> String {
        format!("{:08X}  {:<16}  {}", addr, hex, text)
    }

    #[test]
    fn listing_layout() {
        let mut a = Assembler::new();
        a.enable_listing();
        a.emit("entry: pushl %ebp\nmovl $0x12345678, 0x100(%esp)\nend:")
            .unwrap();
        let listing = a.finish().unwrap().listing();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "00000000                  entry:");
        assert_eq!(lines[1], row(0, "55", "pushl %ebp"));
        assert_eq!(
            lines[2],
            row(1, "C784240001000078", "movl $0x12345678, 0x100(%esp)")
        );
        assert_eq!(lines[3], "00000009  563412");
        assert_eq!(lines[4], "0000000C                  end:");
    }

    #[test]
    fn listing_without_text_breaks_only_at_labels() {
        let r = asm("nop; ret\nl1: int $3");
        assert_eq!(
            r.listing(),
            "00000000  90C3\n00000002                  l1:\n00000002  CC\n"
        );
    }

    #[test]
    fn empty_source() {
        let r = asm("");
        assert!(r.is_empty());
        assert!(r.labels().is_empty());
        assert_eq!(r.listing(), "");
    }
}
