//! Fragment layout, branch relaxation, and final emission.
//!
//! The linker owns an ordered table of fragments: fixed instruction bytes
//! (possibly with relocations) and relaxable branches. [`Linker::finish`]
//! runs relaxation passes until no branch grows, then streams the final
//! bytes through an [`ObjectWriter`], patching every field that refers to
//! a label of this unit and forwarding the rest.

use alloc::collections::BTreeMap;
#[allow(unused_imports)]
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
#[allow(unused_imports)]
use alloc::string::ToString;
#[allow(unused_imports)]
use alloc::vec;
use alloc::vec::Vec;

use crate::encoder::{EncodedInstr, RelaxRequest, Relocation};
use crate::error::{AsmError, Span};
use crate::flags::{fits_in_signed_byte, fits_in_signed_word, fits_in_unsigned_byte, fits_in_unsigned_word};
use crate::relax::RelaxState;

/// Default bound on relaxation passes.
pub const DEFAULT_MAX_RELAX_PASSES: usize = 100;

/// Handle of a fragment in the linker's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentId(pub usize);

/// Receiver of the final section contents.
pub trait ObjectWriter {
    /// Append bytes to the section.
    fn append_bytes(&mut self, bytes: &[u8]);
    /// Record a relocation; its offset is relative to the section start.
    fn add_relocation(&mut self, reloc: Relocation);
    /// A relaxable fragment settled `extra` bytes beyond its one-byte opcode.
    fn grow_fragment(&mut self, id: FragmentId, extra: usize);
}

/// An in-memory [`ObjectWriter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionWriter {
    /// Section contents.
    pub bytes: Vec<u8>,
    /// Relocations left for a later link step.
    pub relocations: Vec<Relocation>,
    /// Settled growth of each relaxable fragment.
    pub growth: Vec<(FragmentId, usize)>,
}

impl ObjectWriter for SectionWriter {
    fn append_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn add_relocation(&mut self, reloc: Relocation) {
        self.relocations.push(reloc);
    }

    fn grow_fragment(&mut self, id: FragmentId, extra: usize) {
        self.growth.push((id, extra));
    }
}

/// One entry of the fragment table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Bytes of a fixed size.
    Fixed {
        /// The bytes, with zeroed relocation fields.
        bytes: Vec<u8>,
        /// Fields to patch or forward, offsets relative to `bytes`.
        relocations: Vec<Relocation>,
        /// Source span.
        span: Span,
    },
    /// A `jmp`/`jcc` whose length is decided by relaxation.
    Relax {
        /// Short-form opcode.
        opcode: u8,
        /// Current state.
        state: RelaxState,
        /// Branch target.
        target: Rc<str>,
        /// Constant added to the target.
        addend: i64,
        /// Source span.
        span: Span,
    },
}

impl Fragment {
    fn size(&self) -> usize {
        match self {
            Fragment::Fixed { bytes, .. } => bytes.len(),
            Fragment::Relax { state, .. } => state.size(),
        }
    }
}

/// A label definition tracking which fragment it precedes.
#[derive(Debug, Clone)]
struct LabelDef {
    fragment_index: usize,
    span: Span,
}

/// Result of [`Linker::finish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutput {
    /// Label addresses, sorted by name.
    pub labels: Vec<(String, u64)>,
    /// Address of each fragment, plus the end address as a sentinel.
    pub offsets: Vec<u64>,
}

/// The relaxation driver: collects fragments and labels, lays them out.
#[derive(Debug)]
pub struct Linker {
    fragments: Vec<Fragment>,
    labels: BTreeMap<String, LabelDef>,
    base_address: u64,
    max_passes: usize,
}

impl Default for Linker {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker {
    /// Create a new, empty linker with base address 0.
    pub fn new() -> Self {
        Self {
            fragments: Vec::new(),
            labels: BTreeMap::new(),
            base_address: 0,
            max_passes: DEFAULT_MAX_RELAX_PASSES,
        }
    }

    /// Set the address of the first byte.
    pub fn set_base_address(&mut self, addr: u64) {
        self.base_address = addr;
    }

    /// The address of the first byte.
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Bound the number of relaxation passes.
    pub fn set_max_passes(&mut self, max: usize) {
        self.max_passes = max;
    }

    /// Number of fragments added so far.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// The fragment behind a handle.
    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id.0)
    }

    /// Whether `name` is a label of this unit.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// Define a label at the current position (before the next fragment).
    pub fn add_label(&mut self, name: &str, span: Span) -> Result<(), AsmError> {
        if let Some(existing) = self.labels.get(name) {
            return Err(AsmError::DuplicateLabel {
                label: String::from(name),
                span,
                first_span: existing.span,
            });
        }
        self.labels.insert(
            String::from(name),
            LabelDef {
                fragment_index: self.fragments.len(),
                span,
            },
        );
        Ok(())
    }

    fn push(&mut self, fragment: Fragment) -> FragmentId {
        self.fragments.push(fragment);
        FragmentId(self.fragments.len() - 1)
    }

    /// Add fixed bytes.
    pub fn add_fixed(&mut self, bytes: Vec<u8>, relocations: Vec<Relocation>, span: Span) -> FragmentId {
        self.push(Fragment::Fixed {
            bytes,
            relocations,
            span,
        })
    }

    /// Add a relaxable branch in its initial state.
    pub fn add_relax(&mut self, request: RelaxRequest, span: Span) -> FragmentId {
        self.push(Fragment::Relax {
            opcode: request.opcode,
            state: RelaxState::initial(request.kind),
            target: request.symbol,
            addend: request.addend,
            span,
        })
    }

    /// Add an encoded instruction, choosing `Fixed` or `Relax`.
    pub fn add_encoded(&mut self, encoded: EncodedInstr, span: Span) -> FragmentId {
        match encoded.relax {
            Some(request) => self.add_relax(request, span),
            None => self.add_fixed(encoded.bytes.to_vec(), encoded.relocations, span),
        }
    }

    /// Lay out, relax and emit every fragment.
    ///
    /// On error nothing has been written to `writer`.
    pub fn finish(&mut self, writer: &mut dyn ObjectWriter) -> Result<LinkOutput, AsmError> {
        self.force_non_local();
        let offsets = self.relax()?;
        self.emit(writer, &offsets)?;

        let labels = self
            .labels
            .iter()
            .map(|(name, def)| (name.clone(), offsets[def.fragment_index]))
            .collect();
        Ok(LinkOutput { labels, offsets })
    }

    /// Branches to anything but a label of this unit go straight to their
    /// widest state.
    fn force_non_local(&mut self) {
        let labels = &self.labels;
        for frag in &mut self.fragments {
            if let Fragment::Relax { state, target, .. } = frag {
                if !labels.contains_key(&**target) {
                    *state = RelaxState::terminal(state.kind);
                }
            }
        }
    }

    // ── branch relaxation ──────────────────────────────────

    /// Promote branches until a pass promotes nothing. Returns the final
    /// offsets.
    fn relax(&mut self) -> Result<Vec<u64>, AsmError> {
        let mut offsets = Vec::with_capacity(self.fragments.len() + 1);
        let mut to_expand: Vec<(usize, RelaxState)> = Vec::new();

        for _pass in 0..self.max_passes {
            self.compute_offsets_into(&mut offsets);
            to_expand.clear();

            for (i, frag) in self.fragments.iter().enumerate() {
                if let Fragment::Relax {
                    state,
                    target,
                    addend,
                    ..
                } = frag
                {
                    if state.is_terminal() {
                        continue;
                    }
                    let Some(def) = self.labels.get(&**target) else {
                        continue;
                    };
                    let dest = offsets[def.fragment_index] as i64 + addend;
                    let next = state.relax(offsets[i] as i64, dest);
                    if next != *state {
                        to_expand.push((i, next));
                    }
                }
            }

            if to_expand.is_empty() {
                return Ok(offsets);
            }

            for &(idx, next) in &to_expand {
                if let Fragment::Relax { ref mut state, .. } = self.fragments[idx] {
                    *state = next;
                }
            }
        }

        Err(AsmError::RelaxationLimit {
            max: self.max_passes,
        })
    }

    /// `offsets[i]` is the address of fragment `i`; the last entry is the
    /// end address.
    fn compute_offsets_into(&self, offsets: &mut Vec<u64>) {
        offsets.clear();
        let mut current = self.base_address;
        for frag in &self.fragments {
            offsets.push(current);
            current += frag.size() as u64;
        }
        offsets.push(current);
    }

    // ── final emit ─────────────────────────────────────────

    fn label_address(&self, name: &str, offsets: &[u64]) -> Option<i64> {
        self.labels
            .get(name)
            .map(|def| offsets[def.fragment_index] as i64)
    }

    /// Write the laid-out fragments. Every local field is patched before
    /// the writer sees any output, so an error leaves it untouched.
    fn emit(&self, writer: &mut dyn ObjectWriter, offsets: &[u64]) -> Result<(), AsmError> {
        let mut patched = Vec::new();
        for (i, frag) in self.fragments.iter().enumerate() {
            if let Fragment::Fixed {
                bytes,
                relocations,
                span,
            } = frag
            {
                patched.push(self.patch_fixed(bytes, relocations, offsets[i], offsets, *span)?);
            }
        }

        let mut patched = patched.into_iter();
        for (i, frag) in self.fragments.iter().enumerate() {
            let start = offsets[i];
            let section_offset = (start - self.base_address) as usize;
            match frag {
                Fragment::Fixed { .. } => {
                    if let Some((bytes, forwarded)) = patched.next() {
                        for mut reloc in forwarded {
                            reloc.offset += section_offset;
                            writer.add_relocation(reloc);
                        }
                        writer.append_bytes(&bytes);
                    }
                }
                Fragment::Relax {
                    opcode,
                    state,
                    target,
                    addend,
                    ..
                } => {
                    writer.grow_fragment(FragmentId(i), state.growth());
                    let end = (start + state.size() as u64) as i64;
                    let disp = match self.label_address(target, offsets) {
                        Some(addr) => addr + addend - end,
                        None => {
                            let field = section_offset + state.patch_offset();
                            writer.add_relocation(Relocation::new(field, 4, target.clone(), *addend, true));
                            0
                        }
                    };
                    writer.append_bytes(&state.emit(*opcode, disp));
                }
            }
        }
        Ok(())
    }

    /// Patch the local relocations of a fixed fragment at `start` into a
    /// copy of its bytes; the others are returned for forwarding.
    fn patch_fixed(
        &self,
        bytes: &[u8],
        relocations: &[Relocation],
        start: u64,
        offsets: &[u64],
        span: Span,
    ) -> Result<(Vec<u8>, Vec<Relocation>), AsmError> {
        let mut bytes = bytes.to_vec();
        let mut forwarded = Vec::new();
        for reloc in relocations {
            match self.label_address(&reloc.symbol, offsets) {
                Some(addr) => {
                    let field_end = (start as usize + reloc.offset + usize::from(reloc.size)) as i64;
                    let value = if reloc.pc_relative {
                        addr + reloc.addend - field_end
                    } else {
                        addr + reloc.addend
                    };
                    patch_field(&mut bytes, reloc, value, span)?;
                }
                None => forwarded.push(reloc.clone()),
            }
        }
        Ok((bytes, forwarded))
    }
}

/// Write `value` into a relocation field, checking that it fits.
fn patch_field(bytes: &mut [u8], reloc: &Relocation, value: i64, span: Span) -> Result<(), AsmError> {
    let fits = match (reloc.size, reloc.pc_relative) {
        (1, true) => fits_in_signed_byte(value),
        (1, false) => fits_in_signed_byte(value) || fits_in_unsigned_byte(value),
        (2, true) => fits_in_signed_word(value),
        (2, false) => fits_in_signed_word(value) || fits_in_unsigned_word(value),
        _ => true,
    };
    if !fits {
        return Err(if reloc.pc_relative {
            AsmError::BranchOutOfRange {
                symbol: reloc.symbol.to_string(),
                disp: value,
                max: if reloc.size == 1 { 127 } else { 32767 },
                span,
            }
        } else {
            AsmError::AmbiguousSize {
                msg: format!(
                    "value {:#x} of `{}' does not fit in {} byte{}",
                    value,
                    reloc.symbol,
                    reloc.size,
                    if reloc.size == 1 { "" } else { "s" }
                ),
                span,
            }
        });
    }
    let size = usize::from(reloc.size);
    bytes[reloc.offset..reloc.offset + size].copy_from_slice(&value.to_le_bytes()[..size]);
    Ok(())
}
