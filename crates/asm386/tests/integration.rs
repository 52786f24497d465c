//! Integration tests for asm386.
//!
//! Whole programs go through the public API end to end: line splitting,
//! matching, encoding, relaxation and the final link.

use asm386::{assemble, assemble_at, AsmError, Assembler, RelocKind, ResourceLimits};

// ============================================================================
// One-Shot API
// ============================================================================

#[test]
fn one_shot_nop() {
    assert_eq!(assemble("nop").unwrap(), vec![0x90]);
}

#[test]
fn one_shot_multiple_statements() {
    assert_eq!(assemble("nop\nnop; ret").unwrap(), vec![0x90, 0x90, 0xc3]);
}

#[test]
fn one_shot_comments_and_blank_lines() {
    let bytes = assemble("\n# leading comment\n   nop   # trailing\n\n").unwrap();
    assert_eq!(bytes, vec![0x90]);
}

#[test]
fn one_shot_with_base_address() {
    let bytes = assemble_at("self: jmp *self", 0x2000).unwrap();
    assert_eq!(bytes, vec![0xff, 0x25, 0x00, 0x20, 0x00, 0x00]);
}

#[test]
fn one_shot_external_fields_are_zero() {
    let bytes = assemble("call exit").unwrap();
    assert_eq!(bytes, vec![0xe8, 0, 0, 0, 0]);
}

#[test]
fn one_shot_reports_first_error() {
    assert!(matches!(
        assemble("nop\nmovb $300, %al"),
        Err(AsmError::AmbiguousSize { .. })
    ));
}

// ============================================================================
// Complete programs
// ============================================================================

#[test]
fn linux_write_and_exit() {
    let mut asm = Assembler::new();
    asm.base_address(0x0804_8000).define_constant("len", 6);
    asm.emit(
        r#"
_start:
    movl $4, %eax        # sys_write
    movl $1, %ebx
    movl $msg, %ecx
    movl $len, %edx
    int $0x80
    movl $1, %eax        # sys_exit
    xorl %ebx, %ebx
    int $0x80
msg:
"#,
    )
    .unwrap();
    let result = asm.finish().unwrap();

    #[rustfmt::skip]
    let expected = [
        0xb8, 0x04, 0x00, 0x00, 0x00,
        0xbb, 0x01, 0x00, 0x00, 0x00,
        0xb9, 0x1f, 0x80, 0x04, 0x08,
        0xba, 0x06, 0x00, 0x00, 0x00,
        0xcd, 0x80,
        0xb8, 0x01, 0x00, 0x00, 0x00,
        0x31, 0xdb,
        0xcd, 0x80,
    ];
    assert_eq!(result.bytes(), &expected);
    assert_eq!(result.label_address("_start"), Some(0x0804_8000));
    assert_eq!(result.label_address("msg"), Some(0x0804_801f));
    assert!(result.relocations().is_empty());
}

#[test]
fn strlen_with_string_instruction() {
    let bytes = assemble(
        r#"
strlen:
    pushl %edi
    movl 8(%esp), %edi
    xorl %eax, %eax
    movl $-1, %ecx
    cld
    repne scasb
    notl %ecx
    decl %ecx
    movl %ecx, %eax
    popl %edi
    ret
"#,
    )
    .unwrap();

    #[rustfmt::skip]
    let expected = vec![
        0x57,
        0x8b, 0x7c, 0x24, 0x08,
        0x31, 0xc0,
        0xb9, 0xff, 0xff, 0xff, 0xff,
        0xfc,
        0xf2, 0xae,
        0xf7, 0xd1,
        0x49,
        0x89, 0xc8,
        0x5f,
        0xc3,
    ];
    assert_eq!(bytes, expected);
}

#[test]
fn summing_loop() {
    let mut asm = Assembler::new();
    asm.emit(
        r#"
    movl $0, %eax
    movl $10, %ecx
top:
    addl %ecx, %eax
    loop top
    cmpl $55, %eax
    je ok
    hlt
ok: ret
"#,
    )
    .unwrap();
    let result = asm.finish().unwrap();

    #[rustfmt::skip]
    let expected = [
        0xb8, 0x00, 0x00, 0x00, 0x00,
        0xb9, 0x0a, 0x00, 0x00, 0x00,
        0x01, 0xc8,
        0xe2, 0xfc,
        0x83, 0xf8, 0x37,
        0x74, 0x01,
        0xf4,
        0xc3,
    ];
    assert_eq!(result.bytes(), &expected);
    assert_eq!(result.label_address("top"), Some(10));
    assert_eq!(result.label_address("ok"), Some(20));
}

#[test]
fn calls_into_a_library() {
    let mut asm = Assembler::new();
    asm.emit("pushl $fmt\ncall printf\naddl $4, %esp").unwrap();
    let result = asm.finish().unwrap();

    assert_eq!(
        result.bytes(),
        &[0x68, 0, 0, 0, 0, 0xe8, 0, 0, 0, 0, 0x83, 0xc4, 0x04]
    );
    let relocs: Vec<_> = result
        .relocations()
        .iter()
        .map(|r| (r.offset, r.kind, &*r.symbol))
        .collect();
    assert_eq!(
        relocs,
        vec![(1, RelocKind::Abs32, "fmt"), (6, RelocKind::Pc32, "printf")]
    );
}

// ============================================================================
// Builder API
// ============================================================================

#[test]
fn builder_emit_across_calls() {
    let mut asm = Assembler::new();
    asm.emit("pushl %ebp").unwrap();
    asm.emit("movl %esp, %ebp").unwrap();
    asm.emit("leave").unwrap();
    asm.emit("ret").unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(result.bytes(), &[0x55, 0x89, 0xe5, 0xc9, 0xc3]);
}

#[test]
fn builder_label_between_emits() {
    let mut asm = Assembler::new();
    asm.emit("jmp done").unwrap();
    asm.emit("nop").unwrap();
    asm.label("done").unwrap();
    asm.emit("ret").unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(result.bytes(), &[0xeb, 0x01, 0x90, 0xc3]);
}

#[test]
fn builder_chaining() {
    let mut asm = Assembler::new();
    asm.base_address(0x100)
        .define_constant("ONE", 1)
        .enable_listing()
        .emit("movl $ONE, %eax")
        .unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(result.base_address(), 0x100);
    assert_eq!(result.bytes(), &[0xb8, 1, 0, 0, 0]);
    assert!(result.listing().starts_with("00000100  B801000000"));
}

#[test]
fn labels_are_sorted_by_name() {
    let mut asm = Assembler::new();
    asm.emit("zeta: nop\nalpha: nop\nmid: ret").unwrap();
    let result = asm.finish().unwrap();
    let names: Vec<&str> = result.labels().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["alpha", "mid", "zeta"]);
}

#[test]
fn several_labels_on_one_line() {
    let mut asm = Assembler::new();
    asm.emit("nop\na: b: c: ret").unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(result.label_address("a"), Some(1));
    assert_eq!(result.label_address("b"), Some(1));
    assert_eq!(result.label_address("c"), Some(1));
}

// ============================================================================
// Branch relaxation
// ============================================================================

fn nops(n: usize) -> String {
    "nop\n".repeat(n)
}

#[test]
fn jump_over_127_bytes_stays_short() {
    let bytes = assemble(&format!("jmp end\n{}end:", nops(127))).unwrap();
    assert_eq!(&bytes[..2], &[0xeb, 0x7f]);
    assert_eq!(bytes.len(), 129);
}

#[test]
fn jump_over_128_bytes_grows() {
    let bytes = assemble(&format!("jmp end\n{}end:", nops(128))).unwrap();
    assert_eq!(&bytes[..5], &[0xe9, 0x80, 0x00, 0x00, 0x00]);
    assert_eq!(bytes.len(), 133);
}

#[test]
fn conditional_jump_grows_to_six_bytes() {
    let bytes = assemble(&format!("jne end\n{}end:", nops(200))).unwrap();
    assert_eq!(&bytes[..6], &[0x0f, 0x85, 0xc8, 0x00, 0x00, 0x00]);
}

#[test]
fn backward_jump_at_the_limit() {
    // the 2-byte jump ends 128 bytes after `top`
    let bytes = assemble(&format!("top:\n{}jmp top", nops(126))).unwrap();
    assert_eq!(&bytes[126..], &[0xeb, 0x80]);

    let bytes = assemble(&format!("top:\n{}jmp top", nops(127))).unwrap();
    assert_eq!(&bytes[127..], &[0xe9, 0x7c, 0xff, 0xff, 0xff]);
}

#[test]
fn growth_moves_later_labels() {
    let mut asm = Assembler::new();
    asm.emit(&format!("jmp far\nnear: nop\n{}far: ret", nops(200))).unwrap();
    let result = asm.finish().unwrap();
    assert_eq!(result.label_address("near"), Some(5));
    assert_eq!(result.label_address("far"), Some(206));
}

#[test]
fn loop_out_of_range_is_an_error() {
    let err = assemble(&format!("top:\n{}loop top", nops(200))).unwrap_err();
    assert!(matches!(err, AsmError::BranchOutOfRange { max: 127, .. }));
}

// ============================================================================
// Errors and limits
// ============================================================================

#[test]
fn errors_carry_line_numbers() {
    let err = assemble("nop\nnop\nfrobnicate %eax").unwrap_err();
    assert_eq!(err.span().map(|s| s.line), Some(3));
}

#[test]
fn every_bad_line_is_reported() {
    let err = assemble("movl %eax\nnop\naddb %eax, %ebx\nmovq %rax, %rbx").unwrap_err();
    let AsmError::Multiple { errors } = err else {
        panic!("expected several errors, got {err:?}");
    };
    let lines: Vec<u32> = errors.iter().filter_map(|e| e.span()).map(|s| s.line).collect();
    assert_eq!(lines, [1, 3, 4]);
}

#[test]
fn error_display_mentions_the_mnemonic() {
    let err = assemble("cpuid").unwrap_err();
    assert!(err.to_string().contains("cpuid"));
}

#[test]
fn output_limit() {
    let mut asm = Assembler::new();
    asm.limits(ResourceLimits {
        max_output_bytes: 8,
        ..ResourceLimits::default()
    });
    let err = asm.emit(&nops(9)).unwrap_err();
    assert!(matches!(
        err,
        AsmError::ResourceLimitExceeded { ref resource, limit: 8 } if resource == "output bytes"
    ));
}

#[test]
fn relocation_display_names() {
    assert_eq!(RelocKind::Abs32.to_string(), "R_386_32");
    assert_eq!(RelocKind::Pc32.to_string(), "R_386_PC32");
    assert_eq!(RelocKind::Pc8.to_string(), "R_386_PC8");
}
