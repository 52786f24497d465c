//! Basic assembly example: the one-shot and builder APIs.
//!
//! Run with: `cargo run --example basic`

use asm386::{assemble, Assembler};

fn main() {
    println!("=== asm386 basic example ===\n");

    // --- One-shot assembly ---
    println!("1. One-shot assembly (movl $42, %eax; ret):");
    let bytes = assemble("movl $42, %eax\nret").unwrap();
    print_hex("   ", &bytes);

    // --- Builder API ---
    println!("\n2. Builder API (cdecl function):");
    let mut asm = Assembler::new();
    asm.base_address(0x0804_8000).enable_listing();
    asm.emit(
        r#"
add3:
    pushl %ebp
    movl %esp, %ebp
    movl 8(%ebp), %eax      # a
    addl 12(%ebp), %eax     # + b
    addl 16(%ebp), %eax     # + c
    popl %ebp
    ret
"#,
    )
    .unwrap();
    let result = asm.finish().unwrap();
    print_hex("   ", result.bytes());

    println!("\n   Labels:");
    for (name, addr) in result.labels() {
        println!("   {}: 0x{:X}", name, addr);
    }

    println!("\n   Listing:");
    for line in result.listing().lines() {
        println!("   {}", line);
    }

    // --- Constants ---
    println!("\n3. Constants:");
    let mut asm = Assembler::new();
    asm.define_constant("SYS_EXIT", 1).define_constant("STATUS", 0);
    asm.emit("movl $SYS_EXIT, %eax\nmovl $STATUS, %ebx\nint $0x80")
        .unwrap();
    print_hex("   ", asm.finish().unwrap().bytes());

    // --- Relocations ---
    println!("\n4. Relocations for external symbols:");
    let mut asm = Assembler::new();
    asm.emit("pushl $greeting\ncall puts\naddl $4, %esp").unwrap();
    let result = asm.finish().unwrap();
    print_hex("   ", result.bytes());
    for r in result.relocations() {
        println!("   {:04X} {:<12} {}{:+}", r.offset, r.kind, r.symbol, r.addend);
    }

    // --- Branch relaxation ---
    println!("\n5. Branch relaxation (short vs long):");
    let short = assemble("je done\nnop\ndone: ret").unwrap();
    println!("   Short branch: {} bytes", short.len());
    print_hex("   ", &short);
    let long = assemble(&format!("je done\n{}done: ret", "nop\n".repeat(200))).unwrap();
    println!("   Long branch: first 6 bytes of {}", long.len());
    print_hex("   ", &long[..6]);

    println!("\n=== Done! ===");
}

fn print_hex(prefix: &str, bytes: &[u8]) {
    print!("{}", prefix);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && i % 16 == 0 {
            println!();
            print!("{}", prefix);
        }
        print!("{:02X} ", b);
    }
    println!();
}
