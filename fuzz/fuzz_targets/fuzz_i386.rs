#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Fuzz the one-shot assembler: must never panic, only return Ok/Err.
    let _ = asm386::assemble(data);

    // Also fuzz with a non-zero base address.
    let _ = asm386::assemble_at(data, 0x0804_8000);

    // Single-instruction encoding, line by line.
    let asm = asm386::Assembler::new();
    for line in data.lines() {
        let _ = asm.encode_one(line);
    }

    // Fuzz the builder API with multiple emit calls (split on newlines).
    let mut asm = asm386::Assembler::new();
    asm.enable_listing();
    for line in data.lines() {
        if asm.emit(line).is_err() {
            return;
        }
    }
    if let Ok(result) = asm.finish() {
        let _ = result.listing();
    }
});
