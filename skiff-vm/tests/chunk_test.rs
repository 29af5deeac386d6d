// skiff-vm - Chunk and jump-patching tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use proptest::prelude::*;

use skiff_parser::SourceSpan;
use skiff_vm::{Chunk, OpCode, Value};

#[test]
fn emit_returns_the_instruction_offset() {
    let mut chunk = Chunk::new();
    assert_eq!(chunk.emit(OpCode::Pop, SourceSpan::empty(), &[]), 0);
    assert_eq!(chunk.emit(OpCode::LoadConst, SourceSpan::empty(), &[3]), 1);
    // Opcode byte plus one 4-byte operand.
    assert_eq!(chunk.emit(OpCode::Pop, SourceSpan::empty(), &[]), 6);
}

#[test]
fn operands_are_little_endian() {
    let mut chunk = Chunk::new();
    chunk.emit(OpCode::Jump, SourceSpan::empty(), &[0x01020304]);
    assert_eq!(&chunk.code[1..5], &[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(chunk.read_i32(1), Some(0x01020304));
}

#[test]
fn forward_jump_lands_on_the_marked_offset() {
    let mut chunk = Chunk::new();
    let mut label = Chunk::new_label();

    let jump = chunk.emit_jump(OpCode::JumpIfFalse, SourceSpan::empty(), &mut label);
    chunk.emit(OpCode::Pop, SourceSpan::empty(), &[]);
    chunk.emit(OpCode::Dup, SourceSpan::empty(), &[]);
    chunk.emit(OpCode::Swap, SourceSpan::empty(), &[]);
    chunk.mark_label(&mut label);

    assert_eq!(chunk.read_i32(jump + 1), Some(chunk.current_offset() as i32));
}

#[test]
fn several_sites_patch_to_one_label() {
    let mut chunk = Chunk::new();
    let mut label = Chunk::new_label();

    let first = chunk.emit_jump(OpCode::Jump, SourceSpan::empty(), &mut label);
    chunk.emit(OpCode::Pop, SourceSpan::empty(), &[]);
    let second = chunk.emit_jump(OpCode::Jump, SourceSpan::empty(), &mut label);
    chunk.mark_label(&mut label);

    let target = chunk.current_offset() as i32;
    assert_eq!(chunk.read_i32(first + 1), Some(target));
    assert_eq!(chunk.read_i32(second + 1), Some(target));
}

#[test]
fn constants_dedupe_by_value_but_not_doubles_across_bit_patterns() {
    let mut chunk = Chunk::new();
    let a = chunk.add_constant(Value::Double(0.0));
    let b = chunk.add_constant(Value::Double(-0.0));
    let c = chunk.add_constant(Value::Double(0.0));
    assert_ne!(a, b);
    assert_eq!(a, c);

    let s1 = chunk.add_constant(Value::string("skiff"));
    let s2 = chunk.add_constant(Value::string("skiff"));
    assert_eq!(s1, s2);
}

proptest! {
    /// Jump patching resolves to the mark offset for any number and shape
    /// of instructions emitted in between.
    #[test]
    fn patching_is_emission_order_independent(filler in proptest::collection::vec(0usize..3, 0..24)) {
        let mut chunk = Chunk::new();
        let mut label = Chunk::new_label();

        let jump = chunk.emit_jump(OpCode::Jump, SourceSpan::empty(), &mut label);
        for op in &filler {
            match op {
                0 => chunk.emit(OpCode::Pop, SourceSpan::empty(), &[]),
                1 => chunk.emit(OpCode::LoadConst, SourceSpan::empty(), &[7]),
                _ => chunk.emit(OpCode::Add, SourceSpan::empty(), &[]),
            };
        }
        chunk.mark_label(&mut label);
        let target = chunk.current_offset();
        chunk.emit(OpCode::Return, SourceSpan::empty(), &[]);

        prop_assert_eq!(chunk.read_i32(jump + 1), Some(target as i32));
    }
}
