// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode disassembler.
//!
//! A pure reader over compiled chunks: one line per instruction with
//! operand annotations and source-span comments on line changes. Nested
//! function chunks found in the constant pool are appended after their
//! parent. Never required for execution.

use std::fmt::Write as _;

use crate::chunk::Chunk;
use crate::function::UserFunction;
use crate::opcode::OpCode;
use crate::value::{RefValue, Value};

/// Disassemble a function and every nested function it references.
pub fn disassemble(function: &UserFunction) -> String {
    let mut out = String::new();
    append_function(&mut out, function);
    out
}

fn append_function(out: &mut String, function: &UserFunction) {
    let _ = writeln!(out, ";;;;;; {}", function);
    append_chunk(out, &function.chunk);

    for constant in &function.chunk.constants {
        if let Value::Ref(r) = constant {
            if let RefValue::Function(nested) = r.as_ref() {
                let _ = writeln!(out);
                append_function(out, nested);
            }
        }
    }
}

fn append_chunk(out: &mut String, chunk: &Chunk) {
    let mut last_line: Option<u32> = None;
    let mut ip = 0;

    while ip < chunk.code.len() {
        if let Some(span) = chunk.debug_span(ip) {
            if span.start.line != 0 && last_line != Some(span.start.line) {
                last_line = Some(span.start.line);
                let _ = writeln!(out, ";;;;;; {}", span);
            }
        }

        let op_ip = ip;
        let op = match OpCode::from_byte(chunk.code[ip]) {
            Some(op) => op,
            None => {
                let _ = writeln!(out, "{:04}   <bad opcode {}>", op_ip, chunk.code[ip]);
                return;
            }
        };
        ip += 1;

        let mut operands = Vec::new();
        for _ in 0..op.operand_count() {
            match chunk.read_i32(ip) {
                Some(value) => operands.push(value),
                None => {
                    let _ = writeln!(out, "{:04}   <truncated operand>", op_ip);
                    return;
                }
            }
            ip += 4;
        }

        // MakeClosure carries a trailing descriptor table.
        if op == OpCode::MakeClosure {
            let captures = operands.get(1).copied().unwrap_or(0);
            for _ in 0..captures * 2 {
                match chunk.read_i32(ip) {
                    Some(value) => operands.push(value),
                    None => {
                        let _ = writeln!(out, "{:04}   <truncated operand>", op_ip);
                        return;
                    }
                }
                ip += 4;
            }
        }

        let _ = write!(out, "{:04}   {:<16}", op_ip, op.name());
        for operand in &operands {
            let _ = write!(out, " {}", operand);
        }

        // Annotate constant references with their rendering.
        if matches!(
            op,
            OpCode::LoadConst | OpCode::Construct | OpCode::GetField | OpCode::SetField
        ) {
            if let Some(&index) = operands.first() {
                if let Some(constant) = chunk.constants.get(index as usize) {
                    let _ = write!(out, "    ; {}", constant);
                }
            }
        }
        if op == OpCode::MakeClosure {
            if let Some(&index) = operands.first() {
                if let Some(constant) = chunk.constants.get(index as usize) {
                    let _ = write!(out, "    ; {}", constant);
                }
            }
        }

        let _ = writeln!(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_parser::SourceSpan;

    #[test]
    fn renders_one_line_per_instruction() {
        let mut chunk = Chunk::new();
        let index = chunk.add_constant(Value::Int(42)) as i32;
        chunk.emit(OpCode::LoadConst, SourceSpan::empty(), &[index]);
        chunk.emit(OpCode::Return, SourceSpan::empty(), &[]);

        let function = UserFunction::script(chunk, 0);
        let listing = disassemble(&function);

        assert!(listing.contains("LoadConst"));
        assert!(listing.contains("; 42"));
        assert!(listing.contains("Return"));
    }
}
