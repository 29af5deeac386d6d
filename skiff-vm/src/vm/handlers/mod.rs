// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Opcode handlers, split by instruction category.

pub mod arithmetic;
pub mod control;
pub mod indexing;
pub mod objects;
