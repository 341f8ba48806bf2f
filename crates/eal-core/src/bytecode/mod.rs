//! Bytecode module for the EAL virtual machine
//!
//! This module provides:
//! - `Instruction`: a decoded statement tagged with its source line
//! - `Compiler`: source text to `Program` compilation
//! - `Optimizer`: the statement interning pass
//! - The shared statement grammar and operand parsers
//! - Disassembler utilities for debugging

mod compiler;
mod debug;
mod error;
mod grammar;
mod instruction;
mod operand;
mod optimizer;

pub use compiler::{Advisory, Compiler, Declaration, Program};
pub use debug::{disassemble, disassemble_program};
pub use error::{CompileDiagnostic, CompileErrorKind};
pub use grammar::{
    classify, decode, function_declaration, is_function_name, line_statements, parse_condition,
    parse_operand, parse_place, statements, variable_declaration, LineClass, VariableDecl,
    MAX_NESTING,
};
pub use instruction::{ArithOp, Fault, Instruction, Loop, Op, PrintItem, Statement, StatementKind};
pub use operand::{Address, Cell, Comparison, Condition, Index, Operand, Place};
pub use optimizer::Optimizer;
