//! Program disassembler for debugging

use std::fmt::Write;

use super::compiler::Program;
use super::instruction::{Instruction, StatementKind};

/// Disassemble an instruction sequence to a string
pub fn disassemble(code: &[Instruction], name: &str) -> String {
    let mut output = String::new();
    writeln!(output, "== {name} ==").unwrap();

    let mut previous_line = None;
    for (offset, instruction) in code.iter().enumerate() {
        disassemble_instruction_to_string(instruction, offset, previous_line, &mut output);
        previous_line = Some(instruction.line);
    }
    output
}

/// Disassemble the main sequence followed by every function body
pub fn disassemble_program(program: &Program) -> String {
    let mut output = disassemble(&program.code, "main");
    for (name, body) in &program.functions {
        output.push('\n');
        output.push_str(&disassemble(body, name));
    }
    output
}

fn disassemble_instruction_to_string(
    instruction: &Instruction,
    offset: usize,
    previous_line: Option<u32>,
    output: &mut String,
) {
    write!(output, "{offset:04} ").unwrap();

    // Several statements can share a line
    if previous_line == Some(instruction.line) {
        write!(output, "   | ").unwrap();
    } else {
        write!(output, "{:4} ", instruction.line).unwrap();
    }

    let kind = instruction.kind();
    write!(output, "{:<14} {}", kind.tag(), instruction.text()).unwrap();
    if let StatementKind::Unrecognized(fault) = kind {
        write!(output, "    ; {fault:?}").unwrap();
    }
    output.push('\n');
}
