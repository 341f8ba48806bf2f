//! Interning pass over compiled instructions
//!
//! The first occurrence of a statement body is cached; later structurally
//! equal bodies are replaced by the cached representative. Line numbers stay
//! with their instructions, so the output is equal element-for-element to the
//! input and executes identically.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;

use super::compiler::Program;
use super::instruction::{Instruction, Statement};

/// Statement interning cache
#[derive(Debug, Default)]
pub struct Optimizer {
    cache: HashSet<Rc<Statement>>,
    interned: usize,
}

impl Optimizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern every instruction of `code`, preserving length and order
    pub fn optimize(&mut self, code: &[Instruction]) -> Vec<Instruction> {
        code.iter().map(|instruction| self.intern(instruction)).collect()
    }

    /// Intern the main sequence and every function body with one cache
    pub fn optimize_program(&mut self, mut program: Program) -> Program {
        let before = self.interned;
        program.code = self.optimize(&program.code);
        for body in program.functions.values_mut() {
            *body = self.optimize(body);
        }
        debug!(
            interned = self.interned - before,
            unique = self.cache.len(),
            "optimized program"
        );
        program
    }

    /// Number of instructions replaced by a cached representative so far
    pub fn interned(&self) -> usize {
        self.interned
    }

    fn intern(&mut self, instruction: &Instruction) -> Instruction {
        let stmt = match self.cache.get(&instruction.stmt) {
            Some(cached) => {
                if !Rc::ptr_eq(cached, &instruction.stmt) {
                    self.interned += 1;
                }
                Rc::clone(cached)
            }
            None => {
                self.cache.insert(Rc::clone(&instruction.stmt));
                Rc::clone(&instruction.stmt)
            }
        };
        Instruction {
            line: instruction.line,
            stmt,
        }
    }
}
