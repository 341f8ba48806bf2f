//! Virtual Machine for the EAL pseudo-assembly language
//!
//! The machine executes decoded instructions against one request's state:
//! registers, memory cells, a value stack and a function table. Failures are
//! local to the instruction that raised them. The single exception is the
//! step budget, which halts the run.

mod error;
mod state;

pub use error::{ExecResult, ExecutionError, ExecutionErrorKind, StackFrame};
pub use state::{FunctionTable, Memory, MemoryCell, Registers, Slot};

use tracing::{debug, info, warn};

use crate::bytecode::{
    Address, ArithOp, Cell, Condition, Index, Instruction, Loop, Op, Operand, Place, PrintItem, Program,
    Statement, StatementKind,
};
use crate::config::{Limits, MAX_CALL_DEPTH};
use crate::monitor::Monitor;

/// Summary of one `run`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Top-level instructions executed, including failed ones
    pub executed: usize,

    /// Steps consumed, counting loop iterations and function bodies
    pub steps: u64,

    /// True when the step budget stopped the run early
    pub halted: bool,
}

/// The EAL virtual machine
#[derive(Debug)]
pub struct Machine {
    limits: Limits,
    registers: Registers,
    memory: Memory,
    stack: Vec<i64>,
    functions: FunctionTable,

    /// Active calls, outermost first
    frames: Vec<StackFrame>,

    steps: u64,
    output: Vec<String>,

    /// `mov: dest = value` entries
    journal: Vec<String>,

    errors: Vec<ExecutionError>,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl Machine {
    /// Create a machine with empty state
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            registers: Registers::default(),
            memory: Memory::default(),
            stack: Vec::new(),
            functions: FunctionTable::default(),
            frames: Vec::new(),
            steps: 0,
            output: Vec::new(),
            journal: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Store a function body, replacing any previous definition
    pub fn define_function(&mut self, name: impl Into<String>, body: Vec<Instruction>) {
        let name = name.into();
        if self.functions.define(name.clone(), body) {
            warn!("redefining function '{name}'");
        }
    }

    /// Load every function of a compiled program
    pub fn load(&mut self, program: &Program) {
        for (name, body) in &program.functions {
            self.define_function(name.clone(), body.clone());
        }
    }

    /// Execute `code` in order, logging each instruction to `monitor`.
    ///
    /// Instruction failures are recorded and execution moves on; budget
    /// exhaustion is recorded and stops the run.
    pub fn run(&mut self, code: &[Instruction], monitor: &mut Monitor) -> RunOutcome {
        let mut executed = 0;
        let mut halted = false;

        for instruction in code {
            let result = self.execute(instruction);
            monitor.log(instruction);
            executed += 1;

            if let Err(err) = result {
                let fatal = err.is_fatal();
                self.record(err);
                if fatal {
                    halted = true;
                    break;
                }
            }
        }

        info!(
            executed,
            steps = self.steps,
            errors = self.errors.len(),
            halted,
            "execution finished"
        );
        RunOutcome {
            executed,
            steps: self.steps,
            halted,
        }
    }

    /// Execute a single instruction
    pub fn execute(&mut self, instruction: &Instruction) -> ExecResult<()> {
        self.execute_statement(&instruction.stmt, instruction.line)
    }

    fn execute_statement(&mut self, stmt: &Statement, line: u32) -> ExecResult<()> {
        self.tick(line)?;
        match &stmt.kind {
            StatementKind::Assembly(op) => self.execute_op(op, line),
            StatementKind::Conditional { condition, then } => {
                if let Some(then) = then {
                    if self.test(condition) {
                        return self.execute_statement(then, line);
                    }
                }
                Ok(())
            }
            StatementKind::Print(items) => {
                self.print(items);
                Ok(())
            }
            StatementKind::Unrecognized(fault) => Err(self.error(fault.clone().into(), line)),
        }
    }

    fn execute_op(&mut self, op: &Op, line: u32) -> ExecResult<()> {
        match op {
            Op::Mov { dest, src } => {
                let value = self.resolve(src);
                self.store(dest, value);
                debug!(line, "mov: {dest} = {value}");
                self.journal.push(format!("mov: {dest} = {value}"));
                Ok(())
            }
            Op::Arith { op, dest, src } => {
                let operand = self.resolve(src);
                let current = self.registers.get(dest);
                match op.apply(current, operand) {
                    Some(result) => {
                        self.registers.set(dest, result);
                        Ok(())
                    }
                    None if operand == 0 && *op == ArithOp::Div => {
                        Err(self.error(ExecutionErrorKind::DivisionByZero, line))
                    }
                    None => Err(self.error(ExecutionErrorKind::ArithmeticOverflow(op.name()), line)),
                }
            }
            Op::Push(src) => {
                let value = self.resolve(src);
                self.stack.push(value);
                Ok(())
            }
            Op::Pop(dest) => {
                let Some(value) = self.stack.pop() else {
                    return Err(self.error(ExecutionErrorKind::StackUnderflow, line));
                };
                self.store(dest, value);
                Ok(())
            }
            Op::Loop(kind) => self.execute_loop(kind, line),
            Op::Call(name) => self.call(name, line),
        }
    }

    fn execute_loop(&mut self, kind: &Loop, line: u32) -> ExecResult<()> {
        let mut iteration: u64 = 0;
        let result = match kind {
            Loop::For { count, body } => {
                let count = self.resolve(count).max(0).unsigned_abs();
                (0..count).try_for_each(|i| {
                    iteration = i;
                    self.execute_statement(body, line)
                })
            }
            Loop::While { condition, body } => loop {
                if !self.test(condition) {
                    break Ok(());
                }
                if let Err(err) = self.execute_statement(body, line) {
                    break Err(err);
                }
                iteration += 1;
            },
            Loop::DoWhile { condition, body } => loop {
                if let Err(err) = self.execute_statement(body, line) {
                    break Err(err);
                }
                iteration += 1;
                if !self.test(condition) {
                    break Ok(());
                }
            },
        };

        result.map_err(|err| {
            if err.is_fatal() {
                return err;
            }
            let kind = ExecutionErrorKind::InLoop {
                iteration,
                source: Box::new(err.kind),
            };
            self.error(kind, line)
        })
    }

    fn call(&mut self, name: &str, line: u32) -> ExecResult<()> {
        let limit = self.limits.max_call_depth.min(MAX_CALL_DEPTH);
        if self.frames.len() >= limit {
            return Err(self.error(ExecutionErrorKind::CallDepthExceeded(limit), line));
        }
        let Some(body) = self.functions.body(name) else {
            return Err(self.error(ExecutionErrorKind::UndefinedFunction(name.to_string()), line));
        };

        self.frames.push(StackFrame::new(name, line));
        let mut result = Ok(());
        for instruction in body.iter() {
            if let Err(err) = self.execute(instruction) {
                if err.is_fatal() {
                    result = Err(err);
                    break;
                }
                self.record(err);
            }
        }
        self.frames.pop();
        result
    }

    /// Consume one step of the budget
    fn tick(&mut self, line: u32) -> ExecResult<()> {
        if self.steps >= self.limits.max_steps {
            let limit = self.limits.max_steps;
            return Err(self.error(ExecutionErrorKind::BudgetExhausted(limit), line));
        }
        self.steps += 1;
        Ok(())
    }

    fn print(&mut self, items: &[PrintItem]) {
        let parts: Vec<String> = items
            .iter()
            .map(|item| match item {
                PrintItem::Text(text) => text.clone(),
                PrintItem::Value(operand) => self.resolve(operand).to_string(),
            })
            .collect();
        self.output.push(parts.join(" "));
    }

    fn resolve(&self, operand: &Operand) -> i64 {
        match operand {
            Operand::Literal(value) => *value,
            Operand::Register(name) => self.registers.get(name),
            Operand::Cell(cell) => {
                let slot = self.slot(cell);
                self.memory.get(&cell.container, &slot)
            }
        }
    }

    fn store(&mut self, dest: &Place, value: i64) {
        match dest {
            Place::Register(name) => self.registers.set(name, value),
            Place::Cell(cell) => {
                let slot = self.slot(cell);
                self.memory.set(&cell.container, slot, value);
            }
        }
    }

    fn slot(&self, cell: &Cell) -> Slot {
        match &cell.address {
            Address::Index(Index::Literal(index)) => Slot::Index(*index),
            Address::Index(Index::Register(name)) => Slot::Index(self.registers.get(name)),
            Address::Key(key) => Slot::Key(key.clone()),
        }
    }

    fn test(&self, condition: &Condition) -> bool {
        let lhs = self.resolve(&condition.lhs);
        match &condition.rhs {
            Some((cmp, rhs)) => cmp.apply(lhs, self.resolve(rhs)),
            None => lhs != 0,
        }
    }

    /// Build an error carrying the active call frames, innermost first
    fn error(&self, kind: ExecutionErrorKind, line: u32) -> ExecutionError {
        self.frames
            .iter()
            .rev()
            .fold(ExecutionError::new(kind, line), |err, frame| {
                err.with_frame(frame.clone())
            })
    }

    fn record(&mut self, err: ExecutionError) {
        warn!("{err}");
        self.errors.push(err);
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn stack(&self) -> &[i64] {
        &self.stack
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// Lines produced by `print`
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    /// Errors recorded so far, in the order they occurred
    pub fn errors(&self) -> &[ExecutionError] {
        &self.errors
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}
