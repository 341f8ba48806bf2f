//! Test utilities for EAL
//!
//! Common helpers for compiling and running EAL source in tests and
//! benchmarks.

use crate::bytecode::{Compiler, Optimizer, Program};
use crate::config::Limits;
use crate::executor::{ExecutionReport, Executor};
use crate::monitor::Monitor;
use crate::vm::{Machine, RunOutcome};

/// Result type for test helpers
pub type TestResult<T> = Result<T, String>;

/// Compile and optimize source without an advisory predictor
///
/// # Errors
/// Returns error if compilation fails outright
pub fn compile_source(source: &str) -> TestResult<Program> {
    let program = Compiler::new()
        .compile(source)
        .map_err(|e| format!("Compile error: {e}"))?;
    Ok(Optimizer::new().optimize_program(program))
}

/// Compile and run source on a fresh machine with default limits
///
/// # Errors
/// Returns error if compilation fails outright
pub fn run_source(source: &str) -> TestResult<(Machine, RunOutcome)> {
    run_with_limits(source, Limits::default())
}

/// Compile and run source on a fresh machine with the given limits
///
/// # Errors
/// Returns error if compilation fails outright
pub fn run_with_limits(source: &str, limits: Limits) -> TestResult<(Machine, RunOutcome)> {
    let program = compile_source(source)?;
    let mut machine = Machine::new(limits);
    machine.load(&program);
    let outcome = machine.run(&program.code, &mut Monitor::new());
    Ok((machine, outcome))
}

/// Run source through the default executor pipeline
///
/// # Errors
/// Returns error if a collaborator fails
pub fn execute(source: &str) -> TestResult<ExecutionReport> {
    Executor::new()
        .execute_code(source)
        .map_err(|e| format!("Collaborator error: {e}"))
}

/// Run source and read a single register
///
/// # Errors
/// Returns error if compilation fails or the run recorded execution errors
pub fn eval_register(source: &str, register: &str) -> TestResult<i64> {
    let (machine, _) = run_source(source)?;
    if let Some(err) = machine.errors().first() {
        return Err(format!("Execution error: {err}"));
    }
    Ok(machine.registers().get(register))
}
