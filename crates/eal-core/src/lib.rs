//! EAL Core - compiler and virtual machine for the EAL pseudo-assembly language
//!
//! This crate provides the core functionality:
//! - Bytecode: instruction model, statement grammar, compiler and optimizer
//! - VM: instruction execution over registers, memory, stack and functions
//! - Monitor: per-instruction execution trace
//! - Advisory: error predictor, suggestion engine and trace visualizer
//! - Executor: the per-request pipeline and boundary response

/// EAL version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Advisory collaborators
pub mod advisory;

/// Instruction model, compiler and optimizer
pub mod bytecode;

/// Engine configuration
pub mod config;

/// Request pipeline
pub mod executor;

/// Execution trace
pub mod monitor;

/// Test helpers
pub mod testutil;

/// Virtual machine
pub mod vm;

/// Convenience re-export of the compiler
pub use bytecode::{Compiler, Optimizer, Program};

/// Convenience re-export of configuration
pub use config::{ConfigError, EngineConfig};

/// Convenience re-exports of the pipeline
pub use executor::{ExecutionReport, Executor, Response, Status};

pub use monitor::Monitor;

/// Convenience re-export of the VM
pub use vm::Machine;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn pipeline_from_crate_root() {
        let program = Compiler::new().compile("mov r1, 5; mov r2, r1").unwrap();
        let program = Optimizer::new().optimize_program(program);
        let mut machine = Machine::default();
        machine.run(&program.code, &mut Monitor::new());
        assert_eq!(machine.registers().get("r2"), 5);
    }
}
