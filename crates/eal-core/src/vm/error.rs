//! Execution errors for the EAL virtual machine

use std::fmt;

use serde::Serialize;

use crate::bytecode::Fault;

/// An error raised while executing one instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionError {
    /// The kind of error
    #[serde(serialize_with = "serialize_display")]
    pub kind: ExecutionErrorKind,

    /// Source line of the failing instruction
    pub line: u32,

    /// Active calls at the point of error, innermost first
    pub stack_trace: Vec<StackFrame>,
}

fn serialize_display<S: serde::Serializer>(
    kind: &ExecutionErrorKind,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(kind)
}

impl ExecutionError {
    /// Create a new execution error
    pub fn new(kind: ExecutionErrorKind, line: u32) -> Self {
        Self {
            kind,
            line,
            stack_trace: Vec::new(),
        }
    }

    /// Add a stack frame to the trace
    #[must_use]
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.stack_trace.push(frame);
        self
    }

    /// Errors that stop the whole run rather than one instruction
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ExecutionErrorKind::BudgetExhausted(_))
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)?;
        for frame in &self.stack_trace {
            write!(f, "\n  at {} (line {})", frame.function_name, frame.line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionError {}

/// A call frame in a stack trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    /// The called function
    pub function_name: String,

    /// Line of the `call` instruction
    pub line: u32,
}

impl StackFrame {
    pub fn new(function_name: impl Into<String>, line: u32) -> Self {
        Self {
            function_name: function_name.into(),
            line,
        }
    }
}

/// The kind of execution error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionErrorKind {
    /// Mnemonic with no operation
    UnknownCommand(String),

    /// `call` of a name missing from the function table
    UndefinedFunction(String),

    /// `loop` kind other than for, while and do-while
    UnknownLoopKind(String),

    /// Operand count or shape the operation cannot use
    MalformedOperand { mnemonic: String, detail: String },

    /// `pop` on an empty stack
    StackUnderflow,

    DivisionByZero,

    /// Checked arithmetic overflowed
    ArithmeticOverflow(&'static str),

    /// `call` nesting exceeded the configured depth
    CallDepthExceeded(usize),

    /// The step budget ran out; the run stops here
    BudgetExhausted(u64),

    /// Failure inside a loop body, reported on the loop instruction
    InLoop {
        iteration: u64,
        source: Box<ExecutionErrorKind>,
    },
}

impl From<Fault> for ExecutionErrorKind {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::UnknownCommand(command) => ExecutionErrorKind::UnknownCommand(command),
            Fault::UnknownLoopKind(kind) => ExecutionErrorKind::UnknownLoopKind(kind),
            Fault::MalformedOperand { mnemonic, detail } => {
                ExecutionErrorKind::MalformedOperand { mnemonic, detail }
            }
        }
    }
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionErrorKind::UnknownCommand(command) => {
                write!(f, "unknown command '{command}'")
            }
            ExecutionErrorKind::UndefinedFunction(name) => {
                write!(f, "undefined function '{name}'")
            }
            ExecutionErrorKind::UnknownLoopKind(kind) => write!(f, "unknown loop kind '{kind}'"),
            ExecutionErrorKind::MalformedOperand { mnemonic, detail } => {
                write!(f, "malformed operand for '{mnemonic}': {detail}")
            }
            ExecutionErrorKind::StackUnderflow => write!(f, "pop from an empty stack"),
            ExecutionErrorKind::DivisionByZero => write!(f, "division by zero"),
            ExecutionErrorKind::ArithmeticOverflow(op) => write!(f, "integer overflow in {op}"),
            ExecutionErrorKind::CallDepthExceeded(limit) => {
                write!(f, "call depth exceeded (limit {limit})")
            }
            ExecutionErrorKind::BudgetExhausted(limit) => {
                write!(f, "execution budget of {limit} steps exhausted")
            }
            ExecutionErrorKind::InLoop { iteration, source } => {
                write!(f, "loop aborted at iteration {iteration}: {source}")
            }
        }
    }
}

/// Result type for VM operations
pub type ExecResult<T> = Result<T, ExecutionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_line_and_frames() {
        let err = ExecutionError::new(ExecutionErrorKind::UndefinedFunction("missing_fn".into()), 4)
            .with_frame(StackFrame::new("outer", 9));
        let msg = err.to_string();
        assert!(msg.starts_with("line 4: undefined function 'missing_fn'"));
        assert!(msg.contains("at outer (line 9)"));
    }

    #[test]
    fn faults_convert_to_kinds() {
        let kind: ExecutionErrorKind = Fault::UnknownLoopKind("until".into()).into();
        assert_eq!(kind, ExecutionErrorKind::UnknownLoopKind("until".into()));
    }

    #[test]
    fn only_budget_exhaustion_is_fatal() {
        assert!(ExecutionError::new(ExecutionErrorKind::BudgetExhausted(10), 1).is_fatal());
        assert!(!ExecutionError::new(ExecutionErrorKind::DivisionByZero, 1).is_fatal());
    }

    #[test]
    fn serializes_kind_as_message() {
        let err = ExecutionError::new(ExecutionErrorKind::StackUnderflow, 2);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "pop from an empty stack");
        assert_eq!(json["line"], 2);
    }
}
