//! Instruction model shared by the compiler and the virtual machine
//!
//! Every statement is decoded once, at compile time, into a closed
//! [`StatementKind`]. The VM dispatches by matching on that variant and never
//! re-parses instruction text.

use std::fmt;
use std::rc::Rc;

use super::operand::{Condition, Operand, Place};

/// One executable instruction: a decoded statement plus its source line
///
/// The statement body is reference-counted so the optimizer can share one
/// representative between structurally identical statements on different
/// lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// 1-based source line number
    pub line: u32,

    /// Decoded statement
    pub stmt: Rc<Statement>,
}

impl Instruction {
    /// Create an instruction from a freshly decoded statement
    #[must_use]
    pub fn new(line: u32, stmt: Statement) -> Self {
        Self {
            line,
            stmt: Rc::new(stmt),
        }
    }

    /// The original statement text
    pub fn text(&self) -> &str {
        &self.stmt.text
    }

    /// The decoded statement kind
    pub fn kind(&self) -> &StatementKind {
        &self.stmt.kind
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stmt.text)
    }
}

/// A decoded statement, independent of the line it appeared on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    /// Original (trimmed) statement text
    pub text: String,

    /// Decoded form
    pub kind: StatementKind,
}

impl Statement {
    #[must_use]
    pub fn new(text: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// The closed set of executable statement kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `<mnemonic> <operands>`
    Assembly(Op),

    /// `if <condition> then [<statement>]`
    Conditional {
        condition: Condition,
        then: Option<Box<Statement>>,
    },

    /// `print [item, ...]`
    Print(Vec<PrintItem>),

    /// A statement that matched the grammar but cannot be executed.
    /// The VM reports the fault when it reaches the instruction.
    Unrecognized(Fault),
}

impl StatementKind {
    /// Short upper-case tag used by the disassembler
    pub fn tag(&self) -> &'static str {
        match self {
            StatementKind::Assembly(op) => op.name(),
            StatementKind::Conditional { .. } => "IF",
            StatementKind::Print(_) => "PRINT",
            StatementKind::Unrecognized(_) => "UNRECOGNIZED",
        }
    }
}

/// Assembly operations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    /// `mov dest, value`
    Mov { dest: Place, src: Operand },

    /// `add|sub|mul|div reg, value`
    Arith {
        op: ArithOp,
        dest: String,
        src: Operand,
    },

    /// `push value`
    Push(Operand),

    /// `pop dest`
    Pop(Place),

    /// `loop <kind> ...`
    Loop(Loop),

    /// `call name`
    Call(String),
}

impl Op {
    /// Upper-case mnemonic
    pub const fn name(&self) -> &'static str {
        match self {
            Op::Mov { .. } => "MOV",
            Op::Arith { op, .. } => op.name(),
            Op::Push(_) => "PUSH",
            Op::Pop(_) => "POP",
            Op::Loop(Loop::For { .. }) => "LOOP_FOR",
            Op::Loop(Loop::While { .. }) => "LOOP_WHILE",
            Op::Loop(Loop::DoWhile { .. }) => "LOOP_DO_WHILE",
            Op::Call(_) => "CALL",
        }
    }
}

/// Register arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    /// Match a lower-cased mnemonic
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        match mnemonic {
            "add" => Some(ArithOp::Add),
            "sub" => Some(ArithOp::Sub),
            "mul" => Some(ArithOp::Mul),
            "div" => Some(ArithOp::Div),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "ADD",
            ArithOp::Sub => "SUB",
            ArithOp::Mul => "MUL",
            ArithOp::Div => "DIV",
        }
    }

    /// Checked application; `None` on overflow or division by zero
    pub fn apply(self, current: i64, operand: i64) -> Option<i64> {
        match self {
            ArithOp::Add => current.checked_add(operand),
            ArithOp::Sub => current.checked_sub(operand),
            ArithOp::Mul => current.checked_mul(operand),
            ArithOp::Div => current.checked_div(operand),
        }
    }
}

/// The three loop forms
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Loop {
    /// Run `body` `count` times; count is resolved once on entry
    For { count: Operand, body: Box<Statement> },

    /// Test `condition` before each iteration
    While {
        condition: Condition,
        body: Box<Statement>,
    },

    /// Run `body` once, then test `condition` after each iteration
    DoWhile {
        condition: Condition,
        body: Box<Statement>,
    },
}

/// One item of a `print` statement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrintItem {
    /// Quoted string, printed verbatim
    Text(String),

    /// Operand, printed as its resolved value
    Value(Operand),
}

/// Decoding faults carried into execution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Mnemonic the VM has no operation for
    UnknownCommand(String),

    /// `loop` with a kind other than for/while/do-while
    UnknownLoopKind(String),

    /// Wrong operand count or an operand that does not parse
    MalformedOperand { mnemonic: String, detail: String },
}

impl Fault {
    pub fn malformed(mnemonic: impl Into<String>, detail: impl Into<String>) -> Self {
        Fault::MalformedOperand {
            mnemonic: mnemonic.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arith_apply_checks_overflow_and_zero() {
        assert_eq!(ArithOp::Add.apply(2, 3), Some(5));
        assert_eq!(ArithOp::Sub.apply(2, 3), Some(-1));
        assert_eq!(ArithOp::Add.apply(i64::MAX, 1), None);
        assert_eq!(ArithOp::Div.apply(7, 0), None);
        assert_eq!(ArithOp::Div.apply(7, 2), Some(3));
    }

    #[test]
    fn op_names() {
        let call = Op::Call("f".to_string());
        assert_eq!(call.name(), "CALL");
        let add = Op::Arith {
            op: ArithOp::Add,
            dest: "r1".to_string(),
            src: Operand::Literal(1),
        };
        assert_eq!(add.name(), "ADD");
    }

    #[test]
    fn instructions_compare_by_value() {
        let stmt = Statement::new("call f", StatementKind::Assembly(Op::Call("f".to_string())));
        let a = Instruction::new(1, stmt.clone());
        let b = Instruction::new(1, stmt.clone());
        let c = Instruction::new(2, stmt);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!Rc::ptr_eq(&a.stmt, &b.stmt));
    }
}
