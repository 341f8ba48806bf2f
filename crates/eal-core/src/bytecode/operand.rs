//! Operands, destinations and conditions decoded from instruction text

use std::fmt;

/// A source value for an instruction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Integer literal (`42`, `-7`)
    Literal(i64),

    /// Register read; unset registers read as 0
    Register(String),

    /// Array or dictionary cell read; unset cells read as 0
    Cell(Cell),
}

/// A writable destination
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Place {
    /// Named register
    Register(String),

    /// Array or dictionary cell
    Cell(Cell),
}

/// A memory cell reference: `name[index]` or `name{key}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Container name
    pub container: String,

    /// Address inside the container
    pub address: Address,
}

/// How a cell is addressed inside its container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Array addressing; the index is integer-valued
    Index(Index),

    /// Dictionary addressing; the key is an opaque token
    Key(String),
}

/// Array index expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Index {
    /// Literal index
    Literal(i64),

    /// Index taken from a register at execution time
    Register(String),
}

/// Comparison operators usable in conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    /// Parse a comparison symbol
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Comparison::Eq),
            "!=" => Some(Comparison::Ne),
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::Le),
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::Ge),
            _ => None,
        }
    }

    /// The source symbol for this comparison
    pub const fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }

    /// Apply the comparison
    pub const fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
        }
    }
}

/// A loop or branch predicate
///
/// Either `lhs <cmp> rhs`, or a bare operand that holds when non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    pub lhs: Operand,
    pub rhs: Option<(Comparison, Operand)>,
}

impl Condition {
    /// A condition that tests a single operand for non-zero
    pub fn truthy(operand: Operand) -> Self {
        Self {
            lhs: operand,
            rhs: None,
        }
    }

    /// A binary comparison
    pub fn compare(lhs: Operand, cmp: Comparison, rhs: Operand) -> Self {
        Self {
            lhs,
            rhs: Some((cmp, rhs)),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(n) => write!(f, "{n}"),
            Operand::Register(name) => write!(f, "{name}"),
            Operand::Cell(cell) => write!(f, "{cell}"),
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Register(name) => write!(f, "{name}"),
            Place::Cell(cell) => write!(f, "{cell}"),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Address::Index(Index::Literal(n)) => write!(f, "{}[{n}]", self.container),
            Address::Index(Index::Register(reg)) => write!(f, "{}[{reg}]", self.container),
            Address::Key(key) => write!(f, "{}{{{key}}}", self.container),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lhs)?;
        if let Some((cmp, rhs)) = &self.rhs {
            write!(f, " {} {rhs}", cmp.symbol())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_symbols_round_trip() {
        for symbol in ["==", "!=", "<", "<=", ">", ">="] {
            let cmp = Comparison::from_symbol(symbol).unwrap();
            assert_eq!(cmp.symbol(), symbol);
        }
        assert!(Comparison::from_symbol("=").is_none());
    }

    #[test]
    fn comparison_apply() {
        assert!(Comparison::Lt.apply(1, 2));
        assert!(!Comparison::Gt.apply(1, 2));
        assert!(Comparison::Le.apply(2, 2));
        assert!(Comparison::Ne.apply(0, 1));
    }

    #[test]
    fn cell_display() {
        let arr = Cell {
            container: "arr".to_string(),
            address: Address::Index(Index::Literal(0)),
        };
        let dict = Cell {
            container: "env".to_string(),
            address: Address::Key("home".to_string()),
        };
        assert_eq!(arr.to_string(), "arr[0]");
        assert_eq!(dict.to_string(), "env{home}");
    }
}
