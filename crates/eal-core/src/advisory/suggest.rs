//! Follow-up suggestions derived from the submitted source

use std::collections::HashSet;

use super::CollaboratorError;
use crate::bytecode::{
    decode, function_declaration, statements, Loop, Op, Operand, Place, PrintItem, Statement,
    StatementKind,
};

/// Produces free-text suggestions from the whole source after execution
pub trait SuggestionEngine: Send {
    fn suggest(&self, source: &str) -> Result<Vec<String>, CollaboratorError>;
}

/// Engine that never suggests anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuggestions;

impl SuggestionEngine for NoSuggestions {
    fn suggest(&self, _source: &str) -> Result<Vec<String>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Suggests lines that complete obvious loose ends:
/// registers written but never printed, and functions called but never
/// declared.
#[derive(Debug, Clone)]
pub struct HeuristicSuggester {
    max_suggestions: usize,
}

impl HeuristicSuggester {
    #[must_use]
    pub fn new(max_suggestions: usize) -> Self {
        Self { max_suggestions }
    }
}

impl Default for HeuristicSuggester {
    fn default() -> Self {
        Self::new(5)
    }
}

#[derive(Default)]
struct SourceFacts {
    written: Vec<String>,
    printed: HashSet<String>,
    called: Vec<String>,
    declared: HashSet<String>,
}

impl SourceFacts {
    fn write(&mut self, register: &str) {
        if !self.written.iter().any(|r| r == register) {
            self.written.push(register.to_string());
        }
    }

    fn call(&mut self, name: &str) {
        if !self.called.iter().any(|n| n == name) {
            self.called.push(name.to_string());
        }
    }

    fn visit(&mut self, stmt: &Statement) {
        match &stmt.kind {
            StatementKind::Assembly(op) => match op {
                Op::Mov {
                    dest: Place::Register(reg),
                    ..
                }
                | Op::Pop(Place::Register(reg))
                | Op::Arith { dest: reg, .. } => self.write(reg),
                Op::Loop(Loop::For { body, .. } | Loop::While { body, .. } | Loop::DoWhile { body, .. }) => {
                    self.visit(body);
                }
                Op::Call(name) => self.call(name),
                Op::Mov { .. } | Op::Pop(_) | Op::Push(_) => {}
            },
            StatementKind::Conditional { then, .. } => {
                if let Some(body) = then {
                    self.visit(body);
                }
            }
            StatementKind::Print(items) => {
                for item in items {
                    if let PrintItem::Value(Operand::Register(reg)) = item {
                        self.printed.insert(reg.clone());
                    }
                }
            }
            StatementKind::Unrecognized(_) => {}
        }
    }
}

impl SuggestionEngine for HeuristicSuggester {
    fn suggest(&self, source: &str) -> Result<Vec<String>, CollaboratorError> {
        let mut facts = SourceFacts::default();
        for (_, text) in statements(source) {
            if let Some(name) = function_declaration(text) {
                facts.declared.insert(name.to_string());
            } else if let Some(stmt) = decode(text) {
                facts.visit(&stmt);
            }
        }

        let undeclared = facts
            .called
            .iter()
            .filter(|name| !facts.declared.contains(*name))
            .map(|name| format!("declare function {name}"));
        let unprinted = facts
            .written
            .iter()
            .filter(|reg| !facts.printed.contains(*reg))
            .map(|reg| format!("print {reg}"));

        Ok(undeclared
            .chain(unprinted)
            .take(self.max_suggestions)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_printing_unprinted_registers() {
        let suggestions = HeuristicSuggester::default()
            .suggest("mov r1, 5\nmov r2, r1\nprint r1")
            .unwrap();
        assert_eq!(suggestions, vec!["print r2".to_string()]);
    }

    #[test]
    fn suggests_declaring_missing_functions_first() {
        let source = "declare function known\nadd acc, 1\nend\ncall known\ncall missing_fn\nloop for 2 call other";
        let suggestions = HeuristicSuggester::default().suggest(source).unwrap();
        assert_eq!(
            suggestions,
            vec![
                "declare function missing_fn".to_string(),
                "declare function other".to_string(),
                "print acc".to_string(),
            ]
        );
    }

    #[test]
    fn respects_the_cap() {
        let source = "mov a, 1\nmov b, 2\nmov c, 3";
        let suggestions = HeuristicSuggester::new(2).suggest(source).unwrap();
        assert_eq!(suggestions.len(), 2);
    }

    #[test]
    fn nothing_to_suggest_for_complete_programs() {
        let suggestions = HeuristicSuggester::default()
            .suggest("mov eax, 1; print eax")
            .unwrap();
        assert!(suggestions.is_empty());
        assert!(NoSuggestions.suggest("mov a, 1").unwrap().is_empty());
    }
}
