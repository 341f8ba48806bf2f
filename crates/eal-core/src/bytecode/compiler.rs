//! Source to instruction compiler
//!
//! Compilation is line oriented and never aborts: a statement that cannot be
//! classified produces a [`CompileDiagnostic`] and no instruction, and the
//! remaining statements compile as usual. The only hard failure is an error
//! from the advisory predictor, which is reported to the caller.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::error::{CompileDiagnostic, CompileErrorKind};
use super::grammar::{
    classify, decode, function_declaration, is_function_name, line_statements,
    variable_declaration, LineClass,
};
use super::instruction::Instruction;
use crate::advisory::{CollaboratorError, ErrorPredictor, NoPredictor};

/// Keyword that closes a function body
const END_KEYWORD: &str = "end";

/// A compiled program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    /// Top-level instructions, in execution order
    pub code: Vec<Instruction>,

    /// Function table populated by `declare function` blocks
    pub functions: BTreeMap<String, Vec<Instruction>>,

    /// Declarations seen, in source order
    pub declarations: Vec<Declaration>,

    /// Per-line compile diagnostics
    pub diagnostics: Vec<CompileDiagnostic>,

    /// Lines the advisory predictor flagged
    pub advisories: Vec<Advisory>,
}

impl Program {
    /// Number of top-level instructions
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Look up a function body
    pub fn function(&self, name: &str) -> Option<&[Instruction]> {
        self.functions.get(name).map(Vec::as_slice)
    }
}

/// A declaration note. Declarations never produce instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// `declare <type> <name> [= <value>]`
    Variable {
        line: u32,
        ty: String,
        name: String,
        init: Option<String>,
    },

    /// `declare function <name>` ... `end`
    Function { line: u32, name: String },

    /// Any other `declare ...` text
    Other { line: u32, text: String },
}

impl Declaration {
    pub fn line(&self) -> u32 {
        match self {
            Declaration::Variable { line, .. }
            | Declaration::Function { line, .. }
            | Declaration::Other { line, .. } => *line,
        }
    }
}

/// A line the predictor considered suspicious
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advisory {
    pub line: u32,
    pub score: f64,
}

/// A function body being collected
struct FunctionBuilder {
    name: String,
    line: u32,
    body: Vec<Instruction>,

    /// False when the name was rejected; the body is still consumed
    valid: bool,
}

/// Line-oriented compiler
pub struct Compiler<'p> {
    predictor: &'p dyn ErrorPredictor,
    program: Program,
    function: Option<FunctionBuilder>,
}

impl Default for Compiler<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler<'static> {
    /// Create a compiler without an advisory predictor
    #[must_use]
    pub fn new() -> Self {
        Compiler::with_predictor(&NoPredictor)
    }
}

impl<'p> Compiler<'p> {
    /// Create a compiler that consults `predictor` once per non-blank line
    #[must_use]
    pub fn with_predictor(predictor: &'p dyn ErrorPredictor) -> Self {
        Self {
            predictor,
            program: Program::default(),
            function: None,
        }
    }

    /// Compile source text into a program
    pub fn compile(mut self, source: &str) -> Result<Program, CollaboratorError> {
        for (index, raw) in source.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = u32::try_from(index + 1).unwrap_or(u32::MAX);

            let prediction = self.predictor.predict(line)?;
            if prediction.suspicious {
                debug!(line = line_no, score = prediction.score, "potential error detected");
                self.program.advisories.push(Advisory {
                    line: line_no,
                    score: prediction.score,
                });
            }

            let unrecognized: Vec<&str> = line_statements(line)
                .filter(|stmt| !self.compile_statement(line_no, stmt))
                .collect();
            if !unrecognized.is_empty() {
                self.diagnose(
                    CompileDiagnostic::new(
                        CompileErrorKind::UnrecognizedLine(unrecognized.join("; ")),
                        line_no,
                    )
                    .with_hint("expected a declaration, '<mnemonic> <operands>', 'if ... then ...' or 'print ...'"),
                );
            }
        }

        if let Some(open) = self.function.take() {
            self.diagnose(
                CompileDiagnostic::new(CompileErrorKind::UnterminatedFunction(open.name), open.line)
                    .with_hint("close the function body with 'end'"),
            );
        }

        info!(
            instructions = self.program.code.len(),
            functions = self.program.functions.len(),
            diagnostics = self.program.diagnostics.len(),
            "compiled program"
        );
        Ok(self.program)
    }

    /// Compile one statement; false when it matches no statement form
    fn compile_statement(&mut self, line: u32, text: &str) -> bool {
        if let Some(name) = function_declaration(text) {
            self.open_function(line, name);
            return true;
        }
        if text == END_KEYWORD {
            self.close_function(line);
            return true;
        }

        match classify(text) {
            LineClass::Declaration => self.declare(line, text),
            LineClass::Unrecognized => return false,
            LineClass::Assembly | LineClass::Conditional | LineClass::Print => {
                if let Some(stmt) = decode(text) {
                    self.emit(Instruction::new(line, stmt));
                }
            }
        }
        true
    }

    fn emit(&mut self, instruction: Instruction) {
        match &mut self.function {
            Some(function) => function.body.push(instruction),
            None => self.program.code.push(instruction),
        }
    }

    fn declare(&mut self, line: u32, text: &str) {
        info!(line, "compiling declaration: {text}");
        let declaration = match variable_declaration(text) {
            Some(decl) => Declaration::Variable {
                line,
                ty: decl.ty.to_string(),
                name: decl.name.to_string(),
                init: decl.init.map(str::to_string),
            },
            None => Declaration::Other {
                line,
                text: text.to_string(),
            },
        };
        self.program.declarations.push(declaration);
    }

    fn open_function(&mut self, line: u32, name: &str) {
        if let Some(open) = &self.function {
            let diag = CompileDiagnostic::new(CompileErrorKind::NestedFunction(name.to_string()), line)
                .with_hint(format!("close '{}' with 'end' first", open.name));
            self.diagnose(diag);
            return;
        }

        let valid = is_function_name(name);
        if !valid {
            self.diagnose(CompileDiagnostic::new(
                CompileErrorKind::InvalidFunctionName(name.to_string()),
                line,
            ));
        }
        info!(line, "compiling declaration: function {name}");
        self.function = Some(FunctionBuilder {
            name: name.to_string(),
            line,
            body: Vec::new(),
            valid,
        });
    }

    fn close_function(&mut self, line: u32) {
        let Some(function) = self.function.take() else {
            self.diagnose(CompileDiagnostic::new(CompileErrorKind::StrayEnd, line));
            return;
        };
        if !function.valid {
            return;
        }

        if self.program.functions.contains_key(&function.name) {
            warn!(line = function.line, "redefining function '{}'", function.name);
        }
        self.program.declarations.push(Declaration::Function {
            line: function.line,
            name: function.name.clone(),
        });
        self.program.functions.insert(function.name, function.body);
    }

    fn diagnose(&mut self, diagnostic: CompileDiagnostic) {
        warn!("{diagnostic}");
        self.program.diagnostics.push(diagnostic);
    }
}
