//! Request pipeline: compile, optimize, execute, then hand the trace to the
//! collaborators
//!
//! Every call to [`Executor::execute_code`] builds a fresh compiler, optimizer,
//! machine and monitor. Nothing but configuration and collaborators survives
//! between requests.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;
use tracing::{info, warn};

use crate::advisory::{
    CollaboratorError, ErrorPredictor, HeuristicSuggester, LinearPredictor, NoPredictor,
    NoSuggestions, NullVisualizer, SuggestionEngine, Visualizer,
};
use crate::bytecode::{Advisory, CompileDiagnostic, Compiler, Declaration, Optimizer};
use crate::config::EngineConfig;
use crate::monitor::{Monitor, TraceEntry};
use crate::vm::{ExecutionError, Machine, MemoryCell, RunOutcome};

/// Overall request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Everything one request produced
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Compiled top-level instruction count
    pub instructions: usize,

    pub declarations: Vec<Declaration>,
    pub advisories: Vec<Advisory>,
    pub diagnostics: Vec<CompileDiagnostic>,
    pub errors: Vec<ExecutionError>,

    /// Written registers, sorted by name
    pub registers: BTreeMap<String, i64>,

    /// Written memory cells
    pub memory: Vec<MemoryCell>,

    /// Stack contents, bottom first
    pub stack: Vec<i64>,

    /// Lines produced by `print`
    pub output: Vec<String>,

    /// `mov: dest = value` entries
    pub journal: Vec<String>,

    pub trace: Vec<TraceEntry>,
    pub suggestions: Vec<String>,
    pub outcome: RunOutcome,
}

impl ExecutionReport {
    /// Error only when the run was halted; local failures are diagnostics
    pub fn status(&self) -> Status {
        if self.outcome.halted {
            Status::Error
        } else {
            Status::Success
        }
    }

    /// Compile diagnostics plus execution errors
    pub fn diagnostic_count(&self) -> usize {
        self.diagnostics.len() + self.errors.len()
    }

    /// Diagnostic messages in report order: compile first, then execution
    pub fn diagnostic_messages(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .map(|d| format!("compile error: {d}"))
            .chain(self.errors.iter().map(|e| format!("execution error: {e}")))
            .collect()
    }

    /// Human-readable summary: headline, printed lines, diagnostics
    pub fn summary(&self) -> String {
        let mut out = match self.diagnostic_count() {
            0 => "Code executed successfully".to_string(),
            n => format!("Code executed with {n} diagnostic(s)"),
        };
        for line in &self.output {
            write!(out, "\n{line}").unwrap();
        }
        for message in self.diagnostic_messages() {
            write!(out, "\n{message}").unwrap();
        }
        out
    }

    /// Map the report to the boundary response
    pub fn to_response(&self, include_trace: bool) -> Response {
        Response {
            status: self.status(),
            output: self.summary(),
            suggestions: self.suggestions.clone(),
            trace: include_trace.then(|| self.trace.clone()),
            diagnostics: self.diagnostic_messages(),
        }
    }
}

/// The boundary response
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub status: Status,
    pub output: String,
    pub suggestions: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEntry>>,

    pub diagnostics: Vec<String>,
}

impl Response {
    /// A failed request
    pub fn failure(err: &CollaboratorError) -> Self {
        Self {
            status: Status::Error,
            output: format!("Error: {err}"),
            suggestions: Vec::new(),
            trace: None,
            diagnostics: Vec::new(),
        }
    }
}

/// Runs submitted source through the full pipeline
pub struct Executor {
    config: EngineConfig,
    predictor: Box<dyn ErrorPredictor>,
    suggester: Box<dyn SuggestionEngine>,
    visualizer: Box<dyn Visualizer>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::from_config(EngineConfig::default())
    }
}

impl Executor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an executor with the default collaborators the config enables
    #[must_use]
    pub fn from_config(config: EngineConfig) -> Self {
        let predictor: Box<dyn ErrorPredictor> = if config.predictor.enabled {
            Box::new(LinearPredictor::new(config.predictor.clone()))
        } else {
            Box::new(NoPredictor)
        };
        let suggester: Box<dyn SuggestionEngine> = if config.suggestions.enabled {
            Box::new(HeuristicSuggester::new(config.suggestions.max_suggestions))
        } else {
            Box::new(NoSuggestions)
        };
        Self {
            config,
            predictor,
            suggester,
            visualizer: Box::new(NullVisualizer),
        }
    }

    #[must_use]
    pub fn with_predictor(mut self, predictor: Box<dyn ErrorPredictor>) -> Self {
        self.predictor = predictor;
        self
    }

    #[must_use]
    pub fn with_suggester(mut self, suggester: Box<dyn SuggestionEngine>) -> Self {
        self.suggester = suggester;
        self
    }

    #[must_use]
    pub fn with_visualizer(mut self, visualizer: Box<dyn Visualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compile and execute `source` with fresh state
    pub fn execute_code(&mut self, source: &str) -> Result<ExecutionReport, CollaboratorError> {
        let program = Compiler::with_predictor(self.predictor.as_ref()).compile(source)?;
        let program = Optimizer::new().optimize_program(program);

        let mut machine = Machine::new(self.config.limits.clone());
        machine.load(&program);
        let mut monitor = Monitor::new();
        let outcome = machine.run(&program.code, &mut monitor);
        if outcome.halted {
            warn!(steps = outcome.steps, "execution halted by step budget");
        }

        self.visualizer.render(monitor.trace())?;
        let suggestions = self.suggester.suggest(source)?;

        let report = ExecutionReport {
            instructions: program.code.len(),
            declarations: program.declarations,
            advisories: program.advisories,
            diagnostics: program.diagnostics,
            errors: machine.errors().to_vec(),
            registers: machine.registers().snapshot(),
            memory: machine.memory().snapshot(),
            stack: machine.stack().to_vec(),
            output: machine.output().to_vec(),
            journal: machine.journal().to_vec(),
            trace: monitor.into_trace(),
            suggestions,
            outcome,
        };
        info!(
            instructions = report.instructions,
            diagnostics = report.diagnostic_count(),
            "request complete"
        );
        Ok(report)
    }

    /// Execute `source` and map the result to the boundary response
    pub fn respond(&mut self, source: &str) -> Response {
        match self.execute_code(source) {
            Ok(report) => report.to_response(self.config.trace.include_in_response),
            Err(err) => {
                warn!("request failed: {err}");
                Response::failure(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::Prediction;
    use crate::config::Limits;

    struct FailingSuggester;

    impl SuggestionEngine for FailingSuggester {
        fn suggest(&self, _source: &str) -> Result<Vec<String>, CollaboratorError> {
            Err(CollaboratorError::Suggestion("offline".to_string()))
        }
    }

    struct Suspicious;

    impl ErrorPredictor for Suspicious {
        fn predict(&self, _line: &str) -> Result<Prediction, CollaboratorError> {
            Ok(Prediction {
                suspicious: true,
                score: 0.9,
            })
        }
    }

    #[test]
    fn end_to_end_success() {
        let mut executor = Executor::new();
        let report = executor
            .execute_code("declare int x = 10\nmov eax, x\nprint eax")
            .unwrap();

        assert_eq!(report.instructions, 2);
        assert_eq!(report.declarations.len(), 1);
        assert!(report.errors.is_empty());
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.status(), Status::Success);
        assert_eq!(report.output, ["0"]);
        assert_eq!(report.trace.len(), 2);
        assert!(report.summary().starts_with("Code executed successfully"));
    }

    #[test]
    fn local_failures_keep_success_status() {
        let mut executor = Executor::new();
        let response = executor.respond("call missing_fn\n???\nmov r1, 1");

        assert_eq!(response.status, Status::Success);
        assert!(response.output.starts_with("Code executed with 2 diagnostic(s)"));
        assert_eq!(response.diagnostics.len(), 2);
        assert!(response.diagnostics[0].starts_with("compile error: line 2"));
        assert!(response.diagnostics[1].contains("missing_fn"));
    }

    #[test]
    fn budget_exhaustion_is_an_error_response() {
        let config = EngineConfig {
            limits: Limits {
                max_steps: 50,
                ..Limits::default()
            },
            ..EngineConfig::default()
        };
        let response = Executor::from_config(config).respond("loop while 1 add r1, 1");
        assert_eq!(response.status, Status::Error);
        assert!(response.output.contains("budget"));
    }

    #[test]
    fn collaborator_failure_fails_the_request() {
        let mut executor = Executor::new().with_suggester(Box::new(FailingSuggester));
        let response = executor.respond("mov r1, 1");
        assert_eq!(response.status, Status::Error);
        assert!(response.output.contains("offline"));
        assert!(response.trace.is_none());
    }

    #[test]
    fn predictor_flags_are_advisories_only() {
        let source = "mov r1, 5\nmov r2, r1";
        let plain = Executor::new().execute_code(source).unwrap();
        let flagged = Executor::new()
            .with_predictor(Box::new(Suspicious))
            .execute_code(source)
            .unwrap();

        assert_eq!(flagged.advisories.len(), 2);
        assert_eq!(flagged.registers, plain.registers);
        assert_eq!(flagged.registers["r2"], 5);
    }

    #[test]
    fn requests_do_not_share_state() {
        let mut executor = Executor::new();
        executor
            .execute_code("declare function f\nmov r9, 1\nend\nmov r1, 42\nmov arr[0], 1")
            .unwrap();
        let second = executor.execute_code("call f\nprint r1").unwrap();

        assert_eq!(second.output, ["0"]);
        assert_eq!(second.errors.len(), 1);
        assert!(second.memory.is_empty());
        assert!(!second.registers.contains_key("r9"));
    }

    #[test]
    fn response_serializes_to_the_boundary_shape() {
        let response = Executor::new().respond("mov r1, 2\nprint r1");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["output"], "Code executed successfully\n2");
        assert!(json["suggestions"].is_array());
        assert_eq!(json["trace"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn trace_can_be_left_out() {
        let mut config = EngineConfig::default();
        config.trace.include_in_response = false;
        let response = Executor::from_config(config).respond("mov r1, 2");
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("trace").is_none());
    }
}
