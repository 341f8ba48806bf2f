//! Execution monitor - timestamps executed instructions into a trace

use std::fmt::Write;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use crate::bytecode::Instruction;

/// One executed instruction and when it finished, relative to monitor start
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    /// Source line of the instruction
    pub line: u32,

    /// Instruction text
    pub instruction: String,

    /// Time since the monitor was created
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

/// Append-only execution trace for one execution context.
///
/// The monitor never touches VM state and has no failure modes.
#[derive(Debug, Clone)]
pub struct Monitor {
    start: Instant,
    entries: Vec<TraceEntry>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    /// Start a new trace; elapsed times are measured from now
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            entries: Vec::new(),
        }
    }

    /// Record that `instruction` has just executed
    pub fn log(&mut self, instruction: &Instruction) {
        self.entries.push(TraceEntry {
            line: instruction.line,
            instruction: instruction.text().to_string(),
            elapsed: self.start.elapsed(),
        });
    }

    /// The trace so far
    pub fn trace(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Consume the monitor, returning the trace
    pub fn into_trace(self) -> Vec<TraceEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the trace as one `Instruction: ..., Elapsed Time: ...` line per entry
    pub fn render_log(&self) -> String {
        render_log(&self.entries)
    }
}

/// Render any trace in the monitor log format
pub fn render_log(trace: &[TraceEntry]) -> String {
    let mut out = String::new();
    for entry in trace {
        writeln!(
            out,
            "Instruction: {}, Elapsed Time: {:.4} seconds",
            entry.instruction,
            entry.elapsed.as_secs_f64()
        )
        .unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Op, Statement, StatementKind};

    fn call(line: u32, name: &str) -> Instruction {
        Instruction::new(
            line,
            Statement::new(
                format!("call {name}"),
                StatementKind::Assembly(Op::Call(name.to_string())),
            ),
        )
    }

    #[test]
    fn log_appends_in_order_with_monotonic_times() {
        let mut monitor = Monitor::new();
        monitor.log(&call(1, "a"));
        monitor.log(&call(2, "b"));
        monitor.log(&call(3, "c"));

        let trace = monitor.trace();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].instruction, "call a");
        assert_eq!(trace[2].line, 3);
        assert!(trace.windows(2).all(|w| w[0].elapsed <= w[1].elapsed));
    }

    #[test]
    fn render_log_format() {
        let mut monitor = Monitor::new();
        monitor.log(&call(1, "f"));
        let rendered = monitor.render_log();
        assert!(rendered.starts_with("Instruction: call f, Elapsed Time: "));
        assert!(rendered.trim_end().ends_with("seconds"));
    }

    #[test]
    fn entries_serialize_elapsed_as_seconds() {
        let entry = TraceEntry {
            line: 7,
            instruction: "mov r1, 5".to_string(),
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["line"], 7);
        assert_eq!(json["elapsed_secs"], 1.5);
    }
}
