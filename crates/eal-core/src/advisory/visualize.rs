//! Trace visualizers

use std::io::Write;

use super::CollaboratorError;
use crate::monitor::TraceEntry;

/// Pure consumer of an execution trace
pub trait Visualizer: Send {
    fn render(&mut self, trace: &[TraceEntry]) -> Result<(), CollaboratorError>;
}

/// Discards the trace
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVisualizer;

impl Visualizer for NullVisualizer {
    fn render(&mut self, _trace: &[TraceEntry]) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Renders the trace as an ASCII timeline, one row per instruction.
///
/// Bar length is proportional to the entry's elapsed time relative to the
/// last entry.
pub struct TextVisualizer<W: Write + Send> {
    out: W,
    width: usize,
}

impl<W: Write + Send> TextVisualizer<W> {
    pub fn new(out: W) -> Self {
        Self { out, width: 40 }
    }

    /// Set the maximum bar width in characters
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Visualizer for TextVisualizer<W> {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn render(&mut self, trace: &[TraceEntry]) -> Result<(), CollaboratorError> {
        writeln!(self.out, "line | timeline | elapsed | instruction")?;
        let total = trace
            .last()
            .map_or(0.0, |entry| entry.elapsed.as_secs_f64());

        for entry in trace {
            let secs = entry.elapsed.as_secs_f64();
            let filled = if total > 0.0 {
                ((secs / total) * self.width as f64).round() as usize
            } else {
                self.width
            };
            let bar = format!("{:<width$}", "#".repeat(filled.min(self.width)), width = self.width);
            writeln!(
                self.out,
                "{:>4} | {bar} | {:>9.3} ms | {}",
                entry.line,
                secs * 1000.0,
                entry.instruction
            )?;
        }
        self.out.flush()?;
        Ok(())
    }
}
