//! Advisory collaborators consulted around compilation and execution
//!
//! - `ErrorPredictor`: flags source lines that look malformed
//! - `SuggestionEngine`: proposes follow-up source lines
//! - `Visualizer`: renders an execution trace
//!
//! None of them can change what is compiled or executed. A collaborator
//! failure is reported to the request boundary.

mod predictor;
mod suggest;
mod visualize;

pub use predictor::{ErrorPredictor, LineFeatures, LinearPredictor, NoPredictor, Prediction};
pub use suggest::{HeuristicSuggester, NoSuggestions, SuggestionEngine};
pub use visualize::{NullVisualizer, TextVisualizer, Visualizer};

use thiserror::Error;

/// Failure of an advisory collaborator
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("error predictor failed: {0}")]
    Predictor(String),

    #[error("suggestion engine failed: {0}")]
    Suggestion(String),

    #[error("visualizer failed: {0}")]
    Visualizer(#[from] std::io::Error),
}
