//! Line-shape error predictor

use super::CollaboratorError;
use crate::config::PredictorConfig;

/// Lexical features of one source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFeatures {
    /// Length in characters
    pub length: usize,

    /// Number of space characters
    pub spaces: usize,

    /// Number of `=` characters
    pub equals: usize,
}

impl LineFeatures {
    pub fn extract(line: &str) -> Self {
        Self {
            length: line.chars().count(),
            spaces: line.matches(' ').count(),
            equals: line.matches('=').count(),
        }
    }
}

/// Advisory signal for one line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// The line looks malformed
    pub suspicious: bool,

    /// Raw model score; positive means suspicious
    pub score: f64,
}

impl Prediction {
    /// A prediction that never flags
    pub const CLEAN: Prediction = Prediction {
        suspicious: false,
        score: 0.0,
    };
}

/// Advisory predictor consulted once per non-blank source line
pub trait ErrorPredictor: Send {
    fn predict(&self, line: &str) -> Result<Prediction, CollaboratorError>;
}

/// Predictor that never flags anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPredictor;

impl ErrorPredictor for NoPredictor {
    fn predict(&self, _line: &str) -> Result<Prediction, CollaboratorError> {
        Ok(Prediction::CLEAN)
    }
}

/// Linear model over [`LineFeatures`]
#[derive(Debug, Clone)]
pub struct LinearPredictor {
    weights: PredictorConfig,
}

impl LinearPredictor {
    #[must_use]
    pub fn new(weights: PredictorConfig) -> Self {
        Self { weights }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn score(&self, features: LineFeatures) -> f64 {
        self.weights.length_weight * features.length as f64
            + self.weights.space_weight * features.spaces as f64
            + self.weights.equals_weight * features.equals as f64
            + self.weights.bias
    }
}

impl Default for LinearPredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl ErrorPredictor for LinearPredictor {
    fn predict(&self, line: &str) -> Result<Prediction, CollaboratorError> {
        let score = self.score(LineFeatures::extract(line));
        if !score.is_finite() {
            return Err(CollaboratorError::Predictor(format!(
                "non-finite score for line '{line}'"
            )));
        }
        Ok(Prediction {
            suspicious: score > 0.0,
            score,
        })
    }
}
