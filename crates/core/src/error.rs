use thiserror::Error;

/// Failures a single advisor request can end in. None of them touch session state.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("questionnaire incomplete: answers are required before a portfolio can be built")]
    QuestionnaireIncomplete,

    #[error("expected {expected} answers, got {got}")]
    AnswerCount { expected: usize, got: usize },

    #[error("answer {answer:?} is not a valid choice for question {question:?}")]
    InvalidAnswer { question: &'static str, answer: String },

    #[error("risk score must be finite (got {0})")]
    InvalidScore(f64),

    #[error("market data unavailable: {0:#}")]
    MarketData(anyhow::Error),

    #[error("infeasible optimization: {0}")]
    Infeasible(String),

    #[error("optimization failed: {0}")]
    Optimization(String),
}

impl AdvisorError {
    /// True for failures caused by the caller's input. Infeasible solves are not: they follow
    /// from market data and the fixed return targets.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::QuestionnaireIncomplete
                | Self::AnswerCount { .. }
                | Self::InvalidAnswer { .. }
                | Self::InvalidScore(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AdvisorError>;
