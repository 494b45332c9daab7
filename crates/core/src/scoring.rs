use crate::error::{AdvisorError, Result};
use crate::questionnaire::{AnswerSet, Question};
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_RISK_SCORE: f64 = 1.0;
pub const MAX_RISK_SCORE: f64 = 5.0;

/// Points awarded for each choice of one question.
#[derive(Debug, Clone, Copy)]
pub struct QuestionScores {
    pub question_id: &'static str,
    pub points: &'static [(&'static str, u8)],
}

impl QuestionScores {
    pub fn points_for(&self, choice: &str) -> Option<u8> {
        self.points
            .iter()
            .find(|(label, _)| *label == choice)
            .map(|(_, points)| *points)
    }
}

static SCORES: [QuestionScores; 10] = [
    QuestionScores {
        question_id: "age",
        points: &[("18-25", 5), ("26-33", 4), ("34-42", 3), ("43-50", 2), ("50+", 1)],
    },
    QuestionScores {
        question_id: "timeline",
        points: &[("1-5", 1), ("5-10", 2), ("10-20", 3), ("20-30", 4), ("30+", 5)],
    },
    QuestionScores {
        question_id: "volatility_comfort",
        points: &[
            ("Very Uncomfortable", 1),
            ("Uncomfortable", 2),
            ("Neutral", 3),
            ("Comfortable", 4),
            ("Very Comfortable", 5),
        ],
    },
    QuestionScores {
        question_id: "goal",
        points: &[
            ("Preservation of capital", 1),
            ("Income generation", 2),
            ("Growth", 4),
            ("Speculation", 5),
        ],
    },
    QuestionScores {
        question_id: "income_share",
        points: &[("<10%", 1), ("10-20%", 2), ("20-30%", 3), ("30-50%", 4), (">50%", 5)],
    },
    QuestionScores {
        question_id: "drawdown_reaction",
        points: &[
            ("Sell everything", 1),
            ("Sell some", 2),
            ("Hold", 3),
            ("Buy some", 4),
            ("Buy more", 5),
        ],
    },
    QuestionScores {
        question_id: "financial_situation",
        points: &[("Debt-heavy", 1), ("Stable", 3), ("Comfortable", 4), ("Wealthy", 5)],
    },
    QuestionScores {
        question_id: "experience",
        points: &[("None", 1), ("Little", 2), ("Some", 3), ("Experienced", 4)],
    },
    QuestionScores {
        question_id: "risk_tolerance",
        points: &[
            ("Very Conservative", 1),
            ("Conservative", 2),
            ("Moderate", 3),
            ("Aggressive", 4),
            ("Very Aggressive", 5),
        ],
    },
    QuestionScores {
        question_id: "net_worth",
        points: &[
            ("<10,000", 1),
            ("10,000-50,000", 2),
            ("50,000-200,000", 3),
            ("200,000-1,000,000", 4),
            (">1,000,000", 5),
        ],
    },
];

/// Mean of the per-question points. Within [1.0, 5.0] for any valid answer set.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(f64);

impl RiskScore {
    pub fn new(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(AdvisorError::InvalidScore(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Whole scores keep their decimal point: "3.0", not "3".
        write!(f, "{:?}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScoreTable {
    entries: &'static [QuestionScores],
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self { entries: &SCORES }
    }
}

impl ScoreTable {
    /// Checks the table covers exactly the declared choices of `questions`, in order.
    pub fn validate(&self, questions: &[Question]) -> anyhow::Result<()> {
        ensure!(
            self.entries.len() == questions.len(),
            "score table has {} entries for {} questions",
            self.entries.len(),
            questions.len()
        );

        for (entry, question) in self.entries.iter().zip(questions) {
            ensure!(
                entry.question_id == question.id,
                "score table order mismatch: expected {}, found {}",
                question.id,
                entry.question_id
            );

            for choice in question.choices {
                let points = entry
                    .points_for(choice)
                    .with_context(|| format!("no score for {:?} in question {}", choice, question.id))?;
                ensure!(
                    (1..=5).contains(&points),
                    "score {points} for {choice:?} in question {} is outside 1..=5",
                    question.id
                );
            }

            for (label, _) in entry.points {
                ensure!(
                    question.offers(label),
                    "score table lists undeclared choice {label:?} for question {}",
                    question.id
                );
            }
        }

        Ok(())
    }

    pub fn score(&self, answers: &AnswerSet) -> Result<RiskScore> {
        if answers.len() != self.entries.len() {
            return Err(AdvisorError::AnswerCount {
                expected: self.entries.len(),
                got: answers.len(),
            });
        }

        let mut total: u32 = 0;
        for (entry, answer) in self.entries.iter().zip(answers.as_slice()) {
            let points = entry
                .points_for(answer)
                .ok_or_else(|| AdvisorError::InvalidAnswer {
                    question: entry.question_id,
                    answer: answer.clone(),
                })?;
            total += u32::from(points);
        }

        RiskScore::new(f64::from(total) / answers.len() as f64)
    }

    /// Scores a session's answers, failing before any lookup when none were stored.
    pub fn score_session(&self, answers: Option<&AnswerSet>) -> Result<RiskScore> {
        let answers = answers.ok_or(AdvisorError::QuestionnaireIncomplete)?;
        self.score(answers)
    }
}
