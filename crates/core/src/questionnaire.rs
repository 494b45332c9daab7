use crate::error::{AdvisorError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Question {
    pub id: &'static str,
    pub prompt: &'static str,
    pub choices: &'static [&'static str],
}

impl Question {
    pub fn offers(&self, choice: &str) -> bool {
        self.choices.contains(&choice)
    }
}

static QUESTIONS: [Question; 10] = [
    Question {
        id: "age",
        prompt: "What is your age?",
        choices: &["18-25", "26-33", "34-42", "43-50", "50+"],
    },
    Question {
        id: "timeline",
        prompt: "What is your investment timeline (in years)?",
        choices: &["1-5", "5-10", "10-20", "20-30", "30+"],
    },
    Question {
        id: "volatility_comfort",
        prompt: "How comfortable are you with market volatility?",
        choices: &[
            "Very Uncomfortable",
            "Uncomfortable",
            "Neutral",
            "Comfortable",
            "Very Comfortable",
        ],
    },
    Question {
        id: "goal",
        prompt: "What is your primary investment goal?",
        choices: &[
            "Preservation of capital",
            "Income generation",
            "Growth",
            "Speculation",
        ],
    },
    Question {
        id: "income_share",
        prompt: "How much of your income are you willing to invest?",
        choices: &["<10%", "10-20%", "20-30%", "30-50%", ">50%"],
    },
    Question {
        id: "drawdown_reaction",
        prompt: "How would you react to a 20% drop in your portfolio?",
        choices: &["Sell everything", "Sell some", "Hold", "Buy some", "Buy more"],
    },
    Question {
        id: "financial_situation",
        prompt: "What is your current financial situation?",
        choices: &["Debt-heavy", "Stable", "Comfortable", "Wealthy"],
    },
    Question {
        id: "experience",
        prompt: "How much investment experience do you have?",
        choices: &["None", "Little", "Some", "Experienced"],
    },
    Question {
        id: "risk_tolerance",
        prompt: "What is your risk tolerance?",
        choices: &[
            "Very Conservative",
            "Conservative",
            "Moderate",
            "Aggressive",
            "Very Aggressive",
        ],
    },
    Question {
        id: "net_worth",
        prompt: "What is your current net worth?",
        choices: &[
            "<10,000",
            "10,000-50,000",
            "50,000-200,000",
            "200,000-1,000,000",
            ">1,000,000",
        ],
    },
];

/// The fixed, ordered questionnaire.
pub fn questions() -> &'static [Question] {
    &QUESTIONS
}

/// One selected choice per question, in question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct AnswerSet(Vec<String>);

impl AnswerSet {
    pub fn collect<I, S>(answers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let answers: Vec<String> = answers.into_iter().map(Into::into).collect();
        let questions = questions();

        if answers.len() != questions.len() {
            return Err(AdvisorError::AnswerCount {
                expected: questions.len(),
                got: answers.len(),
            });
        }

        for (question, answer) in questions.iter().zip(&answers) {
            if !question.offers(answer) {
                return Err(AdvisorError::InvalidAnswer {
                    question: question.id,
                    answer: answer.clone(),
                });
            }
        }

        Ok(Self(answers))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pairs each answer with the question it was given for.
    pub fn iter(&self) -> impl Iterator<Item = (&'static Question, &str)> + '_ {
        questions().iter().zip(self.0.iter().map(String::as_str))
    }
}

impl TryFrom<Vec<String>> for AnswerSet {
    type Error = AdvisorError;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::collect(value)
    }
}

impl From<AnswerSet> for Vec<String> {
    fn from(value: AnswerSet) -> Self {
        value.0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn first_choices() -> Vec<&'static str> {
        questions().iter().map(|q| q.choices[0]).collect()
    }

    pub(crate) fn last_choices() -> Vec<&'static str> {
        questions()
            .iter()
            .map(|q| q.choices[q.choices.len() - 1])
            .collect()
    }

    #[test]
    fn questionnaire_has_ten_questions_with_unique_ids() {
        let qs = questions();
        assert_eq!(qs.len(), 10);
        let mut ids: Vec<_> = qs.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 10);
        assert!(qs.iter().all(|q| q.choices.len() >= 4));
    }

    #[test]
    fn collect_accepts_one_offered_choice_per_question() {
        let answers = AnswerSet::collect(first_choices()).unwrap();
        assert_eq!(answers.len(), 10);
        assert_eq!(answers.as_slice()[0], "18-25");
    }

    #[test]
    fn collect_rejects_wrong_count() {
        let err = AnswerSet::collect(vec!["18-25"]).unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::AnswerCount {
                expected: 10,
                got: 1
            }
        ));
    }

    #[test]
    fn collect_rejects_choice_from_another_question() {
        let mut answers = first_choices();
        // "Neutral" belongs to the volatility question, not the age question.
        answers[0] = "Neutral";
        let err = AnswerSet::collect(answers).unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::InvalidAnswer { question: "age", .. }
        ));
    }

    #[test]
    fn deserialize_validates_answers() {
        let ok = json!(last_choices());
        let parsed: AnswerSet = serde_json::from_value(ok).unwrap();
        assert_eq!(parsed.as_slice()[9], ">1,000,000");

        let bad = json!(["18-25", "free text"]);
        assert!(serde_json::from_value::<AnswerSet>(bad).is_err());
    }
}
