pub mod controller;
pub mod ledger;
pub mod pool;
pub mod ranking;
pub mod session;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Questions asked in one quiz session.
pub const QUESTIONS_PER_QUIZ: usize = 5;
/// Points awarded for a perfect run instead of one point per correct answer.
pub const PERFECT_RUN_POINTS: u64 = 10;

/// One of the four fixed answer buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ChoiceLabel {
    A,
    B,
    C,
    D,
}

impl ChoiceLabel {
    pub const ALL: [ChoiceLabel; 4] = [ChoiceLabel::A, ChoiceLabel::B, ChoiceLabel::C, ChoiceLabel::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChoiceLabel::A => "A",
            ChoiceLabel::B => "B",
            ChoiceLabel::C => "C",
            ChoiceLabel::D => "D",
        }
    }
}

impl fmt::Display for ChoiceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChoiceLabel {
    type Err = QuizError;

    // Case-sensitive on purpose: "a" is not a valid submission.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(ChoiceLabel::A),
            "B" => Ok(ChoiceLabel::B),
            "C" => Ok(ChoiceLabel::C),
            "D" => Ok(ChoiceLabel::D),
            other => Err(QuizError::UnknownLabel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub question: String,
    pub answer: ChoiceLabel,
}

impl Question {
    pub fn new(question: impl Into<String>, answer: ChoiceLabel) -> Self {
        Self {
            question: question.into(),
            answer,
        }
    }

    pub fn is_correct(&self, submitted: ChoiceLabel) -> bool {
        self.answer == submitted
    }
}

/// Points earned for `correct` right answers out of a full quiz.
pub fn award_for(correct: usize) -> u64 {
    if correct == QUESTIONS_PER_QUIZ {
        PERFECT_RUN_POINTS
    } else {
        correct as u64
    }
}

/// Failures scoped to a single user interaction. None of them is fatal.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("a quiz is already in progress for this user")]
    AlreadyActive,
    #[error("no quiz in progress for this user")]
    NotFound,
    #[error("this quiz belongs to another user")]
    WrongOwner,
    #[error("question pool has {available} questions, {required} are needed")]
    InsufficientPool { available: usize, required: usize },
    #[error("answer is for a question that is no longer current")]
    StaleAnswer,
    #[error("unknown answer label {0:?}")]
    UnknownLabel(String),
    #[error("chat platform request failed: {0}")]
    Messenger(String),
}
