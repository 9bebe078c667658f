use std::fs::File;
use std::io::Read;
use std::path::Path;

use rand::seq::SliceRandom;
use thiserror::Error;

use crate::quiz::{self, QuizError, QUESTIONS_PER_QUIZ};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to read question file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse question file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(serde::Deserialize)]
struct PoolFile {
    questions: Vec<quiz::Question>,
}

/// Static question records, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct QuestionPool {
    questions: Vec<quiz::Question>,
}

impl QuestionPool {
    pub fn new(questions: Vec<quiz::Question>) -> Self {
        Self { questions }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, PoolError> {
        let file: PoolFile = serde_json::from_reader(reader)?;
        let pool = Self::new(file.questions);
        if pool.len() < QUESTIONS_PER_QUIZ {
            log::warn!(
                "Question pool has only {} questions, every quiz needs {}",
                pool.len(),
                QUESTIONS_PER_QUIZ
            );
        }
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Draws `amount` distinct questions uniformly at random.
    pub fn sample(&self, amount: usize) -> Result<Vec<quiz::Question>, QuizError> {
        if self.questions.len() < amount {
            return Err(QuizError::InsufficientPool {
                available: self.questions.len(),
                required: amount,
            });
        }
        let mut rng = rand::thread_rng();
        Ok(self
            .questions
            .choose_multiple(&mut rng, amount)
            .cloned()
            .collect())
    }
}
