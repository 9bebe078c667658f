//! Texts sent to chats. All output is Telegram HTML.

use teloxide::utils::html::{bold, escape};

use crate::quiz::ranking::RankingEntry;
use crate::quiz::session::{AnswerRecord, FinishedQuiz};
use crate::quiz::{self, QuizError, PERFECT_RUN_POINTS, QUESTIONS_PER_QUIZ};

pub fn question(position: usize, question: &quiz::Question) -> String {
    format!(
        "{}\n\n{}",
        bold(&format!("Question {}/{}", position + 1, QUESTIONS_PER_QUIZ)),
        escape(&question.question)
    )
}

pub fn verdict(record: &AnswerRecord) -> String {
    if record.correct {
        "✅ Correct!".to_string()
    } else {
        format!("❌ Wrong (correct answer: {})", record.expected)
    }
}

pub fn summary(finished: &FinishedQuiz) -> String {
    let mut text = format!(
        "{}\nCorrect answers: {}/{}\nPoints earned: {}",
        bold("Quiz finished"),
        finished.correct_count,
        QUESTIONS_PER_QUIZ,
        finished.award
    );
    if let Some(total) = finished.total_points {
        text.push_str(&format!("\nTotal points: {}", total));
    }
    text
}

pub fn ranking(entries: &[RankingEntry]) -> String {
    if entries.is_empty() {
        return "No ranking data yet".to_string();
    }
    let lines = entries
        .iter()
        .map(|e| format!("{}. {}: {} points", e.rank, escape(&e.name), e.points))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\n{}", bold(&format!("Top {}", entries.len())), lines)
}

pub fn help() -> String {
    format!(
        "{}\n\n\
        /quiz - answer {} questions within the time limit. \
        1 point per correct answer, {} points for a perfect run\n\
        /ranking - show the top players\n\
        /help - show this help",
        bold("Commands"),
        QUESTIONS_PER_QUIZ,
        PERFECT_RUN_POINTS
    )
}

/// Short user-facing reason for a rejected start or button press.
pub fn rejection(error: &QuizError) -> &'static str {
    match error {
        QuizError::AlreadyActive => "You already have a quiz in progress",
        QuizError::NotFound | QuizError::StaleAnswer => "This quiz has already finished",
        QuizError::WrongOwner => "This quiz belongs to another user",
        QuizError::InsufficientPool { .. } => "Not enough questions to start a quiz",
        QuizError::UnknownLabel(_) => "This button is no longer valid",
        QuizError::Messenger(_) => "Something went wrong, try again later",
    }
}
