use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use teloxide::types::{ChatId, MessageId, UserId};
use tokio::sync::Mutex;

use crate::quiz::ledger::PointsLedger;
use crate::quiz::pool::QuestionPool;
use crate::quiz::{self, ChoiceLabel, QuizError, QUESTIONS_PER_QUIZ};

/// One user's in-progress quiz attempt.
#[derive(Debug, Clone)]
pub struct Session {
    /// Distinguishes this attempt from the user's earlier and later ones.
    pub id: u64,
    pub owner: UserId,
    /// Chat the quiz was started from; every reply goes there.
    pub owner_token: ChatId,
    pub questions: Vec<quiz::Question>,
    pub current_index: usize,
    pub correct_count: usize,
    /// Sent messages to delete once the session ends.
    pub pending_ui_handles: Vec<MessageId>,
}

impl Session {
    fn new(id: u64, owner: UserId, owner_token: ChatId, questions: Vec<quiz::Question>) -> Self {
        Self {
            id,
            owner,
            owner_token,
            questions,
            current_index: 0,
            correct_count: 0,
            pending_ui_handles: Vec::new(),
        }
    }

    pub fn current_question(&self) -> Option<&quiz::Question> {
        self.questions.get(self.current_index)
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.questions.len()
    }
}

/// Result of scoring one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub session_id: u64,
    pub correct: bool,
    pub expected: ChoiceLabel,
    /// Position of the question that was just answered.
    pub position: usize,
    pub complete: bool,
    pub owner_token: ChatId,
    pub next_question: Option<quiz::Question>,
}

/// What is left of a session once it has been ended and scored.
#[derive(Debug, Clone)]
pub struct FinishedQuiz {
    pub owner: UserId,
    pub owner_token: ChatId,
    pub correct_count: usize,
    pub award: u64,
    pub total_points: Option<u64>,
    pub pending_ui_handles: Vec<MessageId>,
}

/// In-flight sessions keyed by user.
///
/// Every operation takes the map lock for its whole read-modify-write and
/// releases it before any I/O, so concurrent presses and the timeout see a
/// single writer per user.
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
    next_id: AtomicU64,
    pool: Arc<QuestionPool>,
    ledger: Arc<PointsLedger>,
}

impl SessionStore {
    pub fn new(pool: Arc<QuestionPool>, ledger: Arc<PointsLedger>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            pool,
            ledger,
        }
    }

    pub async fn start(&self, user: UserId, owner_token: ChatId) -> Result<Session, QuizError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&user) {
            return Err(QuizError::AlreadyActive);
        }
        let questions = self.pool.sample(QUESTIONS_PER_QUIZ)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(id, user, owner_token, questions);
        sessions.insert(user, session.clone());
        Ok(session)
    }

    pub async fn get(&self, user: UserId) -> Result<Session, QuizError> {
        self.sessions
            .lock()
            .await
            .get(&user)
            .cloned()
            .ok_or(QuizError::NotFound)
    }

    pub async fn record_answer(
        &self,
        user: UserId,
        submitted: ChoiceLabel,
    ) -> Result<AnswerRecord, QuizError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&user).ok_or(QuizError::NotFound)?;
        Self::apply_answer(session, submitted)
    }

    /// Like [`record_answer`](Self::record_answer), but only when `position`
    /// is still the current question. A repeated press of an old button fails
    /// with [`QuizError::StaleAnswer`] and changes nothing.
    pub async fn record_answer_at(
        &self,
        user: UserId,
        position: usize,
        submitted: ChoiceLabel,
    ) -> Result<AnswerRecord, QuizError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&user).ok_or(QuizError::NotFound)?;
        if session.current_index != position {
            return Err(QuizError::StaleAnswer);
        }
        Self::apply_answer(session, submitted)
    }

    fn apply_answer(session: &mut Session, submitted: ChoiceLabel) -> Result<AnswerRecord, QuizError> {
        let position = session.current_index;
        let expected = session
            .current_question()
            .map(|q| q.answer)
            .ok_or(QuizError::NotFound)?;
        let correct = expected == submitted;
        if correct {
            session.correct_count += 1;
        }
        session.current_index += 1;
        Ok(AnswerRecord {
            session_id: session.id,
            correct,
            expected,
            position,
            complete: session.is_complete(),
            owner_token: session.owner_token,
            next_question: session.current_question().cloned(),
        })
    }

    pub async fn track_message(&self, user: UserId, handle: MessageId) -> Result<(), QuizError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&user).ok_or(QuizError::NotFound)?;
        session.pending_ui_handles.push(handle);
        Ok(())
    }

    /// Scores and removes the session. The second caller of a racing pair
    /// gets [`QuizError::NotFound`].
    pub async fn end(&self, user: UserId) -> Result<FinishedQuiz, QuizError> {
        let session = self.take(user, None).await?;
        self.score(user, session).await
    }

    /// [`end`](Self::end), restricted to the attempt `id`. A later attempt
    /// by the same user is left alone and the call fails with
    /// [`QuizError::NotFound`].
    pub async fn end_if(&self, user: UserId, id: u64) -> Result<FinishedQuiz, QuizError> {
        let session = self.take(user, Some(id)).await?;
        self.score(user, session).await
    }

    /// Removes attempt `id` without awarding anything.
    pub async fn discard(&self, user: UserId, id: u64) -> Result<Session, QuizError> {
        self.take(user, Some(id)).await
    }

    async fn take(&self, user: UserId, id: Option<u64>) -> Result<Session, QuizError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(&user) {
            Some(session) if id.map_or(true, |id| id == session.id) => {}
            _ => return Err(QuizError::NotFound),
        }
        sessions.remove(&user).ok_or(QuizError::NotFound)
    }

    async fn score(&self, user: UserId, session: Session) -> Result<FinishedQuiz, QuizError> {
        let award = quiz::award_for(session.correct_count);
        let total_points = match self.ledger.award(&user.0.to_string(), award).await {
            Ok(total) => Some(total),
            Err(e) => {
                log::error!("Failed to persist {} points for user {}: {}", award, user.0, e);
                None
            }
        };

        Ok(FinishedQuiz {
            owner: session.owner,
            owner_token: session.owner_token,
            correct_count: session.correct_count,
            award,
            total_points,
            pending_ui_handles: session.pending_ui_handles,
        })
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn numbered_pool(n: usize) -> QuestionPool {
        // Q<i> has answer A for even i and B for odd i
        QuestionPool::new(
            (0..n)
                .map(|i| {
                    let answer = if i % 2 == 0 { ChoiceLabel::A } else { ChoiceLabel::B };
                    quiz::Question::new(format!("Q{}", i), answer)
                })
                .collect(),
        )
    }

    async fn store_with(
        pool: QuestionPool,
    ) -> (SessionStore, Arc<PointsLedger>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(
            PointsLedger::load(dir.path().join("points.json"))
                .await
                .unwrap(),
        );
        let store = SessionStore::new(Arc::new(pool), ledger.clone());
        (store, ledger, dir)
    }

    fn wrong_label(right: ChoiceLabel) -> ChoiceLabel {
        if right == ChoiceLabel::D {
            ChoiceLabel::C
        } else {
            ChoiceLabel::D
        }
    }

    const USER: UserId = UserId(42);
    const CHAT: ChatId = ChatId(42);

    #[tokio::test]
    async fn second_start_is_rejected_and_first_session_kept() {
        let (store, _ledger, _dir) = store_with(numbered_pool(6)).await;
        store.start(USER, CHAT).await.unwrap();
        let first = store.get(USER).await.unwrap();
        let right = first.current_question().unwrap().answer;
        store.record_answer(USER, right).await.unwrap();

        let err = store.start(USER, CHAT).await.unwrap_err();
        assert!(matches!(err, QuizError::AlreadyActive));

        let after = store.get(USER).await.unwrap();
        assert_eq!(after.current_index, 1);
        assert_eq!(after.correct_count, 1);
        assert_eq!(after.questions, first.questions);
    }

    #[tokio::test]
    async fn start_fails_on_insufficient_pool() {
        let (store, _ledger, _dir) = store_with(numbered_pool(3)).await;
        assert!(matches!(
            store.start(USER, CHAT).await,
            Err(QuizError::InsufficientPool { .. })
        ));
        assert!(matches!(store.get(USER).await, Err(QuizError::NotFound)));
    }

    #[tokio::test]
    async fn correct_answer_increments_count_wrong_does_not() {
        let (store, _ledger, _dir) = store_with(numbered_pool(6)).await;
        let session = store.start(USER, CHAT).await.unwrap();

        let right = session.questions[0].answer;
        let record = store.record_answer(USER, right).await.unwrap();
        assert!(record.correct);
        assert_eq!(store.get(USER).await.unwrap().correct_count, 1);

        let right = session.questions[1].answer;
        let record = store.record_answer(USER, wrong_label(right)).await.unwrap();
        assert!(!record.correct);
        assert_eq!(record.expected, right);
        let after = store.get(USER).await.unwrap();
        assert_eq!(after.correct_count, 1);
        assert_eq!(after.current_index, 2);
    }

    #[tokio::test]
    async fn record_answer_without_session_is_not_found() {
        let (store, _ledger, _dir) = store_with(numbered_pool(6)).await;
        assert!(matches!(
            store.record_answer(USER, ChoiceLabel::A).await,
            Err(QuizError::NotFound)
        ));
    }

    #[tokio::test]
    async fn stale_position_is_rejected_without_mutation() {
        let (store, _ledger, _dir) = store_with(numbered_pool(6)).await;
        let session = store.start(USER, CHAT).await.unwrap();
        store
            .record_answer_at(USER, 0, session.questions[0].answer)
            .await
            .unwrap();

        let err = store
            .record_answer_at(USER, 0, session.questions[0].answer)
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::StaleAnswer));
        let after = store.get(USER).await.unwrap();
        assert_eq!(after.current_index, 1);
        assert_eq!(after.correct_count, 1);
    }

    #[tokio::test]
    async fn perfect_run_awards_ten() {
        let (store, ledger, _dir) = store_with(numbered_pool(6)).await;
        let session = store.start(USER, CHAT).await.unwrap();
        for (i, q) in session.questions.iter().enumerate() {
            let record = store.record_answer(USER, q.answer).await.unwrap();
            assert_eq!(record.complete, i == QUESTIONS_PER_QUIZ - 1);
        }

        let finished = store.end(USER).await.unwrap();
        assert_eq!(finished.correct_count, 5);
        assert_eq!(finished.award, 10);
        assert_eq!(ledger.points_of("42").await, 10);
        assert!(matches!(store.get(USER).await, Err(QuizError::NotFound)));
    }

    #[tokio::test]
    async fn mixed_run_awards_correct_count() {
        let (store, ledger, _dir) = store_with(numbered_pool(6)).await;
        let session = store.start(USER, CHAT).await.unwrap();
        for (i, q) in session.questions.iter().enumerate() {
            let label = if i < 3 { q.answer } else { wrong_label(q.answer) };
            store.record_answer(USER, label).await.unwrap();
        }

        let finished = store.end(USER).await.unwrap();
        assert_eq!(finished.correct_count, 3);
        assert_eq!(finished.award, 3);
        assert_eq!(finished.total_points, Some(3));
        assert_eq!(ledger.points_of("42").await, 3);
    }

    #[tokio::test]
    async fn end_is_idempotent() {
        let (store, ledger, _dir) = store_with(numbered_pool(6)).await;
        store.start(USER, CHAT).await.unwrap();
        store.end(USER).await.unwrap();
        assert!(matches!(store.end(USER).await, Err(QuizError::NotFound)));
        assert_eq!(ledger.points_of("42").await, 0);
    }

    #[tokio::test]
    async fn racing_ends_award_once() {
        let (store, ledger, _dir) = store_with(numbered_pool(6)).await;
        let store = Arc::new(store);
        let session = store.start(USER, CHAT).await.unwrap();
        for q in &session.questions {
            store.record_answer(USER, q.answer).await.unwrap();
        }

        let a = tokio::spawn({
            let store = store.clone();
            async move { store.end(USER).await.is_ok() }
        });
        let b = tokio::spawn({
            let store = store.clone();
            async move { store.end(USER).await.is_ok() }
        });
        let wins = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(wins.iter().filter(|w| **w).count(), 1);
        assert_eq!(ledger.points_of("42").await, 10);
    }

    #[tokio::test]
    async fn end_if_ignores_a_newer_attempt() {
        let (store, ledger, _dir) = store_with(numbered_pool(6)).await;
        let first = store.start(USER, CHAT).await.unwrap();
        store.end(USER).await.unwrap();
        let second = store.start(USER, CHAT).await.unwrap();
        assert_ne!(first.id, second.id);

        assert!(matches!(
            store.end_if(USER, first.id).await,
            Err(QuizError::NotFound)
        ));
        assert_eq!(store.get(USER).await.unwrap().id, second.id);

        store.end_if(USER, second.id).await.unwrap();
        assert!(matches!(store.get(USER).await, Err(QuizError::NotFound)));
        assert_eq!(ledger.points_of("42").await, 0);
    }

    #[tokio::test]
    async fn discard_removes_without_scoring() {
        let (store, ledger, _dir) = store_with(numbered_pool(6)).await;
        let session = store.start(USER, CHAT).await.unwrap();
        store.discard(USER, session.id).await.unwrap();

        assert!(matches!(store.get(USER).await, Err(QuizError::NotFound)));
        assert!(ledger.standings(10).await.is_empty());
        store.start(USER, CHAT).await.unwrap();
    }

    #[tokio::test]
    async fn tracked_handles_are_returned_on_end() {
        let (store, _ledger, _dir) = store_with(numbered_pool(6)).await;
        store.start(USER, CHAT).await.unwrap();
        store.track_message(USER, MessageId(10)).await.unwrap();
        store.track_message(USER, MessageId(11)).await.unwrap();

        let finished = store.end(USER).await.unwrap();
        assert_eq!(finished.pending_ui_handles, vec![MessageId(10), MessageId(11)]);
        assert!(matches!(
            store.track_message(USER, MessageId(12)).await,
            Err(QuizError::NotFound)
        ));
    }

    #[tokio::test]
    async fn sessions_are_per_user() {
        let (store, _ledger, _dir) = store_with(numbered_pool(6)).await;
        store.start(USER, CHAT).await.unwrap();
        store.start(UserId(7), ChatId(7)).await.unwrap();
        assert_eq!(store.active_sessions().await, 2);
        store.end(USER).await.unwrap();
        assert_eq!(store.active_sessions().await, 1);
        assert!(store.get(UserId(7)).await.is_ok());
    }
}
