use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId, UserId};

use crate::quiz::session::{AnswerRecord, FinishedQuiz, SessionStore};
use crate::quiz::{self, ChoiceLabel, QuizError};

pub type MessengerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Outbound side of a quiz: everything the controller needs from the chat
/// platform.
#[async_trait]
pub trait QuizMessenger: Send + Sync + 'static {
    /// Sends question `position` with its answer buttons.
    async fn send_question(
        &self,
        chat: ChatId,
        owner: UserId,
        position: usize,
        question: &quiz::Question,
    ) -> MessengerResult<MessageId>;

    async fn send_verdict(&self, chat: ChatId, record: &AnswerRecord) -> MessengerResult<MessageId>;

    async fn send_summary(&self, chat: ChatId, finished: &FinishedQuiz) -> MessengerResult<()>;

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> MessengerResult<()>;
}

/// Drives sessions from start to their single end, whether that end comes
/// from the last answer or from the session timeout.
pub struct QuizController<M> {
    store: SessionStore,
    messenger: M,
    timeout: Duration,
}

impl<M: QuizMessenger> QuizController<M> {
    pub fn new(store: SessionStore, messenger: M, timeout: Duration) -> Self {
        Self {
            store,
            messenger,
            timeout,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Opens a session, arms its timeout and sends the first question.
    pub async fn start(self: &Arc<Self>, user: UserId, chat: ChatId) -> Result<(), QuizError> {
        let session = self.store.start(user, chat).await?;
        log::info!("User {} started a quiz in chat {}", user.0, chat.0);

        self.schedule_timeout(user, session.id);

        let first = session.current_question().ok_or(QuizError::NotFound)?;
        if let Err(e) = self.emit_question(user, chat, 0, first).await {
            // Nothing reached the user, so the attempt does not count
            if let Ok(dropped) = self.store.discard(user, session.id).await {
                self.cleanup(chat, &dropped.pending_ui_handles).await;
            }
            return Err(e);
        }
        Ok(())
    }

    fn schedule_timeout(self: &Arc<Self>, user: UserId, session_id: u64) {
        let controller = Arc::clone(self);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            controller.expire(user, session_id).await;
        });
    }

    /// Ends attempt `session_id` if it is still open when its timer fires.
    pub async fn expire(&self, user: UserId, session_id: u64) {
        let ended = match self.store.end_if(user, session_id).await {
            Ok(finished) => Ok(self.close(finished).await),
            Err(e) => Err(e),
        };
        match ended {
            Ok(finished) => log::info!(
                "Quiz of user {} timed out with {} correct",
                user.0,
                finished.correct_count
            ),
            Err(QuizError::NotFound) => {}
            Err(e) => log::warn!("Failed to expire quiz of user {}: {}", user.0, e),
        }
    }

    /// Scores a button press made by `actor` on `owner`'s question `position`.
    pub async fn answer(
        &self,
        actor: UserId,
        owner: UserId,
        position: usize,
        label: ChoiceLabel,
    ) -> Result<AnswerRecord, QuizError> {
        if actor != owner {
            return Err(QuizError::WrongOwner);
        }
        let record = self.store.record_answer_at(owner, position, label).await?;
        let chat = record.owner_token;

        match self.messenger.send_verdict(chat, &record).await {
            Ok(handle) => self.keep_or_discard(owner, chat, handle).await,
            Err(e) => log::warn!("Failed to send verdict to chat {}: {}", chat.0, e),
        }

        match &record.next_question {
            Some(next) if !record.complete => {
                if let Err(e) = self.emit_question(owner, chat, position + 1, next).await {
                    // Without the next question on screen the quiz can't go on
                    if let Ok(finished) = self.store.end_if(owner, record.session_id).await {
                        self.close(finished).await;
                    }
                    return Err(e);
                }
            }
            _ => match self.store.end_if(owner, record.session_id).await {
                Ok(finished) => {
                    let finished = self.close(finished).await;
                    log::info!(
                        "User {} finished a quiz with {} correct",
                        owner.0,
                        finished.correct_count
                    );
                }
                // the timeout got there first
                Err(QuizError::NotFound) => {}
                Err(e) => return Err(e),
            },
        }
        Ok(record)
    }

    /// Scores and closes the session, clears its messages and reports.
    pub async fn finish(&self, user: UserId) -> Result<FinishedQuiz, QuizError> {
        let finished = self.store.end(user).await?;
        Ok(self.close(finished).await)
    }

    async fn close(&self, finished: FinishedQuiz) -> FinishedQuiz {
        let chat = finished.owner_token;

        self.cleanup(chat, &finished.pending_ui_handles).await;

        if let Err(e) = self.messenger.send_summary(chat, &finished).await {
            log::warn!("Failed to send quiz summary to chat {}: {}", chat.0, e);
        }
        finished
    }

    async fn emit_question(
        &self,
        user: UserId,
        chat: ChatId,
        position: usize,
        question: &quiz::Question,
    ) -> Result<(), QuizError> {
        let handle = self
            .messenger
            .send_question(chat, user, position, question)
            .await
            .map_err(|e| QuizError::Messenger(e.to_string()))?;
        self.keep_or_discard(user, chat, handle).await;
        Ok(())
    }

    async fn keep_or_discard(&self, user: UserId, chat: ChatId, handle: MessageId) {
        if let Err(QuizError::NotFound) = self.store.track_message(user, handle).await {
            // session ended while the message was in flight
            self.cleanup(chat, &[handle]).await;
        }
    }

    async fn cleanup(&self, chat: ChatId, handles: &[MessageId]) {
        for handle in handles {
            if let Err(e) = self.messenger.delete_message(chat, *handle).await {
                log::debug!("Could not delete message {} in chat {}: {}", handle.0, chat.0, e);
            }
        }
    }
}
