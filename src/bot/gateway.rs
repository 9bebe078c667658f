use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, UserId};

use crate::bot::callback::AnswerCallback;
use crate::bot::render;
use crate::quiz::controller::{MessengerResult, QuizMessenger};
use crate::quiz::ranking::DisplayNameLookup;
use crate::quiz::session::{AnswerRecord, FinishedQuiz};
use crate::quiz::{self, ChoiceLabel};

/// Telegram side of the quiz: sends, deletes and looks up users through the
/// Bot API.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn answer_keyboard(owner: UserId, position: usize) -> InlineKeyboardMarkup {
        let buttons = ChoiceLabel::ALL
            .iter()
            .map(|label| {
                let press = AnswerCallback {
                    owner,
                    position,
                    label: *label,
                };
                InlineKeyboardButton::callback(label.as_str(), press.encode())
            })
            .collect::<Vec<_>>();
        InlineKeyboardMarkup::new(vec![buttons])
    }
}

#[async_trait]
impl QuizMessenger for TelegramGateway {
    async fn send_question(
        &self,
        chat: ChatId,
        owner: UserId,
        position: usize,
        question: &quiz::Question,
    ) -> MessengerResult<MessageId> {
        let msg = self
            .bot
            .send_message(chat, render::question(position, question))
            .parse_mode(ParseMode::Html)
            .reply_markup(Self::answer_keyboard(owner, position))
            .await?;
        Ok(msg.id)
    }

    async fn send_verdict(&self, chat: ChatId, record: &AnswerRecord) -> MessengerResult<MessageId> {
        let msg = self.bot.send_message(chat, render::verdict(record)).await?;
        Ok(msg.id)
    }

    async fn send_summary(&self, chat: ChatId, finished: &FinishedQuiz) -> MessengerResult<()> {
        self.bot
            .send_message(chat, render::summary(finished))
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat: ChatId, message: MessageId) -> MessengerResult<()> {
        self.bot.delete_message(chat, message).await?;
        Ok(())
    }
}

#[async_trait]
impl DisplayNameLookup for TelegramGateway {
    async fn display_name(&self, user: &str) -> Option<String> {
        let id: i64 = user.parse().ok()?;
        match self.bot.get_chat(ChatId(id)).await {
            Ok(chat) => chat
                .username()
                .or_else(|| chat.first_name())
                .map(|name| name.to_string()),
            Err(e) => {
                log::debug!("Failed to look up user {}: {}", user, e);
                None
            }
        }
    }
}
