pub mod callback;
pub mod gateway;
pub mod render;

use std::sync::Arc;

use teloxide::{
    dispatching::UpdateHandler,
    prelude::*,
    types::ParseMode,
    utils::command::BotCommands,
};

use crate::quiz::controller::QuizController;
use crate::quiz::ledger::PointsLedger;
use crate::quiz::ranking;
use crate::quiz::QuizError;
use callback::AnswerCallback;
use gateway::TelegramGateway;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
pub type TelegramQuiz = QuizController<TelegramGateway>;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Quiz bot commands:")]
pub enum Command {
    #[command(description = "take a five-question quiz")]
    Quiz,
    #[command(description = "show the top 10 players")]
    Ranking,
    #[command(description = "show this help")]
    Help,
}

/// Routes commands and answer buttons. Expects `Arc<TelegramQuiz>`,
/// `Arc<PointsLedger>` and `TelegramGateway` among the dependencies.
pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command),
        )
        .branch(Update::filter_callback_query().endpoint(answer_button))
}

async fn command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    quiz: Arc<TelegramQuiz>,
    ledger: Arc<PointsLedger>,
    gateway: TelegramGateway,
) -> HandlerResult {
    match cmd {
        Command::Quiz => start_quiz(bot, msg, quiz).await,
        Command::Ranking => show_ranking(bot, msg, ledger, gateway).await,
        Command::Help => {
            bot.send_message(msg.chat.id, render::help())
                .parse_mode(ParseMode::Html)
                .await?;
            Ok(())
        }
    }
}

async fn start_quiz(bot: Bot, msg: Message, quiz: Arc<TelegramQuiz>) -> HandlerResult {
    let Some(user) = msg.from() else {
        return Ok(());
    };

    match quiz.start(user.id, msg.chat.id).await {
        Ok(()) => Ok(()),
        Err(e @ QuizError::Messenger(_)) => Err(e.into()),
        Err(e) => {
            log::debug!("Quiz start rejected for user {}: {}", user.id.0, e);
            bot.send_message(msg.chat.id, render::rejection(&e))
                .reply_to_message_id(msg.id)
                .await?;
            Ok(())
        }
    }
}

async fn show_ranking(
    bot: Bot,
    msg: Message,
    ledger: Arc<PointsLedger>,
    gateway: TelegramGateway,
) -> HandlerResult {
    let entries = ranking::top_players(&ledger, &gateway).await;
    bot.send_message(msg.chat.id, render::ranking(&entries))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn answer_button(bot: Bot, q: CallbackQuery, quiz: Arc<TelegramQuiz>) -> HandlerResult {
    let Some(press) = q.data.as_deref().and_then(AnswerCallback::parse) else {
        bot.answer_callback_query(q.id)
            .text("This button is no longer valid")
            .await?;
        return Ok(());
    };

    match quiz
        .answer(q.from.id, press.owner, press.position, press.label)
        .await
    {
        Ok(record) => {
            bot.answer_callback_query(q.id).await?;
            if !record.complete {
                if let Some(message) = &q.message {
                    // Drop the buttons of the answered question. The message
                    // itself is deleted when the quiz ends.
                    if let Err(e) = bot
                        .edit_message_reply_markup(message.chat.id, message.id)
                        .await
                    {
                        log::debug!(
                            "Could not remove buttons from message {} in chat {}: {}",
                            message.id.0,
                            message.chat.id.0,
                            e
                        );
                    }
                }
            }
            Ok(())
        }
        Err(e @ QuizError::Messenger(_)) => {
            bot.answer_callback_query(q.id)
                .text(render::rejection(&e))
                .await?;
            Err(e.into())
        }
        Err(e) => {
            log::debug!("Button press by user {} rejected: {}", q.from.id.0, e);
            bot.answer_callback_query(q.id)
                .text(render::rejection(&e))
                .show_alert(true)
                .await?;
            Ok(())
        }
    }
}
