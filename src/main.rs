use std::sync::Arc;

use dotenv::dotenv;
use quiz_bot::{
    bot::{self, gateway::TelegramGateway, Command},
    config::Config,
    quiz::{controller::QuizController, ledger::PointsLedger, pool::QuestionPool, session::SessionStore},
};
use teloxide::{prelude::*, utils::command::BotCommands};

#[tokio::main]
async fn main() {
    // A missing .env is fine, the variables may come from the environment
    let _ = dotenv();

    pretty_env_logger::init();
    log::info!("Starting quiz bot...");

    let config = Config::from_env().expect("Invalid configuration");

    let pool = QuestionPool::open(&config.questions_file).unwrap_or_else(|e| {
        panic!(
            "Failed to load questions from '{}': {}",
            config.questions_file.display(),
            e
        )
    });
    log::info!("Loaded {} questions", pool.len());

    let ledger = Arc::new(
        PointsLedger::load(&config.points_file)
            .await
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to load points from '{}': {}",
                    config.points_file.display(),
                    e
                )
            }),
    );
    log::info!("Points are kept in {}", ledger.path().display());

    let bot = Bot::from_env();
    let gateway = TelegramGateway::new(bot.clone());
    let store = SessionStore::new(Arc::new(pool), ledger.clone());
    let quiz = Arc::new(QuizController::new(
        store,
        gateway.clone(),
        config.quiz_timeout,
    ));

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![quiz.clone(), ledger, gateway])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!(
        "Stopped with {} quizzes in progress",
        quiz.store().active_sessions().await
    );
}
