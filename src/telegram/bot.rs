use teloxide::{prelude::*, utils::command::BotCommands};
use std::sync::Arc;
use crate::config::Config;
use crate::mint::MintService;
use tracing::{info, error};

/// State shared across all bot handlers
pub struct BotState {
    pub config: Config,
    pub service: Arc<MintService>,
}

impl BotState {
    pub fn is_authorized(&self, user_id: u64) -> bool {
        match &self.config.telegram {
            Some(tg) => tg.authorized_users.contains(&user_id),
            None => false,
        }
    }
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Start interaction with the bot")]
    Start,
    #[command(description = "Show help message")]
    Help,
    #[command(description = "Show mint status and statistics")]
    Status,
    #[command(description = "Show minting parameters")]
    Params,
    #[command(description = "Check eligibility and price for a FID")]
    Check(u64),
    #[command(description = "Pause minting")]
    Pause,
    #[command(description = "Resume minting")]
    Resume,
}

pub async fn run_telegram_bot(config: Config, service: Arc<MintService>) -> crate::error::Result<()> {
    let telegram_config = if let Some(conf) = &config.telegram {
        conf
    } else {
        error!("Telegram configuration missing");
        return Err(crate::error::MintError::Config("Telegram configuration missing".to_string()));
    };

    info!("Starting Telegram bot...");

    let bot = Bot::new(telegram_config.bot_token.clone());

    let state = Arc::new(BotState {
        config: config.clone(),
        service,
    });

    let handler = dptree::entry()
        .branch(Update::filter_message()
            .filter_command::<Command>()
            .endpoint(crate::telegram::commands::answer));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
