use teloxide::{prelude::*, utils::command::BotCommands};
use crate::telegram::bot::{BotState, Command};
use crate::telegram::formatters::{format_eth_tg, format_params_tg, format_quote_tg};
use std::sync::Arc;
use tracing::warn;

pub async fn answer(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>
) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| u.id.0).unwrap_or(0);
    if !state.is_authorized(user_id) {
        warn!("Unauthorized Telegram user {}", user_id);
        bot.send_message(msg.chat.id, "⛔ Authorization failed. You are not authorized to use this bot.").await?;
        return Ok(());
    }

    match cmd {
        Command::Start => {
            bot.send_message(
                msg.chat.id,
                "👋 *Welcome to the FID Mint admin bot*\n\nUse /help to see available commands.",
            )
            .parse_mode(teloxide::types::ParseMode::Markdown)
            .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Status => {
            let params = state.service.params().await;
            let text = match state.service.stats().await {
                Ok(stats) => format!(
                    "{} *Mint Status*\n\n\
                    Minted: {}\n\
                    Pro mints: {}\n\
                    Revenue: {}\n\
                    Parameter changes: {}",
                    if params.paused { "⏸" } else { "🟢" },
                    stats.total_minted,
                    stats.pro_mints,
                    format_eth_tg(stats.total_revenue),
                    stats.parameter_changes,
                ),
                Err(e) => format!("❌ Failed to load statistics: {}", e),
            };
            bot.send_message(msg.chat.id, text)
                .parse_mode(teloxide::types::ParseMode::Markdown)
                .await?;
        }
        Command::Params => {
            let params = state.service.params().await;
            bot.send_message(msg.chat.id, format_params_tg(&params))
                .parse_mode(teloxide::types::ParseMode::Markdown)
                .await?;
        }
        Command::Check(fid) => {
            let quote = state.service.quote(fid).await;
            bot.send_message(msg.chat.id, format_quote_tg(&quote))
                .parse_mode(teloxide::types::ParseMode::Markdown)
                .await?;
        }
        Command::Pause | Command::Resume => {
            let paused = matches!(cmd, Command::Pause);
            let owner = state.service.owner().await;
            let text = match state.service.set_paused(&owner, paused).await {
                Ok(_) if paused => "⏸ Minting paused".to_string(),
                Ok(_) => "▶️ Minting resumed".to_string(),
                Err(e) => format!("❌ {}", e),
            };
            bot.send_message(msg.chat.id, text).await?;
        }
    }

    Ok(())
}
