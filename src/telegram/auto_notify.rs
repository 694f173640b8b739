use teloxide::Bot;
use teloxide::prelude::Requester;
use teloxide::payloads::SendMessageSetters;
use teloxide::types::ChatId;
use tracing::{info, error};
use crate::config::Config;
use crate::mint::{AdminChange, MintReceipt};
use crate::telegram::formatters::{format_address_tg, format_eth_tg};

pub struct AutoNotifier {
    bot: Bot,
    chat_ids: Vec<i64>,
}

impl AutoNotifier {
    pub fn new(config: &Config) -> Option<Self> {
        let telegram_config = config.telegram.as_ref()?;

        if !telegram_config.notifications_enabled {
            info!("Telegram notifications are disabled in config");
            return None;
        }

        if telegram_config.authorized_users.is_empty() {
            info!("No authorized users configured for notifications");
            return None;
        }

        let bot = Bot::new(telegram_config.bot_token.clone());
        let chat_ids: Vec<i64> = telegram_config.authorized_users
            .iter()
            .map(|&id| id as i64)
            .collect();

        info!("Auto-notifier initialized for {} users", chat_ids.len());

        Some(Self { bot, chat_ids })
    }

    /// Send mint success notification
    pub async fn notify_mint(&self, receipt: &MintReceipt) {
        let message = format!(
            "🎨 *New Mint*\n\n\
            FID: {}\n\
            Token: #{}\n\
            Paid: *{}*{}\n\
            Supply: {}",
            receipt.fid,
            receipt.token_id,
            format_eth_tg(receipt.price),
            if receipt.is_pro { " (Pro)" } else { "" },
            receipt.current_supply,
        );

        self.send_to_all(&message).await;
    }

    /// Send parameter change notification
    pub async fn notify_parameter_change(&self, change: &AdminChange) {
        let message = format!(
            "⚙️ *Parameters Updated*\n\n\
            Action: `{}`\n\
            Value: {}\n\
            By: {} ({:?})",
            change.action,
            change.detail,
            format_address_tg(&change.actor),
            change.role
        );

        self.send_to_all(&message).await;
    }

    /// Send error notification
    pub async fn notify_error(&self, error_msg: &str) {
        let message = format!(
            "⚠️ *Error Occurred*\n\n\
            {}\n\n\
            _Please check the system logs_",
            error_msg
        );

        self.send_to_all(&message).await;
    }

    /// Send to all authorized users
    async fn send_to_all(&self, message: &str) {
        for chat_id in &self.chat_ids {
            if let Err(e) = self.bot
                .send_message(ChatId(*chat_id), message)
                .parse_mode(teloxide::types::ParseMode::Markdown)
                .await
            {
                error!("Failed to send notification to chat {}: {}", chat_id, e);
            } else {
                info!("Notification sent to chat {}", chat_id);
            }
        }
    }
}
