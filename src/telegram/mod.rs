pub mod bot;
pub mod commands;
pub mod formatters;
pub mod auto_notify;

pub use bot::run_telegram_bot;
pub use auto_notify::AutoNotifier;
