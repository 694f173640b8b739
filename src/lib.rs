pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod mint;
pub mod server;
pub mod storage;
pub mod telegram;
pub mod utils;

pub use error::{Result, MintError};
pub use config::Config;
