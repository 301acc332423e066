//! Chat transport implementations for Second.
//!
//! - **Telegram**: Bot API over long polling, with reply splitting at the
//!   4096-character message limit
//! - **split**: the splitting rule itself, usable by any transport

pub mod split;
pub mod telegram;

pub use split::split_message;
pub use telegram::{TelegramChannel, TelegramConfig, TELEGRAM_MESSAGE_LIMIT};
