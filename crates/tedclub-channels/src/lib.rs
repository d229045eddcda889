//! # TedClub Channels
//! Messaging platform adapters. Telegram is the only platform the club runs on.

pub mod telegram;

pub use telegram::TelegramMessenger;
