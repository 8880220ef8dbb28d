use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::protocol::Media;

pub mod chat;
pub mod connection;
pub mod error;
pub mod format;
pub mod irc;
pub mod notification;
pub mod persist;

pub use chat::{irc_safe, Chat, ChatList, Participant};
pub use connection::{BridgeServices, Connection};
pub use error::BridgeError;
pub use irc::IrcLine;
pub use persist::TimestampWriter;

/// Where a session's protocol lines go, usually the client socket.
#[async_trait]
pub trait LineSink: Send {
    async fn write_line(&mut self, at: DateTime<Utc>, line: IrcLine) -> Result<()>;
}

/// Fetches attachment bytes from the chat service.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn download_media(&self, media: &Media) -> Result<Vec<u8>>;
}
