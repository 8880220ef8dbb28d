use shared::domain::MessageId;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no idea what to do with notification type {tag}")]
    UnsupportedNotification { tag: String },
    #[error("failed to resolve media for message {message_id}: {source}")]
    Media {
        message_id: MessageId,
        source: BoxError,
    },
    #[error("failed to write protocol output: {source}")]
    Output { source: BoxError },
}

impl BridgeError {
    /// Only a broken output sink ends the session; everything else is per event.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Output { .. })
    }

    pub(crate) fn media(message_id: &MessageId, source: anyhow::Error) -> Self {
        Self::Media {
            message_id: message_id.clone(),
            source: source.into(),
        }
    }

    pub(crate) fn output(source: anyhow::Error) -> Self {
        Self::Output {
            source: source.into(),
        }
    }
}
