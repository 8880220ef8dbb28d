use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChatDescriptor, Contact, ContactId, MessageId};

/// Notification type the chat service uses for group membership changes.
pub const GROUP_NOTIFICATION_TAG: &str = "gp2";
const E2E_NOTIFICATION_TAG: &str = "e2e_notification";
const TEXT_TAG: &str = "chat";
const LOCATION_TAG: &str = "location";
const MEDIA_TAG: &str = "media";

/// One decoded event delivered by the chat-service client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChatEvent", into = "RawChatEvent")]
pub enum ChatEvent {
    Message(Box<Message>),
    Unsupported { tag: String },
}

impl ChatEvent {
    pub fn tag(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::Unsupported { tag } => tag,
        }
    }
}

impl From<Message> for ChatEvent {
    fn from(value: Message) -> Self {
        Self::Message(Box::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMessage", into = "RawMessage")]
pub struct Message {
    pub id: MessageId,
    pub chat: ChatDescriptor,
    pub sender: Option<Contact>,
    /// Author id when no sender contact was attached, as on some notifications.
    pub from: Option<ContactId>,
    /// Unix seconds.
    pub timestamp: i64,
    pub sent_by_me: bool,
    pub sent_by_me_from_web: bool,
    pub quoted: Option<Box<Message>>,
    pub content: MessageContent,
}

impl Message {
    pub fn time(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.timestamp, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn author_id(&self) -> Option<&ContactId> {
        self.sender
            .as_ref()
            .map(|sender| &sender.id)
            .or(self.from.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text { body: String },
    Location(Location),
    Media(Media),
    Notification(Notification),
    E2eNotification,
    Unsupported { tag: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Media {
    /// Content hash as reported by the chat service.
    pub file_hash: String,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
    pub caption: Option<String>,
    /// Where the chat-service integration exposes the raw bytes.
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipients: Vec<ContactId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Group(GroupChange),
    Unsupported { tag: String },
}

impl NotificationKind {
    pub fn from_tags(kind: &str, subtype: Option<&str>) -> Self {
        if kind == GROUP_NOTIFICATION_TAG {
            Self::Group(GroupChange::from(subtype.unwrap_or_default()))
        } else {
            Self::Unsupported {
                tag: kind.to_string(),
            }
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Group(_) => GROUP_NOTIFICATION_TAG,
            Self::Unsupported { tag } => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupChange {
    Create,
    Add,
    Invite,
    Leave,
    Remove,
    Other(String),
}

impl GroupChange {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "create",
            Self::Add => "add",
            Self::Invite => "invite",
            Self::Leave => "leave",
            Self::Remove => "remove",
            Self::Other(tag) => tag,
        }
    }
}

impl From<&str> for GroupChange {
    fn from(value: &str) -> Self {
        match value {
            "create" => Self::Create,
            "add" => Self::Add,
            "invite" => Self::Invite,
            "leave" => Self::Leave,
            "remove" => Self::Remove,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Flat wire shape of a message as posted by the chat-service integration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMessage {
    pub id: MessageId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub chat: ChatDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<ContactId>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub is_notification: bool,
    pub is_sent_by_me: bool,
    pub is_sent_by_me_from_web: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<ContactId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted: Option<Box<RawMessage>>,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        let content = if raw.kind == E2E_NOTIFICATION_TAG {
            MessageContent::E2eNotification
        } else if raw.is_notification {
            MessageContent::Notification(Notification {
                kind: NotificationKind::from_tags(&raw.kind, raw.subtype.as_deref()),
                recipients: raw.recipients,
            })
        } else if let Some(location) = raw.location {
            MessageContent::Location(location)
        } else if let Some(media) = raw.media {
            MessageContent::Media(media)
        } else if let Some(body) = raw.body {
            MessageContent::Text { body }
        } else if raw.kind == TEXT_TAG {
            MessageContent::Text {
                body: String::new(),
            }
        } else {
            MessageContent::Unsupported { tag: raw.kind }
        };

        Self {
            id: raw.id,
            chat: raw.chat,
            sender: raw.sender,
            from: raw.from,
            timestamp: raw.timestamp,
            sent_by_me: raw.is_sent_by_me,
            sent_by_me_from_web: raw.is_sent_by_me_from_web,
            quoted: raw.quoted.map(|quoted| Box::new(Message::from(*quoted))),
            content,
        }
    }
}

impl From<Message> for RawMessage {
    fn from(message: Message) -> Self {
        let mut raw = RawMessage {
            id: message.id,
            chat: message.chat,
            sender: message.sender,
            from: message.from,
            timestamp: message.timestamp,
            is_sent_by_me: message.sent_by_me,
            is_sent_by_me_from_web: message.sent_by_me_from_web,
            quoted: message
                .quoted
                .map(|quoted| Box::new(RawMessage::from(*quoted))),
            ..RawMessage::default()
        };

        match message.content {
            MessageContent::Text { body } => {
                raw.kind = TEXT_TAG.to_string();
                raw.body = Some(body);
            }
            MessageContent::Location(location) => {
                raw.kind = LOCATION_TAG.to_string();
                raw.location = Some(location);
            }
            MessageContent::Media(media) => {
                raw.kind = MEDIA_TAG.to_string();
                raw.media = Some(media);
            }
            MessageContent::Notification(notification) => {
                raw.kind = notification.kind.tag().to_string();
                if let NotificationKind::Group(change) = &notification.kind {
                    raw.subtype = Some(change.as_str().to_string());
                }
                raw.is_notification = true;
                raw.recipients = notification.recipients;
            }
            MessageContent::E2eNotification => raw.kind = E2E_NOTIFICATION_TAG.to_string(),
            MessageContent::Unsupported { tag } => raw.kind = tag,
        }

        raw
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawChatEvent {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<RawMessage>,
}

impl TryFrom<RawChatEvent> for ChatEvent {
    type Error = String;

    fn try_from(raw: RawChatEvent) -> Result<Self, Self::Error> {
        match (raw.event.as_str(), raw.message) {
            ("message", Some(message)) => Ok(Message::from(message).into()),
            ("message", None) => Err("message event without a message body".to_string()),
            _ => Ok(Self::Unsupported { tag: raw.event }),
        }
    }
}

impl From<ChatEvent> for RawChatEvent {
    fn from(event: ChatEvent) -> Self {
        match event {
            ChatEvent::Message(message) => Self {
                event: "message".to_string(),
                message: Some(RawMessage::from(*message)),
            },
            ChatEvent::Unsupported { tag } => Self {
                event: tag,
                message: None,
            },
        }
    }
}
