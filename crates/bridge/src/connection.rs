use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use media_cache::MediaCache;
use shared::{
    domain::{ChatId, Me},
    protocol::{ChatEvent, Message, MessageContent},
};
use tracing::{debug, info, warn};

use crate::{
    chat::{Chat, Participant},
    error::BridgeError,
    format,
    irc::{IrcLine, SERVER_NAME},
    notification::{self, NotificationContext},
    persist::TimestampWriter,
    ChatList, LineSink, MediaDownloader,
};

/// Process-wide collaborators every session shares.
#[derive(Clone)]
pub struct BridgeServices {
    pub media: Arc<MediaCache>,
    pub downloader: Arc<dyn MediaDownloader>,
    pub timestamps: TimestampWriter,
}

/// One bridged session. Owned by exactly one task, which feeds it events in
/// arrival order.
pub struct Connection {
    nickname: String,
    me: Me,
    chats: ChatList,
    timestamps: HashMap<ChatId, i64>,
    services: BridgeServices,
}

impl Connection {
    pub fn new(nickname: impl Into<String>, me: Me, services: BridgeServices) -> Self {
        Self {
            nickname: nickname.into(),
            me,
            chats: ChatList::new(),
            timestamps: HashMap::new(),
            services,
        }
    }

    /// Seeds the high-water marks loaded from persistence.
    pub fn with_timestamps(mut self, timestamps: HashMap<ChatId, i64>) -> Self {
        self.timestamps = timestamps;
        self
    }

    /// Folds in marks loaded again for the same identity. The newer mark wins.
    pub fn merge_timestamps(&mut self, timestamps: HashMap<ChatId, i64>) {
        for (chat_id, timestamp) in timestamps {
            self.timestamps
                .entry(chat_id)
                .and_modify(|last| *last = (*last).max(timestamp))
                .or_insert(timestamp);
        }
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }

    pub fn me(&self) -> &Me {
        &self.me
    }

    pub fn chats(&self) -> &ChatList {
        &self.chats
    }

    pub fn last_timestamp(&self, chat_id: &ChatId) -> Option<i64> {
        self.timestamps.get(chat_id).copied()
    }

    pub async fn handle_event(
        &mut self,
        event: ChatEvent,
        sink: &mut dyn LineSink,
    ) -> Result<(), BridgeError> {
        match event {
            ChatEvent::Message(message) => self.handle_message(*message, sink).await,
            ChatEvent::Unsupported { tag } => {
                info!(%tag, "bridge: ignoring unsupported event");
                Ok(())
            }
        }
    }

    async fn handle_message(
        &mut self,
        message: Message,
        sink: &mut dyn LineSink,
    ) -> Result<(), BridgeError> {
        if message.content == MessageContent::E2eNotification {
            return Ok(());
        }

        let at = message.time();
        let chat_id = message.chat.id.clone();
        let chat = self.chats.get_or_insert(&message.chat);

        if chat.is_group && !chat.joined {
            let lines = join_lines(chat, &self.me, &self.nickname);
            write_lines(sink, at, lines).await?;
            chat.joined = true;
            info!(chat_id = %chat.id, channel = %chat.identifier(), "bridge: joined chat");
        }

        if !chat.mark_delivered(&message.id) {
            debug!(message_id = %message.id, "bridge: duplicate message ignored");
            return Ok(());
        }

        let newer = self
            .timestamps
            .get(&chat_id)
            .map_or(true, |&last| message.timestamp > last);
        if newer {
            self.timestamps.insert(chat_id.clone(), message.timestamp);
            self.services
                .timestamps
                .record(self.me.self_id.as_str(), &chat_id, message.timestamp);
        }

        match &message.content {
            MessageContent::Notification(_) => {
                return self.handle_notification(&chat_id, &message, sink).await
            }
            MessageContent::Unsupported { tag } => {
                info!(message_id = %message.id, %tag, "bridge: ignoring unsupported message");
                return Ok(());
            }
            _ => {}
        }

        if message.sent_by_me_from_web {
            debug!(message_id = %message.id, "bridge: dropping echo of message sent from web");
            return Ok(());
        }

        if let MessageContent::Media(media) = &message.content {
            let downloader = Arc::clone(&self.services.downloader);
            self.services
                .media
                .resolve(media, || async move { downloader.download_media(media).await })
                .await
                .map_err(|error| BridgeError::media(&message.id, error))?;
        }

        let Some(chat) = self.chats.get(&chat_id) else {
            return Ok(());
        };
        let sender = if message.sent_by_me {
            self.nickname.clone()
        } else {
            sender_name(chat, &message)
        };
        let target = if chat.is_group || message.sent_by_me {
            chat.identifier()
        } else {
            self.nickname.as_str()
        };

        let mut lines = Vec::new();
        if let Some(quoted) = &message.quoted {
            let body =
                format::message_body(quoted, &chat.participants, &self.me, &self.services.media);
            let first = body.split('\n').next().unwrap_or_default();
            lines.push(IrcLine::privmsg(&sender, target, &format!("> {first}")));
        }

        let body = format::message_body(
            &message,
            &chat.participants,
            &self.me,
            &self.services.media,
        );
        lines.extend(
            body.split('\n')
                .map(|line| IrcLine::privmsg(&sender, target, line)),
        );

        write_lines(sink, at, lines).await
    }

    async fn handle_notification(
        &mut self,
        chat_id: &ChatId,
        message: &Message,
        sink: &mut dyn LineSink,
    ) -> Result<(), BridgeError> {
        let MessageContent::Notification(notification) = &message.content else {
            return Ok(());
        };

        let translation = {
            let Some(chat) = self.chats.get(chat_id) else {
                return Ok(());
            };
            let ctx = NotificationContext {
                me: &self.me,
                nickname: &self.nickname,
                chats: &self.chats,
            };
            notification::translate(&ctx, chat, message.author_id(), notification)?
        };

        if let Some(chat) = self.chats.get_mut(chat_id) {
            for id in &translation.added {
                chat.add_participant(id);
            }
            for id in &translation.removed {
                chat.remove_participant(id);
            }
            if translation.parted {
                chat.joined = false;
                info!(chat_id = %chat.id, "bridge: left chat");
            }
        }

        write_lines(sink, message.time(), translation.lines).await
    }
}

fn join_lines(chat: &Chat, me: &Me, nickname: &str) -> Vec<IrcLine> {
    let channel = chat.identifier().to_string();
    let mut lines = vec![IrcLine::Join {
        nick: nickname.to_string(),
        channel: channel.clone(),
    }];
    if let Some(topic) = &chat.description {
        lines.push(IrcLine::Topic {
            nick: nickname.to_string(),
            channel: channel.clone(),
            topic: topic.clone(),
        });
    }
    lines.push(IrcLine::Names {
        nick: nickname.to_string(),
        channel: channel.clone(),
        names: notification::names_list(chat, me, nickname),
    });
    lines.push(IrcLine::EndOfNames {
        nick: nickname.to_string(),
        channel,
    });
    lines
}

/// Participant name, then the attached contact, then the bare number.
fn sender_name(chat: &Chat, message: &Message) -> String {
    if let Some(participant) = message.author_id().and_then(|id| chat.participant(id)) {
        return participant.safe_name();
    }
    if let Some(contact) = &message.sender {
        return Participant::from_contact(contact.clone(), false).safe_name();
    }
    if !chat.is_group {
        return chat.identifier().to_string();
    }
    match message.author_id() {
        Some(id) => id.local_part().to_string(),
        None => {
            warn!(message_id = %message.id, "bridge: message without author");
            SERVER_NAME.to_string()
        }
    }
}

async fn write_lines(
    sink: &mut dyn LineSink,
    at: DateTime<Utc>,
    lines: Vec<IrcLine>,
) -> Result<(), BridgeError> {
    for line in lines {
        sink.write_line(at, line)
            .await
            .map_err(BridgeError::output)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
