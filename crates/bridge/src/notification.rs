use shared::{
    domain::{ChatId, ContactId, Me},
    protocol::{GroupChange, Notification, NotificationKind},
};
use tracing::warn;

use crate::{
    chat::{Chat, ChatList},
    error::BridgeError,
    irc::{IrcLine, SERVER_NAME},
};

/// Output and state changes a membership notification asks for. Computed
/// against a borrowed chat and applied by the caller.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Translation {
    pub lines: Vec<IrcLine>,
    /// "me" left or was removed; the chat must be re-joined before reuse.
    pub parted: bool,
    pub added: Vec<ContactId>,
    pub removed: Vec<ContactId>,
}

pub struct NotificationContext<'a> {
    pub me: &'a Me,
    pub nickname: &'a str,
    pub chats: &'a ChatList,
}

impl NotificationContext<'_> {
    /// Chat participant first, then a direct chat with that contact, then the
    /// raw number.
    fn display_name(&self, chat: &Chat, id: &ContactId) -> String {
        if id == &self.me.self_id {
            return self.nickname.to_string();
        }
        if let Some(participant) = chat.participant(id) {
            return participant.safe_name();
        }
        if let Some(direct) = self
            .chats
            .get(&ChatId::from(id))
            .filter(|direct| !direct.is_group)
        {
            return direct.identifier().to_string();
        }
        id.local_part().to_string()
    }
}

pub fn translate(
    ctx: &NotificationContext<'_>,
    chat: &Chat,
    author: Option<&ContactId>,
    notification: &Notification,
) -> Result<Translation, BridgeError> {
    let change = match &notification.kind {
        NotificationKind::Group(change) => change,
        NotificationKind::Unsupported { tag } => {
            return Err(BridgeError::UnsupportedNotification { tag: tag.clone() })
        }
    };

    let mut translation = Translation::default();
    if notification.recipients.is_empty() {
        return Ok(translation);
    }

    let author = author
        .map(|id| ctx.display_name(chat, id))
        .unwrap_or_else(|| SERVER_NAME.to_string());
    let channel = chat.identifier().to_string();

    for recipient_id in &notification.recipients {
        let recipient_is_me = recipient_id == &ctx.me.self_id;
        let recipient = ctx.display_name(chat, recipient_id);

        match change {
            GroupChange::Create => {}
            // Our own JOIN already went out with the join sequence.
            GroupChange::Add | GroupChange::Invite if recipient_is_me => {}
            GroupChange::Add | GroupChange::Invite => {
                translation.lines.push(IrcLine::Join {
                    nick: recipient,
                    channel: channel.clone(),
                });
                translation.added.push(recipient_id.clone());
            }
            GroupChange::Leave => {
                translation.lines.push(IrcLine::Part {
                    nick: recipient,
                    channel: channel.clone(),
                });
                translation.removed.push(recipient_id.clone());
            }
            GroupChange::Remove => {
                translation.lines.push(IrcLine::Kick {
                    actor: author.clone(),
                    channel: channel.clone(),
                    target: recipient,
                });
                translation.removed.push(recipient_id.clone());
            }
            GroupChange::Other(subtype) => {
                warn!(
                    chat_id = %chat.id,
                    subtype = %subtype,
                    "notification: no idea what to do with subtype"
                );
            }
        }

        if recipient_is_me && matches!(change, GroupChange::Leave | GroupChange::Remove) {
            translation.parted = true;
        }
    }

    Ok(translation)
}

/// Names for `RPL_NAMREPLY`: admins get `@`, "me" shows as our own nick.
pub fn names_list(chat: &Chat, me: &Me, nickname: &str) -> Vec<String> {
    let mut names: Vec<String> = chat
        .participants
        .iter()
        .map(|p| {
            let name = if p.id == me.self_id {
                nickname.to_string()
            } else {
                p.safe_name()
            };
            if p.is_admin {
                format!("@{name}")
            } else {
                name
            }
        })
        .collect();

    if !names
        .iter()
        .any(|name| name.trim_start_matches('@') == nickname)
    {
        names.push(nickname.to_string());
    }
    names
}

#[cfg(test)]
#[path = "tests/notification_tests.rs"]
mod tests;
