use std::collections::{HashMap, HashSet};

use shared::domain::{ChatDescriptor, ChatId, Contact, ContactId, MessageId};

/// ASCII-only, `[A-Za-z0-9+]` rendering of a name, usable as a nick or channel.
pub fn irc_safe(name: &str) -> String {
    deunicode::deunicode(name)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '+')
        .collect()
}

fn irc_safe_or(name: &str, fallback: &str) -> String {
    let safe = irc_safe(name);
    if safe.is_empty() {
        irc_safe(fallback)
    } else {
        safe
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ContactId,
    pub is_admin: bool,
    pub contact: Contact,
}

impl Participant {
    pub fn from_contact(contact: Contact, is_admin: bool) -> Self {
        Self {
            id: contact.id.clone(),
            is_admin,
            contact,
        }
    }

    pub fn safe_name(&self) -> String {
        irc_safe_or(self.contact.display_name(), self.id.local_part())
    }
}

#[derive(Debug, Clone)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub is_group: bool,
    pub description: Option<String>,
    pub joined: bool,
    pub participants: Vec<Participant>,
    identifier: String,
    delivered: HashSet<MessageId>,
}

impl Chat {
    pub fn from_descriptor(descriptor: &ChatDescriptor) -> Self {
        let base = irc_safe_or(&descriptor.name, descriptor.id.local_part());
        let identifier = if descriptor.is_group {
            format!("#{base}")
        } else {
            base
        };

        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            is_group: descriptor.is_group,
            description: descriptor
                .description
                .clone()
                .filter(|description| !description.trim().is_empty()),
            joined: false,
            participants: descriptor
                .participants
                .iter()
                .map(|p| Participant::from_contact(p.contact.clone(), p.is_admin))
                .collect(),
            identifier,
            delivered: HashSet::new(),
        }
    }

    /// Channel name for groups, query nick for direct chats.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn participant(&self, id: &ContactId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn has_message(&self, id: &MessageId) -> bool {
        self.delivered.contains(id)
    }

    /// Returns `false` when the id was already delivered.
    pub fn mark_delivered(&mut self, id: &MessageId) -> bool {
        self.delivered.insert(id.clone())
    }

    pub fn add_participant(&mut self, id: &ContactId) {
        if self.participant(id).is_none() {
            self.participants
                .push(Participant::from_contact(Contact::new(id.as_str()), false));
        }
    }

    pub fn remove_participant(&mut self, id: &ContactId) {
        self.participants.retain(|p| &p.id != id);
    }
}

/// Chats in the order the session first saw them, indexed by id.
#[derive(Debug, Default)]
pub struct ChatList {
    chats: Vec<Chat>,
    index: HashMap<ChatId, usize>,
}

impl ChatList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ChatId) -> Option<&Chat> {
        self.index.get(id).map(|&i| &self.chats[i])
    }

    pub fn get_mut(&mut self, id: &ChatId) -> Option<&mut Chat> {
        self.index.get(id).map(|&i| &mut self.chats[i])
    }

    /// Returns the chat for `descriptor`, creating it on first sight.
    pub fn get_or_insert(&mut self, descriptor: &ChatDescriptor) -> &mut Chat {
        let i = match self.index.get(&descriptor.id) {
            Some(&i) => i,
            None => {
                self.chats.push(Chat::from_descriptor(descriptor));
                let i = self.chats.len() - 1;
                self.index.insert(descriptor.id.clone(), i);
                i
            }
        };
        &mut self.chats[i]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chat> {
        self.chats.iter()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::ParticipantDescriptor;

    fn group(name: &str) -> ChatDescriptor {
        ChatDescriptor {
            id: ChatId::new("120363000000000001@g.us"),
            name: name.to_string(),
            is_group: true,
            description: Some("  ".to_string()),
            participants: vec![ParticipantDescriptor {
                contact: Contact::new("31600000001@c.us").with_push_name("Zoë O'Brien"),
                is_admin: true,
            }],
        }
    }

    #[test]
    fn irc_safe_transliterates_and_strips() {
        assert_eq!(irc_safe("Zoë O'Brien"), "ZoeOBrien");
        assert_eq!(irc_safe("C++ fans!"), "C++fans");
        assert_eq!(irc_safe("Ñandú"), "Nandu");
        assert_eq!(irc_safe("   "), "");
    }

    #[test]
    fn group_identifier_is_channel_with_fallback() {
        assert_eq!(Chat::from_descriptor(&group("Dev Team")).identifier(), "#DevTeam");
        assert_eq!(
            Chat::from_descriptor(&group("---")).identifier(),
            "#120363000000000001"
        );
    }

    #[test]
    fn direct_identifier_is_nick() {
        let chat = Chat::from_descriptor(&ChatDescriptor {
            id: ChatId::new("31600000002@c.us"),
            name: "Bob Builder".to_string(),
            ..ChatDescriptor::default()
        });
        assert_eq!(chat.identifier(), "BobBuilder");
        assert!(!chat.is_group);
    }

    #[test]
    fn blank_description_is_dropped_and_participants_copied() {
        let chat = Chat::from_descriptor(&group("Dev"));
        assert_eq!(chat.description, None);
        assert_eq!(chat.participants.len(), 1);
        assert!(chat.participants[0].is_admin);
        assert_eq!(chat.participants[0].safe_name(), "ZoeOBrien");
    }

    #[test]
    fn participant_without_name_uses_number() {
        let participant = Participant::from_contact(Contact::new("31600000003@c.us"), false);
        assert_eq!(participant.safe_name(), "31600000003");
    }

    #[test]
    fn delivered_set_rejects_repeats() {
        let mut chat = Chat::from_descriptor(&group("Dev"));
        let id = MessageId::new("m1");
        assert!(!chat.has_message(&id));
        assert!(chat.mark_delivered(&id));
        assert!(!chat.mark_delivered(&id));
        assert!(chat.has_message(&id));
    }

    #[test]
    fn chat_list_keeps_first_seen_order() {
        let mut chats = ChatList::new();
        chats.get_or_insert(&group("First"));
        chats.get_or_insert(&ChatDescriptor {
            id: ChatId::new("31600000002@c.us"),
            name: "Second".to_string(),
            ..ChatDescriptor::default()
        });
        chats.get_or_insert(&group("Renamed")).joined = true;

        let names: Vec<_> = chats.iter().map(|c| c.identifier().to_string()).collect();
        assert_eq!(names, ["#First", "Second"]);
        assert_eq!(chats.len(), 2);
        assert!(chats.get(&ChatId::new("120363000000000001@g.us")).expect("chat").joined);
    }

    #[test]
    fn participant_membership_updates() {
        let mut chat = Chat::from_descriptor(&group("Dev"));
        let bob = ContactId::new("31600000002@c.us");
        chat.add_participant(&bob);
        chat.add_participant(&bob);
        assert_eq!(chat.participants.len(), 2);
        chat.remove_participant(&bob);
        assert!(chat.participant(&bob).is_none());
    }
}
