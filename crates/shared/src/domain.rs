use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(ChatId);
id_newtype!(ContactId);
id_newtype!(MessageId);

impl ContactId {
    /// The account part of a `<number>@<server>` id.
    pub fn local_part(&self) -> &str {
        local_part(&self.0)
    }
}

impl ChatId {
    pub fn local_part(&self) -> &str {
        local_part(&self.0)
    }
}

// Direct chats share their id with the contact on the other side.
impl From<&ContactId> for ChatId {
    fn from(value: &ContactId) -> Self {
        Self(value.0.clone())
    }
}

fn local_part(raw: &str) -> &str {
    raw.split('@').next().unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub id: ContactId,
    /// Name saved in the account's address book.
    pub name: Option<String>,
    /// Name the contact chose for themselves.
    pub push_name: Option<String>,
    pub short_name: Option<String>,
}

impl Contact {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: ContactId::new(id),
            ..Self::default()
        }
    }

    pub fn with_push_name(mut self, push_name: impl Into<String>) -> Self {
        self.push_name = Some(push_name.into());
        self
    }

    pub fn display_name(&self) -> &str {
        [&self.name, &self.push_name, &self.short_name]
            .into_iter()
            .flatten()
            .map(|name| name.trim())
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| self.id.local_part())
    }
}

/// The chat-service account a session is bridging for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Me {
    pub self_id: ContactId,
    #[serde(default)]
    pub push_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantDescriptor {
    pub contact: Contact,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatDescriptor {
    pub id: ChatId,
    pub name: String,
    pub is_group: bool,
    pub description: Option<String>,
    pub participants: Vec<ParticipantDescriptor>,
}
