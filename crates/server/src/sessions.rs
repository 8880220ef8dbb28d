use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use shared::{
    domain::{ChatId, ContactId, Me},
    protocol::ChatEvent,
};
use thiserror::Error;
use tokio::sync::mpsc;

/// Work handed to a session task.
#[derive(Debug)]
pub enum SessionCommand {
    Bind {
        me: Me,
        timestamps: HashMap<ChatId, i64>,
    },
    Event(ChatEvent),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("nickname {0} is already connected")]
    NickInUse(String),
    #[error("no session for nickname {0}")]
    NotFound(String),
    #[error("session {0} has no chat identity bound")]
    Unbound(String),
    #[error("session {0} is no longer accepting events")]
    Closed(String),
    #[error("session {nickname} is already bound to {bound}")]
    IdentityMismatch { nickname: String, bound: ContactId },
}

struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    identity: Option<ContactId>,
}

/// Connected IRC sessions by nickname.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        nickname: &str,
        tx: mpsc::Sender<SessionCommand>,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.lock();
        if sessions.contains_key(nickname) {
            return Err(RegistryError::NickInUse(nickname.to_string()));
        }
        sessions.insert(nickname.to_string(), SessionHandle { tx, identity: None });
        Ok(())
    }

    pub fn unregister(&self, nickname: &str) {
        self.lock().remove(nickname);
    }

    /// Moves a session to a new nickname, keeping its channel and identity.
    pub fn rename(&self, from: &str, to: &str) -> Result<(), RegistryError> {
        let mut sessions = self.lock();
        if sessions.contains_key(to) {
            return Err(RegistryError::NickInUse(to.to_string()));
        }
        let handle = sessions
            .remove(from)
            .ok_or_else(|| RegistryError::NotFound(from.to_string()))?;
        sessions.insert(to.to_string(), handle);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn identity(&self, nickname: &str) -> Result<ContactId, RegistryError> {
        let sessions = self.lock();
        let handle = sessions
            .get(nickname)
            .ok_or_else(|| RegistryError::NotFound(nickname.to_string()))?;
        handle
            .identity
            .clone()
            .ok_or_else(|| RegistryError::Unbound(nickname.to_string()))
    }

    /// Attaches the chat-service account to a session. Binding the same
    /// account again only refreshes its timestamps; a session never switches
    /// accounts.
    pub async fn bind(
        &self,
        nickname: &str,
        me: Me,
        timestamps: HashMap<ChatId, i64>,
    ) -> Result<(), RegistryError> {
        let identity = me.self_id.clone();
        let tx = {
            let sessions = self.lock();
            let handle = sessions
                .get(nickname)
                .ok_or_else(|| RegistryError::NotFound(nickname.to_string()))?;
            if let Some(bound) = handle.identity.as_ref().filter(|bound| **bound != identity) {
                return Err(RegistryError::IdentityMismatch {
                    nickname: nickname.to_string(),
                    bound: bound.clone(),
                });
            }
            handle.tx.clone()
        };
        tx.send(SessionCommand::Bind { me, timestamps })
            .await
            .map_err(|_| RegistryError::Closed(nickname.to_string()))?;

        if let Some(handle) = self.lock().get_mut(nickname) {
            handle.identity = Some(identity);
        }
        Ok(())
    }

    pub async fn dispatch(&self, nickname: &str, event: ChatEvent) -> Result<(), RegistryError> {
        self.identity(nickname)?;
        let tx = self.sender(nickname)?;
        tx.send(SessionCommand::Event(event))
            .await
            .map_err(|_| RegistryError::Closed(nickname.to_string()))
    }

    fn sender(&self, nickname: &str) -> Result<mpsc::Sender<SessionCommand>, RegistryError> {
        self.lock()
            .get(nickname)
            .map(|handle| handle.tx.clone())
            .ok_or_else(|| RegistryError::NotFound(nickname.to_string()))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
