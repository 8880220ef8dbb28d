use std::fmt;

/// Prefix used on numeric replies the bridge generates itself.
pub const SERVER_NAME: &str = "chat-bridge";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcLine {
    Privmsg {
        from: String,
        target: String,
        text: String,
    },
    Join {
        nick: String,
        channel: String,
    },
    Part {
        nick: String,
        channel: String,
    },
    Kick {
        actor: String,
        channel: String,
        target: String,
    },
    /// `RPL_TOPIC`
    Topic {
        nick: String,
        channel: String,
        topic: String,
    },
    /// `RPL_NAMREPLY`
    Names {
        nick: String,
        channel: String,
        names: Vec<String>,
    },
    /// `RPL_ENDOFNAMES`
    EndOfNames {
        nick: String,
        channel: String,
    },
}

impl IrcLine {
    pub fn privmsg(from: &str, target: &str, text: &str) -> Self {
        Self::Privmsg {
            from: from.to_string(),
            target: target.to_string(),
            text: text.replace('\r', ""),
        }
    }
}

impl fmt::Display for IrcLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Privmsg { from, target, text } => write!(f, ":{from} PRIVMSG {target} :{text}"),
            Self::Join { nick, channel } => write!(f, ":{nick} JOIN {channel}"),
            Self::Part { nick, channel } => write!(f, ":{nick} PART {channel}"),
            Self::Kick {
                actor,
                channel,
                target,
            } => write!(f, ":{actor} KICK {channel} {target}"),
            Self::Topic {
                nick,
                channel,
                topic,
            } => {
                let topic = topic.replace(['\r', '\n'], " ");
                write!(f, ":{SERVER_NAME} 332 {nick} {channel} :{topic}")
            }
            Self::Names {
                nick,
                channel,
                names,
            } => write!(
                f,
                ":{SERVER_NAME} 353 {nick} = {channel} :{}",
                names.join(" ")
            ),
            Self::EndOfNames { nick, channel } => {
                write!(f, ":{SERVER_NAME} 366 {nick} {channel} :End of /NAMES list.")
            }
        }
    }
}
