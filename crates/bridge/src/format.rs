use std::borrow::Cow;

use media_cache::MediaCache;
use shared::{
    domain::Me,
    protocol::{Location, Message, MessageContent},
};

use crate::chat::Participant;

/// Shown instead of a url while an attachment is not stored yet.
pub const MEDIA_PLACEHOLDER: &str = "--file--";

const BOLD: char = '\u{02}';
const ITALIC: char = '\u{1d}';
const STRIKETHROUGH: char = '\u{1e}';

/// Renders a message as protocol text. The result may span several lines.
pub fn message_body(
    message: &Message,
    participants: &[Participant],
    me: &Me,
    media: &MediaCache,
) -> String {
    match &message.content {
        MessageContent::Location(location) => location_url(location),
        MessageContent::Media(attachment) => {
            let mut body = media
                .lookup(&attachment.file_hash)
                .map(|entry| entry.url)
                .unwrap_or_else(|| MEDIA_PLACEHOLDER.to_string());
            if let Some(caption) = attachment
                .caption
                .as_deref()
                .filter(|caption| !caption.is_empty())
            {
                body.push(' ');
                body.push_str(&format_text(caption, participants, me));
            }
            body
        }
        MessageContent::Text { body } => format_text(body, participants, me),
        MessageContent::Notification(notification) => {
            format!("[notification: {}]", notification.kind.tag())
        }
        MessageContent::E2eNotification => String::new(),
        MessageContent::Unsupported { tag } => format!("[unsupported message: {tag}]"),
    }
}

pub fn location_url(location: &Location) -> String {
    format!(
        "https://maps.google.com/?q={:.6},{:.6}",
        location.latitude, location.longitude
    )
}

/// Resolves `@<number>` mentions and chat-style emphasis into IRC text.
pub fn format_text(text: &str, participants: &[Participant], me: &Me) -> String {
    let text = resolve_mentions(text, participants, me);
    let text = convert_spans(&text, '*', BOLD);
    let text = convert_spans(&text, '_', ITALIC);
    convert_spans(&text, '~', STRIKETHROUGH)
}

fn resolve_mentions(text: &str, participants: &[Participant], me: &Me) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        let digits = after
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after.len());
        let number = &after[..digits];

        out.push('@');
        out.push_str(&mention_name(number, participants, me));
        rest = &after[digits..];
    }

    out.push_str(rest);
    out
}

fn mention_name<'a>(number: &'a str, participants: &[Participant], me: &Me) -> Cow<'a, str> {
    if number.is_empty() {
        return Cow::Borrowed(number);
    }
    if number == me.self_id.local_part() && !me.push_name.is_empty() {
        return Cow::Owned(me.push_name.clone());
    }
    participants
        .iter()
        .find(|p| p.id.local_part() == number)
        .map(|p| Cow::Owned(p.safe_name()))
        .unwrap_or(Cow::Borrowed(number))
}

fn convert_spans(text: &str, marker: char, code: char) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == marker && opens_span(&chars, i, marker) {
            if let Some(close) = closing_marker(&chars, i, marker) {
                out.push(code);
                out.extend(&chars[i + 1..close]);
                out.push(code);
                i = close + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

fn opens_span(chars: &[char], i: usize, marker: char) -> bool {
    let after_boundary = i == 0 || !chars[i - 1].is_alphanumeric();
    let before_text = chars
        .get(i + 1)
        .is_some_and(|c| !c.is_whitespace() && *c != marker);
    after_boundary && before_text
}

fn closing_marker(chars: &[char], open: usize, marker: char) -> Option<usize> {
    (open + 2..chars.len())
        .take_while(|&j| chars[j] != '\n')
        .find(|&j| {
            chars[j] == marker
                && !chars[j - 1].is_whitespace()
                && chars.get(j + 1).map_or(true, |c| !c.is_alphanumeric())
        })
}
