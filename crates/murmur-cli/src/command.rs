use std::path::PathBuf;

use murmur_compose::ComposerKey;
use murmur_types::models::{AttachmentId, ListStyle, MessageId, StyleTag};
use thiserror::Error;

/// A message named on the command line: an explicit id or the last one sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRef {
    Id(MessageId),
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Text(String),
    Cursor(usize),
    Select(usize, usize),
    Format(StyleTag),
    List(ListStyle),
    Emoji(String),
    Recent,
    Key(ComposerKey),
    Attach(PathBuf),
    Detach(AttachmentId),
    Voice,
    StopVoice,
    CancelVoice,
    Reply(Option<MessageRef>),
    Send,
    Discard,
    React(MessageRef, String),
    Reactions(MessageRef),
    Thread(MessageRef),
    Replies(MessageRef),
    State,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid {what}: {value}")]
    Invalid { what: &'static str, value: String },
}

pub const HELP: &str = "\
text <content>          replace the buffer (\\n for newline), cursor at end
cursor <n>              move the cursor
select <start> <end>    select a character range
format <style>          toggle bold|italic|underline|strikethrough|code
list <bullet|numbered>  turn the selected lines into a list
emoji <emoji>           insert an emoji at the cursor
recent                  show recently used emojis
key <key>               up|down|accept|dismiss|send|<style>
attach <path>           stage a file
detach <attachment-id>  unstage a file
voice | stop | cancel   voice recording
reply <message|none>    set the reply target
send | discard          finish the draft
react <message> <emoji> toggle a reaction
reactions <message>     show grouped reactions
thread <message>        open a thread
replies <thread>        list a thread's replies
state | help | quit

<message> is a message id or `last`.";

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_start();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line.trim_end(), ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let cmd = match name.to_ascii_lowercase().as_str() {
            "text" => Self::Text(unescape(rest)),
            "cursor" => match args[..] {
                [n] => Self::Cursor(number(n)?),
                _ => return Err(ParseError::Usage("cursor <n>")),
            },
            "select" => match args[..] {
                [start, end] => Self::Select(number(start)?, number(end)?),
                _ => return Err(ParseError::Usage("select <start> <end>")),
            },
            "format" => match args[..] {
                [style] => Self::Format(style_tag(style)?),
                _ => return Err(ParseError::Usage("format <style>")),
            },
            "list" => match args[..] {
                ["bullet"] => Self::List(ListStyle::Bullet),
                ["numbered"] => Self::List(ListStyle::Numbered),
                _ => return Err(ParseError::Usage("list <bullet|numbered>")),
            },
            "emoji" => match args[..] {
                [emoji] => Self::Emoji(emoji.to_string()),
                _ => return Err(ParseError::Usage("emoji <emoji>")),
            },
            "recent" => Self::Recent,
            "key" => match args[..] {
                [key] => Self::Key(composer_key(key)?),
                _ => return Err(ParseError::Usage("key <key>")),
            },
            "attach" if !rest.is_empty() => Self::Attach(PathBuf::from(rest)),
            "attach" => return Err(ParseError::Usage("attach <path>")),
            "detach" => match args[..] {
                [id] => Self::Detach(uuid(id, "attachment id")?),
                _ => return Err(ParseError::Usage("detach <attachment-id>")),
            },
            "voice" => Self::Voice,
            "stop" => Self::StopVoice,
            "cancel" => Self::CancelVoice,
            "reply" => match args[..] {
                ["none"] => Self::Reply(None),
                [target] => Self::Reply(Some(message_ref(target)?)),
                _ => return Err(ParseError::Usage("reply <message|none>")),
            },
            "send" => Self::Send,
            "discard" => Self::Discard,
            "react" => match args[..] {
                [target, emoji] => Self::React(message_ref(target)?, emoji.to_string()),
                _ => return Err(ParseError::Usage("react <message> <emoji>")),
            },
            "reactions" => match args[..] {
                [target] => Self::Reactions(message_ref(target)?),
                _ => return Err(ParseError::Usage("reactions <message>")),
            },
            "thread" => match args[..] {
                [target] => Self::Thread(message_ref(target)?),
                _ => return Err(ParseError::Usage("thread <message>")),
            },
            "replies" => match args[..] {
                [target] => Self::Replies(message_ref(target)?),
                _ => return Err(ParseError::Usage("replies <thread>")),
            },
            "state" => Self::State,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

fn unescape(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

fn number(value: &str) -> Result<usize, ParseError> {
    value.parse().map_err(|_| ParseError::Invalid {
        what: "offset",
        value: value.to_string(),
    })
}

fn uuid(value: &str, what: &'static str) -> Result<uuid::Uuid, ParseError> {
    value.parse().map_err(|_| ParseError::Invalid {
        what,
        value: value.to_string(),
    })
}

fn message_ref(value: &str) -> Result<MessageRef, ParseError> {
    if value.eq_ignore_ascii_case("last") {
        return Ok(MessageRef::Last);
    }
    uuid(value, "message id").map(MessageRef::Id)
}

fn style_tag(value: &str) -> Result<StyleTag, ParseError> {
    StyleTag::parse(value).ok_or_else(|| ParseError::Invalid {
        what: "style",
        value: value.to_string(),
    })
}

fn composer_key(value: &str) -> Result<ComposerKey, ParseError> {
    let key = match value.to_ascii_lowercase().as_str() {
        "up" => ComposerKey::Up,
        "down" => ComposerKey::Down,
        "accept" | "enter" | "tab" => ComposerKey::Accept,
        "dismiss" | "escape" | "esc" => ComposerKey::Dismiss,
        "send" => ComposerKey::Send,
        other => ComposerKey::Format(style_tag(other).map_err(|_| ParseError::Invalid {
            what: "key",
            value: value.to_string(),
        })?),
    };
    Ok(key)
}
